use hyper::StatusCode;

use super::Response;


fn plain(status: StatusCode, body: &'static str) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=UTF-8")
        .body(body.into())
        .unwrap()
}

pub(crate) fn bad_request(msg: String) -> Response {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "text/plain; charset=UTF-8")
        .body(msg.into())
        .unwrap()
}

pub(crate) fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, "404 Not found")
}

pub(crate) fn method_not_allowed() -> Response {
    plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed")
}

pub(crate) fn internal_server_error() -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
