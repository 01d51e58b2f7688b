use http_body_util::BodyExt;
use hyper::{Method, StatusCode};
use juniper::http::{GraphQLBatchRequest, graphiql::graphiql_source};
use std::{sync::Arc, time::Instant};

use crate::prelude::*;
use super::{
    Context, Request, Response,
    log,
    response::{bad_request, internal_server_error, method_not_allowed, not_found},
};


/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request, ctx: Arc<Context>) -> Response {
    log::req::log(&req);
    if ctx.log_http_headers {
        log::headers::log(&req);
    }

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/');

    match path {
        // The GraphQL endpoint. This is the only path for which POST is
        // allowed.
        "/graphql" if method == Method::POST => handle_api(req, &ctx).await,

        // From this point on, we only support GET and HEAD requests.
        _ if method != Method::GET && method != Method::HEAD => method_not_allowed(),

        // The interactive GraphQL API explorer/IDE.
        "/~graphiql" => Response::builder()
            .header("Content-Type", "text/html; charset=UTF-8")
            .body(graphiql_source("/graphql", None).into())
            .unwrap(),

        "/~health" => Response::builder()
            .header("Content-Type", "text/plain; charset=UTF-8")
            .body("ok".into())
            .unwrap(),

        _ => {
            debug!("Responding with 404 to {:?} '{}'", method, path);
            not_found()
        }
    }
}

/// Handles a request to `/graphql`.
async fn handle_api(req: Request, ctx: &Context) -> Response {
    let before = Instant::now();
    let calls_before = ctx.api_context.store.num_calls();

    let body = match req.into_body().collect().await {
        Ok(body) => body.to_bytes(),
        Err(e) => {
            warn!("Failed to read body of API request: {e}");
            return bad_request("failed to read request body".into());
        }
    };

    // A single request or a batch, in the standard GraphQL-over-HTTP JSON
    // format.
    let request = match serde_json::from_slice::<GraphQLBatchRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Invalid GraphQL request body: {e}");
            return bad_request(format!("invalid GraphQL request: {e}"));
        }
    };

    let response = request.execute(&ctx.api_root, &ctx.api_context).await;

    // Like other GraphQL servers, we only reply with a non-200 status code if
    // the request could not be executed at all, e.g. due to validation errors.
    let status = if response.is_ok() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    let body = match serde_json::to_vec(&response) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize GraphQL response: {e}");
            return internal_server_error();
        }
    };

    debug!(
        "Finished /graphql query in {:.2?} (with {} store calls)",
        before.elapsed(),
        ctx.api_context.store.num_calls().saturating_sub(calls_before),
    );

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.into())
        .unwrap()
}
