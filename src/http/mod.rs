//! HTTP server exposing the GraphQL API. Routing lives in `handlers.rs`.

use std::{
    convert::Infallible,
    fs,
    future::Future,
    io,
    net::{IpAddr, SocketAddr},
    os::unix::fs::PermissionsExt,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
};

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, UnixListener},
};

use crate::{api, prelude::*};
use self::{handlers::handle, response::internal_server_error};


mod handlers;
mod log;
mod response;


#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    #[config(default = 3080)]
    pub(crate) port: u16,

    /// IP address to bind to. Use "0.0.0.0" or "::" to accept connections
    /// from other machines.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// If set, Tome listens on this Unix socket instead of `address` and
    /// `port`, e.g. "/run/tome/http.socket". An existing file at this path
    /// is replaced.
    pub(crate) unix_socket: Option<PathBuf>,

    /// File mode of `unix_socket`.
    #[config(default = 0o755)]
    pub(crate) unix_socket_permissions: u32,
}


// Bodies are always fully buffered.
type Response<T = Full<Bytes>> = hyper::Response<T>;
type Request<T = hyper::body::Incoming> = hyper::Request<T>;


/// Shared by all requests.
struct Context {
    api_root: api::RootNode,
    api_context: api::Context,
    log_http_headers: bool,
}


/// Serves HTTP until Ctrl+C is pressed.
pub(crate) async fn serve(
    config: &HttpConfig,
    log_http_headers: bool,
    api_root: api::RootNode,
    api_context: api::Context,
) -> Result<()> {
    let ctx = Arc::new(Context { api_root, api_context, log_http_headers });

    match &config.unix_socket {
        Some(path) => {
            if path.exists() {
                fs::remove_file(path)
                    .with_context(|| format!("failed to remove old socket '{}'", path.display()))?;
            }
            let listener = UnixListener::bind(path)
                .with_context(|| format!("failed to bind to '{}'", path.display()))?;
            fs::set_permissions(path, fs::Permissions::from_mode(config.unix_socket_permissions))
                .with_context(|| format!("failed to set permissions of '{}'", path.display()))?;
            info!("Listening on unix://{}", path.display());

            let listener = &listener;
            accept_until_shutdown(move || async move {
                listener.accept().await.map(|(stream, _)| stream)
            }, ctx).await
        }
        None => {
            let addr = SocketAddr::new(config.address, config.port);
            let listener = TcpListener::bind(addr).await
                .with_context(|| format!("failed to bind to {addr}"))?;
            info!("Listening on http://{}", listener.local_addr()?);

            let listener = &listener;
            accept_until_shutdown(move || async move {
                listener.accept().await.map(|(stream, _)| stream)
            }, ctx).await
        }
    }
}

/// Hands each accepted connection to its own task until Ctrl+C.
async fn accept_until_shutdown<F, Fut, S>(mut accept: F, ctx: Arc<Context>) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<S>>,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = accept() => match accepted {
                Ok(stream) => spawn_connection(stream, Arc::clone(&ctx)),
                // E.g. out of file descriptors. Usually resolves itself.
                Err(e) => warn!("Failed to accept connection: {e}"),
            },
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl+C")?;
                info!("Got Ctrl+C, shutting down");
                return Ok(());
            }
        }
    }
}

/// Serves HTTP/1 or HTTP/2 on one connection in a new task.
fn spawn_connection<S>(stream: S, ctx: Arc<Context>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let service = service_fn(move |req| catch_panics(handle(req, Arc::clone(&ctx))));
        let served = auto::Builder::new(TokioExecutor::new())
            .serve_connection(TokioIo::new(stream), service)
            .await;
        if let Err(e) = served {
            debug!("HTTP connection ended with error: {e}");
        }
    });
}

/// Answers 500 if `handler` panics, instead of dropping the connection.
async fn catch_panics(handler: impl Future<Output = Response>) -> Result<Response, Infallible> {
    // Requests only share the store, whose lock tolerates poisoning.
    let payload = match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(response) => return Ok(response),
        Err(payload) => payload,
    };

    let msg = payload.downcast_ref::<&str>().copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<no message>");
    error!("HTTP handler panicked: {msg}");
    Ok(internal_server_error())
}
