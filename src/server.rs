//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::status::Status;

/// Largest request body read into memory, in bytes.
pub const MAX_BODY: usize = 64 * 1024;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`, host names are
    /// resolved) when [`serve`](Server::serve) is called.
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        let router = Arc::new(router);

        info!(addr = %local_addr, "jokebook listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a SIGTERM stops accepting even while
                // connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("jokebook stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads one request body, routes it, logs the outcome. Failures become HTTP
/// responses, so hyper never sees an error.
async fn dispatch<B>(
    router: Arc<Router>,
    req: hyper::Request<B>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let target = parts.uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| parts.uri.path().to_owned());

    let response = match Method::try_from(&parts.method) {
        Err(()) => Response::error(
            Status::MethodNotAllowed,
            &format!("method {} not supported", parts.method),
        ),
        Ok(method) => match Limited::new(body, MAX_BODY).collect().await {
            Ok(collected) => {
                let headers = parts.headers.iter()
                    .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
                    .collect();
                let req = Request::new(method, &target, headers, collected.to_bytes().to_vec());
                router.handle(req).await
            }
            Err(e) if e.is::<LengthLimitError>() => {
                warn!(peer = %remote_addr, limit = MAX_BODY, "request body too large");
                Response::error(
                    Status::PayloadTooLarge,
                    &format!("request body exceeds {MAX_BODY} bytes"),
                )
            }
            Err(e) => {
                warn!(peer = %remote_addr, "failed to read request body: {e}");
                Response::error(Status::BadRequest, "unreadable request body")
            }
        },
    };

    info!(
        method = %parts.method,
        path = parts.uri.path(),
        status = response.status_code().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT. On Windows only Ctrl-C is
/// available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::controller::SharedStore;
    use crate::store::{JokeStore, MemoryStore};

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    fn request(method: &str, uri: &str, body: impl Into<Bytes>) -> hyper::Request<Full<Bytes>> {
        hyper::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-joke-source", "tests")
            .body(Full::new(body.into()))
            .unwrap()
    }

    async fn send(
        router: Arc<Router>,
        req: hyper::Request<Full<Bytes>>,
    ) -> (http::StatusCode, serde_json::Value) {
        let res = dispatch(router, req, peer()).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn app() -> (Arc<Router>, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        (Arc::new(crate::app(Arc::clone(&store))), store)
    }

    #[tokio::test]
    async fn posted_body_reaches_the_handler() {
        let (router, store) = app();
        let body = r#"{"category":"Puns","setup":"Why?","delivery":"Because."}"#;
        let (status, created) = send(router, request("POST", "/jokes", body)).await;
        assert_eq!(status, http::StatusCode::CREATED);
        assert_eq!(created["category"], "Puns");
        assert_eq!(store.list_categories().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversized_body_is_413_and_writes_nothing() {
        let (router, store) = app();
        let setup = "a".repeat(MAX_BODY);
        let body = serde_json::json!({ "category": "Huge", "setup": setup, "delivery": "x" }).to_string();
        let (status, error) = send(router, request("POST", "/jokes", body)).await;
        assert_eq!(status, http::StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(error["error"], format!("request body exceeds {MAX_BODY} bytes"));
        assert!(store.list_categories().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_method_is_405_before_routing() {
        let (router, _) = app();
        let (status, error) = send(router, request("PATCH", "/jokes/1", "{}")).await;
        assert_eq!(status, http::StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error["error"], "method PATCH not supported");
    }

    #[tokio::test]
    async fn headers_and_query_are_passed_through() {
        async fn echo(req: Request) -> Response {
            let seen = serde_json::json!({
                "source": req.header("X-Joke-Source"),
                "limit": req.query("limit"),
            });
            Response::json(seen.to_string().into_bytes())
        }
        let router = Arc::new(Router::new().get("/echo", echo));
        let (status, seen) = send(router, request("GET", "/echo?limit=2", Bytes::new())).await;
        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(seen, serde_json::json!({ "source": "tests", "limit": "2" }));
    }
}
