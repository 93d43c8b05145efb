//! HTTP Peer Server
//!
//! Serves `GET {base_path}{group}/{key}` from a [`GroupRegistry`], plus
//! `/healthz`. One task per connection; the accept loop and open
//! connections wind down when the shutdown token is cancelled.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{normalize_base_path, DEFAULT_BASE_PATH};
use crate::error::{Error, Result};
use crate::group::GroupRegistry;

/// Peer server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// URL prefix for peer requests
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }
}

/// Bound peer server, ready to [`serve`](PeerServer::serve)
#[derive(Debug)]
pub struct PeerServer {
    listener: TcpListener,
    registry: Arc<GroupRegistry>,
    base_path: Arc<str>,
}

impl PeerServer {
    /// Bind the listening socket
    pub async fn bind(config: ServerConfig, registry: Arc<GroupRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(config.addr).await.map_err(|e| {
            Error::Internal(format!("Failed to bind peer server on {}: {}", config.addr, e))
        })?;

        Ok(Self {
            listener,
            registry,
            base_path: normalize_base_path(&config.base_path).into(),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr()?, base_path = %self.base_path, "Peer server listening");

        loop {
            let (stream, remote) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Peer server accept error: {}", e);
                        continue;
                    }
                },
            };

            let registry = Arc::clone(&self.registry);
            let base_path = Arc::clone(&self.base_path);
            let shutdown = shutdown.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let registry = Arc::clone(&registry);
                    let base_path = Arc::clone(&base_path);
                    async move {
                        let response = route(&registry, &base_path, req.method(), req.uri().path()).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = shutdown.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(e) = result {
                    error!(%remote, "Peer server connection error: {}", e);
                }
            });
        }

        info!("Peer server stopped");
        Ok(())
    }
}

/// Answer one request.
///
/// Exposed separately from the socket plumbing so it can be driven
/// directly in tests.
pub async fn route(
    registry: &GroupRegistry,
    base_path: &str,
    method: &Method,
    path: &str,
) -> Response<Full<Bytes>> {
    if path == "/healthz" {
        return text(StatusCode::OK, "ok");
    }

    let Some(rest) = path.strip_prefix(base_path) else {
        return text(StatusCode::NOT_FOUND, "not found");
    };
    if *method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let (group_name, key) = match parse_segments(rest) {
        Ok(parts) => parts,
        Err(e) => return error_response(&e),
    };

    let group = match registry.lookup(&group_name) {
        Ok(group) => group,
        Err(e) => return error_response(&e),
    };
    group.record_server_request();
    debug!(group = %group_name, key = %key, "Serving peer request");

    match group.get(&key).await {
        Ok(view) => {
            let mut response = Response::new(Full::new(view.bytes()));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            response
        }
        Err(e) => error_response(&e),
    }
}

/// Split `{group}/{key}` and percent-decode both
fn parse_segments(rest: &str) -> Result<(String, String)> {
    let (group, key) = rest
        .split_once('/')
        .ok_or_else(|| Error::InvalidArgument(format!("bad request path: {}", rest)))?;

    let decode = |segment: &str| {
        urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .map_err(|e| Error::InvalidArgument(format!("bad path encoding: {}", e)))
    };
    Ok((decode(group)?, decode(key)?))
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) | Error::GroupNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &Error) -> Response<Full<Bytes>> {
    text(status_for(err), &err.to_string())
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GetterFn;
    use http_body_util::BodyExt;

    const BASE: &str = "/_peercache/";

    fn registry() -> GroupRegistry {
        let registry = GroupRegistry::new();
        registry
            .create_group(
                "scores",
                0,
                GetterFn::new(|key: String| async move {
                    match key.as_str() {
                        "Tom" => Ok(b"630".to_vec()),
                        "a/b" => Ok(b"slash".to_vec()),
                        "boom" => Err(Error::Loader("disk on fire".into())),
                        _ => Err(Error::NotFound(key.clone())),
                    }
                }),
            )
            .unwrap();
        registry
    }

    async fn body(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_serves_value() {
        let registry = registry();
        let response = route(&registry, BASE, &Method::GET, "/_peercache/scores/Tom").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(body(response).await, Bytes::from_static(b"630"));
        assert_eq!(registry.get("scores").unwrap().stats().stats.server_requests, 1);
    }

    #[tokio::test]
    async fn test_decodes_escaped_key() {
        let registry = registry();
        let response = route(&registry, BASE, &Method::GET, "/_peercache/scores/a%2Fb").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, Bytes::from_static(b"slash"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let registry = registry();
        let cases = [
            (Method::GET, "/_peercache/scores/unknown", StatusCode::NOT_FOUND),
            (Method::GET, "/_peercache/nosuch/Tom", StatusCode::NOT_FOUND),
            (Method::GET, "/_peercache/scores/", StatusCode::BAD_REQUEST),
            (Method::GET, "/_peercache/scores", StatusCode::BAD_REQUEST),
            (Method::GET, "/_peercache/scores/boom", StatusCode::INTERNAL_SERVER_ERROR),
            (Method::POST, "/_peercache/scores/Tom", StatusCode::METHOD_NOT_ALLOWED),
            (Method::GET, "/elsewhere", StatusCode::NOT_FOUND),
            (Method::GET, "/healthz", StatusCode::OK),
        ];

        for (method, path, expected) in cases {
            let response = route(&registry, BASE, &method, path).await;
            assert_eq!(response.status(), expected, "{} {}", method, path);
        }
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(
            parse_segments("my%20group/k%3Fv").unwrap(),
            ("my group".to_string(), "k?v".to_string())
        );
        assert!(parse_segments("no-key").is_err());
    }
}
