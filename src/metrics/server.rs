//! Admin Server
//!
//! Operator-facing listener: `/metrics` (Prometheus), `/healthz` and
//! `/stats` (JSON group snapshots).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::GroupMetrics;
use crate::error::{Error, Result};
use crate::group::{GroupRegistry, GroupSnapshot};

/// Serve the admin endpoints on `addr` until `shutdown` is cancelled
pub async fn run_admin_server(
    addr: SocketAddr,
    groups: Arc<GroupRegistry>,
    metrics: Arc<GroupMetrics>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind admin server: {}", e)))?;

    info!("Admin server listening on {}", addr);

    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Internal(format!("Admin server accept error: {}", e)))?,
        };

        let groups = Arc::clone(&groups);
        let metrics = Arc::clone(&metrics);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let response = admin_response(&groups, &metrics, req.uri().path());
                async move { Ok::<_, Infallible>(response) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                error!("Admin server connection error: {}", e);
            }
        });
    }

    Ok(())
}

fn admin_response(groups: &GroupRegistry, metrics: &GroupMetrics, path: &str) -> Response<Full<Bytes>> {
    match path {
        "/healthz" | "/livez" | "/readyz" => respond(StatusCode::OK, "text/plain", Bytes::from("ok")),
        "/metrics" => match metrics.render(groups) {
            Ok((content_type, body)) => respond_owned(StatusCode::OK, content_type, Bytes::from(body)),
            Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", Bytes::from(e.to_string())),
        },
        "/stats" => {
            let snapshots: Vec<GroupSnapshot> = groups.groups().iter().map(|g| g.stats()).collect();
            match serde_json::to_vec(&snapshots) {
                Ok(body) => respond(StatusCode::OK, "application/json", Bytes::from(body)),
                Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", Bytes::from(e.to_string())),
            }
        }
        _ => respond(StatusCode::NOT_FOUND, "text/plain", Bytes::from("not found")),
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn respond_owned(status: StatusCode, content_type: String, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GetterFn;
    use http_body_util::BodyExt;

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let groups = GroupRegistry::new();
        groups
            .create_group(
                "scores",
                0,
                GetterFn::new(|key: String| async move { Ok(key.into_bytes()) }),
            )
            .unwrap();
        let metrics = GroupMetrics::new().unwrap();

        let health = admin_response(&groups, &metrics, "/healthz");
        assert_eq!(health.status(), StatusCode::OK);

        let stats = admin_response(&groups, &metrics, "/stats");
        assert_eq!(stats.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(stats).await).unwrap();
        assert_eq!(json[0]["name"], "scores");

        let scrape = admin_response(&groups, &metrics, "/metrics");
        assert_eq!(scrape.status(), StatusCode::OK);
        assert!(body_text(scrape).await.contains("peercache_gets"));

        let missing = admin_response(&groups, &metrics, "/nope");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
