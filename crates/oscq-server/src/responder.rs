//! OSCQuery HTTP responder.
//!
//! Answers `GET /` only. With `HOST_INFO` anywhere in the query string
//! (any case) the body is the host-info document, otherwise the address-space
//! document. Every other method or path gets a bare 404.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use oscq_protocol::{HostInfo, address_space};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ResponderConfig;
use crate::error::{ServerError, ServerResult};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Pre-rendered response bodies.
struct Documents {
    host_info: String,
    address_space: String,
}

impl Documents {
    fn render(config: &ResponderConfig) -> ServerResult<Self> {
        let host_info = HostInfo::new(
            config.service_name.clone(),
            config.osc_endpoint.ip(),
            config.osc_endpoint.port(),
        );
        Ok(Self {
            host_info: host_info.to_json()?,
            address_space: address_space().to_json()?,
        })
    }
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct DiscoveryResponder {
    config: ResponderConfig,
    running: Mutex<Option<Running>>,
}

impl DiscoveryResponder {
    pub fn new(config: ResponderConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Binds the listener and serves in the background until `token` is
    /// cancelled or [`stop`](Self::stop) is called. Restarts if running.
    pub async fn start(&self, token: &CancellationToken) -> ServerResult<()> {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            shutdown(previous).await;
        }

        let documents = Arc::new(Documents::render(&self.config)?);
        let listener = TcpListener::bind(self.config.bind)
            .await
            .map_err(|e| ServerError::bind(self.config.bind, e))?;
        info!(addr = %self.config.bind, "Discovery responder listening");

        let app = Router::new().fallback(respond).with_state(documents);
        let token = token.child_token();
        let shutdown_signal = token.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal)
                .await
            {
                error!(error = %e, "Discovery responder failed");
            }
            debug!("Discovery responder exited");
        });

        *running = Some(Running { token, task });
        Ok(())
    }

    /// Stops serving. Idempotent.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            info!("Discovery responder stopping");
            shutdown(previous).await;
        }
    }
}

async fn shutdown(running: Running) {
    running.token.cancel();
    if let Err(e) = running.task.await {
        warn!(error = %e, "Discovery responder task failed");
    }
}

/// True if the query asks for host info.
pub fn wants_host_info(query: Option<&str>) -> bool {
    query.is_some_and(|q| q.to_ascii_uppercase().contains("HOST_INFO"))
}

async fn respond(State(documents): State<Arc<Documents>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET || uri.path() != "/" {
        return StatusCode::NOT_FOUND.into_response();
    }

    debug!(%uri, "Answering discovery request");
    let body = if wants_host_info(uri.query()) {
        documents.host_info.clone()
    } else {
        documents.address_space.clone()
    };

    (StatusCode::OK, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use crate::ports::{PortKind, available_port};

    async fn start_responder() -> (DiscoveryResponder, SocketAddr, CancellationToken) {
        let port = available_port(PortKind::Tcp).unwrap();
        let config = ResponderConfig::localhost("oscq-test", port, 9001);
        let addr = config.bind;
        let responder = DiscoveryResponder::new(config);
        let token = CancellationToken::new();
        responder.start(&token).await.unwrap();
        (responder, addr, token)
    }

    /// Sends a raw request and returns (status line, headers, body).
    async fn request(addr: SocketAddr, method: &str, target: &str) -> (String, String, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            method, target, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        let (status, headers) = head.split_once("\r\n").unwrap_or((head, ""));
        (status.to_string(), headers.to_ascii_lowercase(), body.to_string())
    }

    #[test]
    fn host_info_query_detection() {
        assert!(wants_host_info(Some("HOST_INFO")));
        assert!(wants_host_info(Some("host_info")));
        assert!(wants_host_info(Some("foo=1&Host_Info")));
        assert!(!wants_host_info(Some("HOST")));
        assert!(!wants_host_info(None));
    }

    #[tokio::test]
    async fn serves_host_info() {
        let (responder, addr, _token) = start_responder().await;

        let (status, headers, body) = request(addr, "GET", "/?HOST_INFO").await;
        assert_eq!(status, "HTTP/1.1 200 OK");
        assert!(headers.contains("content-type: application/json; charset=utf-8"));

        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["NAME"], "oscq-test");
        assert_eq!(doc["OSC_IP"], "127.0.0.1");
        assert_eq!(doc["OSC_PORT"], 9001);
        assert_eq!(doc["OSC_TRANSPORT"], "UDP");

        responder.stop().await;
    }

    #[tokio::test]
    async fn serves_address_space() {
        let (responder, addr, _token) = start_responder().await;

        let (status, _, body) = request(addr, "GET", "/").await;
        assert_eq!(status, "HTTP/1.1 200 OK");
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["CONTENTS"]["avatar"]["CONTENTS"]["change"]["ACCESS"], 2);

        responder.stop().await;
    }

    #[tokio::test]
    async fn rejects_other_paths_and_methods() {
        let (responder, addr, _token) = start_responder().await;

        let (status, _, _) = request(addr, "GET", "/avatar").await;
        assert_eq!(status, "HTTP/1.1 404 Not Found");
        let (status, _, _) = request(addr, "POST", "/?HOST_INFO").await;
        assert_eq!(status, "HTTP/1.1 404 Not Found");

        responder.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_port_and_is_idempotent() {
        let (responder, addr, _token) = start_responder().await;

        responder.stop().await;
        responder.stop().await;
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let (_responder, addr, _token) = start_responder().await;
        let second = DiscoveryResponder::new(ResponderConfig::localhost("dup", addr.port(), 1));
        let result = second.start(&CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
