//! Endpoint negotiation over a peer's OSCQuery HTTP responder.
//!
//! - [`DataFetcher::resolve_receive_endpoint`] reads `GET /?HOST_INFO` and
//!   returns where the peer listens for OSC datagrams.
//! - [`DataFetcher::fetch_parameters`] reads `GET /` and flattens the
//!   `/avatar/parameters` subtree into a name to value map.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use oscq_core::{Argument, BoxFuture};
use oscq_protocol::{ACCESS_NONE, ACCESS_READ_WRITE, OscNode};
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, error, trace};
use url::Url;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Query flag selecting the host-info document.
pub const HOST_INFO_QUERY: &str = "HOST_INFO";

/// Flat map of avatar parameter names to their current values.
pub type ParameterMap = BTreeMap<String, Argument>;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Service name sent in the user agent as `OscQuery-<name>`.
    pub service_name: String,
    pub timeout: Duration,
}

impl FetcherConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(&self) -> String {
        format!("OscQuery-{}", self.service_name)
    }
}

/// Fetches a URL as text.
pub trait HttpFetch: Send + Sync {
    fn get_string<'a>(&'a self, url: Url) -> BoxFuture<'a, DiscoveryResult<String>>;
}

/// [`HttpFetch`] over `reqwest`.
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new(config: &FetcherConfig) -> DiscoveryResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                DiscoveryError::configuration("Failed to create HTTP client").with_source(e)
            })?;

        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetch {
    fn get_string<'a>(&'a self, url: Url) -> BoxFuture<'a, DiscoveryResult<String>> {
        Box::pin(async move {
            trace!(url = %url, "Sending request");
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| DiscoveryError::network(format!("Request to {} failed", url)).with_source(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(DiscoveryError::invalid_response(format!(
                    "Unexpected status {} from {}",
                    status, url
                )));
            }

            response.text().await.map_err(|e| {
                DiscoveryError::network(format!("Failed to read body from {}", url)).with_source(e)
            })
        })
    }
}

/// Talks to a discovered peer's HTTP responder.
#[derive(Clone)]
pub struct DataFetcher {
    http: Arc<dyn HttpFetch>,
}

impl DataFetcher {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self { http }
    }

    /// A fetcher over `reqwest` built from `config`.
    pub fn from_config(config: &FetcherConfig) -> DiscoveryResult<Self> {
        Ok(Self::new(Arc::new(ReqwestFetch::new(config)?)))
    }

    /// Returns the peer's OSC receive endpoint from its host info.
    ///
    /// Failures are logged and returned; there is no fallback endpoint.
    pub async fn resolve_receive_endpoint(
        &self,
        address: IpAddr,
        port: u16,
    ) -> DiscoveryResult<SocketAddr> {
        let result = async {
            let url = discovery_url(address, port, Some(HOST_INFO_QUERY))?;
            let body = self.http.get_string(url).await?;
            parse_host_info(&body)
        }
        .await;

        match result {
            Ok(endpoint) => {
                debug!(%address, port, %endpoint, "Resolved OSC endpoint");
                Ok(endpoint)
            }
            Err(e) => {
                error!(%address, port, error = %e, "Failed to fetch connection endpoint");
                Err(e)
            }
        }
    }

    /// Returns every read-write avatar parameter the peer exposes.
    pub async fn fetch_parameters(&self, address: IpAddr, port: u16) -> DiscoveryResult<ParameterMap> {
        let url = discovery_url(address, port, None)?;
        let body = self.http.get_string(url).await?;
        let root = OscNode::from_json(&body).map_err(|e| {
            DiscoveryError::invalid_response("Parameter tree is not valid JSON").with_source(e)
        })?;

        let parameters = collect_parameters(&root)?;
        debug!(%address, port, count = parameters.len(), "Fetched avatar parameters");
        Ok(parameters)
    }
}

fn discovery_url(address: IpAddr, port: u16, query: Option<&str>) -> DiscoveryResult<Url> {
    let host = match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    };
    let mut url = Url::parse(&format!("http://{}:{}/", host, port)).map_err(|e| {
        DiscoveryError::internal(format!("Invalid discovery URL for {}:{}", address, port))
            .with_source(e)
    })?;
    url.set_query(query);
    Ok(url)
}

fn parse_host_info(body: &str) -> DiscoveryResult<SocketAddr> {
    let data: Value = serde_json::from_str(body).map_err(|e| {
        DiscoveryError::invalid_response("HOST_INFO is not valid JSON").with_source(e)
    })?;

    let ip = data
        .get("OSC_IP")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<IpAddr>().ok())
        .ok_or_else(|| {
            DiscoveryError::invalid_response("Received empty or malformed IP address from HOST_INFO")
        })?;

    let port = data
        .get("OSC_PORT")
        .and_then(Value::as_i64)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| {
            DiscoveryError::invalid_response("Received empty or malformed port from HOST_INFO")
        })?;

    Ok(SocketAddr::new(ip, port))
}

fn collect_parameters(root: &OscNode) -> DiscoveryResult<ParameterMap> {
    let parameters = root.descend(&["avatar", "parameters"]).ok_or_else(|| {
        DiscoveryError::invalid_response("Parameter tree has no /avatar/parameters node")
    })?;

    let mut out = ParameterMap::new();
    for (name, node) in parameters.children() {
        read_node(name, node, &mut out)?;
    }
    Ok(out)
}

fn read_node(name: &str, node: &OscNode, out: &mut ParameterMap) -> DiscoveryResult<()> {
    match node.access {
        ACCESS_READ_WRITE => {
            out.insert(name.to_string(), leaf_value(name, node)?);
        }
        ACCESS_NONE => {
            for (child_name, child) in node.children() {
                read_node(child_name, child, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn leaf_value(name: &str, node: &OscNode) -> DiscoveryResult<Argument> {
    let Some(tag) = node.type_tag.as_deref() else {
        return Ok(Argument::Unknown);
    };
    let first = || {
        node.first_value()
            .ok_or_else(|| DiscoveryError::invalid_response(format!("Parameter {} has no VALUE", name)))
    };

    let value = match tag {
        "T" => first()?.as_bool().map(Argument::Bool),
        "f" => first()?.as_f64().map(|f| Argument::Float(f as f32)),
        "i" => first()?
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Argument::Int),
        "s" => first()?.as_str().map(|s| Argument::String(s.to_string())),
        _ => return Ok(Argument::Unknown),
    };

    value.ok_or_else(|| {
        DiscoveryError::invalid_response(format!("Parameter {} has a malformed {} value", name, tag))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::error::DiscoveryErrorCode;

    struct FakeFetch {
        body: String,
        requested: Mutex<Vec<Url>>,
    }

    impl FakeFetch {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpFetch for FakeFetch {
        fn get_string<'a>(&'a self, url: Url) -> BoxFuture<'a, DiscoveryResult<String>> {
            self.requested.lock().unwrap().push(url);
            let body = self.body.clone();
            Box::pin(async move { Ok(body) })
        }
    }

    struct FailingFetch;

    impl HttpFetch for FailingFetch {
        fn get_string<'a>(&'a self, url: Url) -> BoxFuture<'a, DiscoveryResult<String>> {
            Box::pin(async move { Err(DiscoveryError::network(format!("refused: {}", url))) })
        }
    }

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

    const PARAMETER_TREE: &str = r#"{
        "FULL_PATH": "/",
        "ACCESS": 0,
        "CONTENTS": {
            "avatar": {
                "FULL_PATH": "/avatar",
                "ACCESS": 0,
                "CONTENTS": {
                    "change": {
                        "FULL_PATH": "/avatar/change",
                        "ACCESS": 3,
                        "TYPE": "s",
                        "VALUE": ["avtr_123"]
                    },
                    "parameters": {
                        "FULL_PATH": "/avatar/parameters",
                        "ACCESS": 0,
                        "CONTENTS": {
                            "Grounded": { "FULL_PATH": "/avatar/parameters/Grounded", "ACCESS": 3, "TYPE": "T", "VALUE": [true] },
                            "Tail_Angle": { "FULL_PATH": "/avatar/parameters/Tail_Angle", "ACCESS": 3, "TYPE": "f", "VALUE": [0.25] },
                            "Gesture": { "FULL_PATH": "/avatar/parameters/Gesture", "ACCESS": 3, "TYPE": "i", "VALUE": [4] },
                            "Label": { "FULL_PATH": "/avatar/parameters/Label", "ACCESS": 3, "TYPE": "s", "VALUE": ["hi"] },
                            "Blob": { "FULL_PATH": "/avatar/parameters/Blob", "ACCESS": 3, "TYPE": "b", "VALUE": ["AA=="] },
                            "Viseme": { "FULL_PATH": "/avatar/parameters/Viseme", "ACCESS": 1, "TYPE": "i", "VALUE": [0] },
                            "Go": {
                                "FULL_PATH": "/avatar/parameters/Go",
                                "ACCESS": 0,
                                "CONTENTS": {
                                    "Horizontal": { "FULL_PATH": "/avatar/parameters/Go/Horizontal", "ACCESS": 3, "TYPE": "f", "VALUE": [-1.0] }
                                }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    #[tokio::test]
    async fn resolves_endpoint_from_host_info() {
        let fetch = FakeFetch::new(r#"{"NAME":"VRChat-Client-ABC","OSC_IP":"127.0.0.1","OSC_PORT":9000,"OSC_TRANSPORT":"UDP"}"#);
        let fetcher = DataFetcher::new(fetch.clone());

        let endpoint = fetcher.resolve_receive_endpoint(PEER, 54321).await.unwrap();
        assert_eq!(endpoint, "127.0.0.1:9000".parse().unwrap());

        let requested = fetch.requested.lock().unwrap();
        assert_eq!(requested[0].as_str(), "http://192.168.1.20:54321/?HOST_INFO");
    }

    #[tokio::test]
    async fn rejects_malformed_host_info() {
        let cases = [
            r#"{"OSC_PORT":9000}"#,
            r#"{"OSC_IP":"","OSC_PORT":9000}"#,
            r#"{"OSC_IP":"not-an-ip","OSC_PORT":9000}"#,
            r#"{"OSC_IP":"127.0.0.1"}"#,
            r#"{"OSC_IP":"127.0.0.1","OSC_PORT":"9000"}"#,
            r#"{"OSC_IP":"127.0.0.1","OSC_PORT":70000}"#,
            "not json",
        ];

        for body in cases {
            let fetcher = DataFetcher::new(FakeFetch::new(body));
            let err = fetcher.resolve_receive_endpoint(PEER, 1).await.unwrap_err();
            assert_eq!(err.code(), DiscoveryErrorCode::InvalidResponse, "body: {}", body);
        }
    }

    #[tokio::test]
    async fn network_failure_propagates() {
        let fetcher = DataFetcher::new(Arc::new(FailingFetch));
        let err = fetcher.resolve_receive_endpoint(PEER, 1).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn flattens_parameter_tree() {
        let fetch = FakeFetch::new(PARAMETER_TREE);
        let fetcher = DataFetcher::new(fetch.clone());

        let parameters = fetcher.fetch_parameters(PEER, 54321).await.unwrap();

        assert_eq!(parameters.get("Grounded"), Some(&Argument::Bool(true)));
        assert_eq!(parameters.get("Tail_Angle"), Some(&Argument::Float(0.25)));
        assert_eq!(parameters.get("Gesture"), Some(&Argument::Int(4)));
        assert_eq!(parameters.get("Label"), Some(&Argument::from("hi")));
        assert_eq!(parameters.get("Blob"), Some(&Argument::Unknown));
        assert_eq!(parameters.get("Horizontal"), Some(&Argument::Float(-1.0)));
        assert!(!parameters.contains_key("Viseme"));
        assert!(!parameters.contains_key("change"));
        assert_eq!(parameters.len(), 6);

        let requested = fetch.requested.lock().unwrap();
        assert_eq!(requested[0].as_str(), "http://192.168.1.20:54321/");
    }

    #[tokio::test]
    async fn missing_parameters_node_is_an_error() {
        let fetcher = DataFetcher::new(FakeFetch::new(r#"{"FULL_PATH":"/","ACCESS":0,"CONTENTS":{}}"#));
        assert!(fetcher.fetch_parameters(PEER, 1).await.is_err());
    }

    #[tokio::test]
    async fn leaf_without_value_is_an_error() {
        let body = r#"{"CONTENTS":{"avatar":{"CONTENTS":{"parameters":{"CONTENTS":{
            "Broken": {"ACCESS": 3, "TYPE": "f"}
        }}}}}}"#;
        let fetcher = DataFetcher::new(FakeFetch::new(body));
        let err = fetcher.fetch_parameters(PEER, 1).await.unwrap_err();
        assert!(err.message().contains("Broken"));
    }

    #[test]
    fn ipv6_discovery_url() {
        let url = discovery_url("::1".parse().unwrap(), 8080, Some(HOST_INFO_QUERY)).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:8080/?HOST_INFO");
    }

    #[tokio::test]
    async fn reqwest_fetch_sends_discovery_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let body = r#"{"OSC_IP":"127.0.0.1","OSC_PORT":9000}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_ascii_lowercase()
        });

        let fetcher = DataFetcher::from_config(&FetcherConfig::new("test")).unwrap();
        let endpoint = fetcher
            .resolve_receive_endpoint(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
            .await
            .unwrap();
        assert_eq!(endpoint.port(), 9000);

        let request = server.await.unwrap();
        assert!(request.starts_with("get /?host_info http/1.1"));
        assert!(request.contains("user-agent: oscquery-test"));
        assert!(request.contains("cache-control: no-cache"));
    }

    #[test]
    fn config_defaults() {
        let config = FetcherConfig::new("svc");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent(), "OscQuery-svc");
    }
}
