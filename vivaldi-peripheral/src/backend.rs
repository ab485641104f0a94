//! Device-control backend
//!
//! The characteristics only need two things from the device: its current
//! state and a way to send it a command. [`HttpBackend`] speaks the JSON
//! control API; [`Timeout`] bounds any backend so a stalled device cannot
//! stall GATT traffic.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::Value as JsonValue;

/// Command sent to the device
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub cmd: String,
    #[serde(default)]
    pub args: JsonValue,
}

impl Request {
    pub fn new(cmd: &str) -> Self {
        Self { cmd: cmd.to_string(), args: JsonValue::Null }
    }

    pub fn with_args(cmd: &str, args: JsonValue) -> Self {
        Self { cmd: cmd.to_string(), args }
    }
}

/// Reply envelope of every control API call
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: JsonValue) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { ok: false, data: None, error: Some(msg.into()) }
    }

    /// The `data` payload, or the device's error message
    pub fn into_result(self) -> Result<JsonValue, BackendError> {
        if self.ok {
            Ok(self.data.unwrap_or(JsonValue::Null))
        } else {
            Err(BackendError::Device(
                self.error.unwrap_or_else(|| "unspecified error".to_string()),
            ))
        }
    }
}

/// Device state as reported by `GET /status`
///
/// Fields the device does not report are `None`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    #[serde(default)]
    pub power: Option<String>,
    #[serde(default)]
    pub volume: Option<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("http error: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),
    #[error("unexpected status {0}")]
    Status(hyper::StatusCode),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("device error: {0}")]
    Device(String),
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait DeviceBackend: Send + Sync {
    async fn device_state(&self) -> Result<DeviceState, BackendError>;

    /// Returns the reply's `data` payload
    async fn send_command(&self, request: Request) -> Result<JsonValue, BackendError>;
}

/// JSON-over-HTTP control API: `GET {base}/status`, `POST {base}/command`
pub struct HttpBackend {
    base: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base = base_url.trim_end_matches('/').to_string();
        if let Err(e) = base.parse::<hyper::Uri>() {
            return Err(BackendError::InvalidUrl { url: base, reason: e.to_string() });
        }
        Ok(Self {
            base,
            client: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn exchange(
        &self,
        request: hyper::Request<Full<Bytes>>,
    ) -> Result<Response, BackendError> {
        tracing::debug!("{} {}", request.method(), request.uri());
        let response = self.client.request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        if !status.is_success() {
            return Err(BackendError::Status(status));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DeviceBackend for HttpBackend {
    async fn device_state(&self) -> Result<DeviceState, BackendError> {
        let request = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(format!("{}/status", self.base))
            .body(Full::new(Bytes::new()))
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let data = self.exchange(request).await?.into_result()?;
        Ok(serde_json::from_value(data)?)
    }

    async fn send_command(&self, request: Request) -> Result<JsonValue, BackendError> {
        let body = serde_json::to_vec(&request)?;
        let request = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(format!("{}/command", self.base))
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| BackendError::Request(e.to_string()))?;
        self.exchange(request).await?.into_result()
    }
}

/// Fails any backend call that takes longer than `limit`
pub struct Timeout<B> {
    inner: B,
    limit: Duration,
}

impl<B> Timeout<B> {
    pub fn new(inner: B, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<B: DeviceBackend> DeviceBackend for Timeout<B> {
    async fn device_state(&self) -> Result<DeviceState, BackendError> {
        tokio::time::timeout(self.limit, self.inner.device_state())
            .await
            .map_err(|_| BackendError::Timeout(self.limit))?
    }

    async fn send_command(&self, request: Request) -> Result<JsonValue, BackendError> {
        tokio::time::timeout(self.limit, self.inner.send_command(request))
            .await
            .map_err(|_| BackendError::Timeout(self.limit))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shapes() {
        let body = r#"{"ok":true,"data":{"power":"ON","volume":40}}"#;
        let ok: Response = serde_json::from_str(body).unwrap();
        let state: DeviceState = serde_json::from_value(ok.into_result().unwrap()).unwrap();
        assert_eq!(state, DeviceState { power: Some("ON".to_string()), volume: Some(40) });

        let err: Response = serde_json::from_str(r#"{"ok":false,"error":"busy"}"#).unwrap();
        assert!(matches!(err.into_result(), Err(BackendError::Device(m)) if m == "busy"));

        assert_eq!(
            serde_json::to_value(Response::ok(json!(1))).unwrap(),
            json!({"ok": true, "data": 1})
        );
        assert_eq!(
            serde_json::to_value(Request::with_args("power", json!({"state": "ON"}))).unwrap(),
            json!({"cmd": "power", "args": {"state": "ON"}})
        );
    }

    #[tokio::test]
    async fn base_url_is_normalised() {
        let backend = HttpBackend::new("http://127.0.0.1:8080/").unwrap();
        assert_eq!(backend.base_url(), "http://127.0.0.1:8080");
        assert!(HttpBackend::new("http://bad host").is_err());
    }

    struct Stalled;

    #[async_trait]
    impl DeviceBackend for Stalled {
        async fn device_state(&self) -> Result<DeviceState, BackendError> {
            std::future::pending().await
        }

        async fn send_command(&self, _request: Request) -> Result<JsonValue, BackendError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn timeout_bounds_stalled_backend() {
        let backend = Timeout::new(Stalled, Duration::from_millis(20));
        assert!(matches!(backend.device_state().await, Err(BackendError::Timeout(_))));
        assert!(matches!(
            backend.send_command(Request::new("ping")).await,
            Err(BackendError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn http_backend_talks_json() {
        use hyper::service::service_fn;
        use hyper_util::rt::TokioIo;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { return };
                tokio::spawn(async move {
                    let service = service_fn(|r: hyper::Request<hyper::body::Incoming>| async move {
                        let method = r.method().clone();
                        let path = r.uri().path().to_string();
                        let reply = match (method, path.as_str()) {
                            (hyper::Method::GET, "/status") => {
                                Response::ok(json!({"power": "OFF", "volume": 7}))
                            }
                            (hyper::Method::POST, "/command") => {
                                let body = r.into_body().collect().await?.to_bytes();
                                let request: Request = serde_json::from_slice(&body).unwrap();
                                Response::ok(json!({"echo": request.cmd}))
                            }
                            _ => Response::err("not found"),
                        };
                        let bytes = serde_json::to_vec(&reply).unwrap();
                        Ok::<_, hyper::Error>(hyper::Response::new(Full::new(Bytes::from(bytes))))
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        let backend = HttpBackend::new(&format!("http://{addr}")).unwrap();
        assert_eq!(
            backend.device_state().await.unwrap(),
            DeviceState { power: Some("OFF".to_string()), volume: Some(7) }
        );
        assert_eq!(
            backend.send_command(Request::new("power")).await.unwrap(),
            json!({"echo": "power"})
        );
    }
}
