use enginelink_common::time::Duration;
use serde_json::Value;

/// One prepared request on the transport seam.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: http::StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

/// Failures below the HTTP layer. Classification into [`crate::ApiError`]
/// happens in the client; implementations only report what they saw.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    TimedOut,
    #[error("cross-origin request rejected: {0}")]
    Cors(String),
    #[error("{0}")]
    Connect(String),
}

/// Executes a single request under a deadline.
///
/// Implementations enforce `request.timeout` through cooperative cancellation;
/// a slow backend never blocks anything beyond its own call.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport over a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connection_verbose(true)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::from)?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(TransportError::from)?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::TimedOut;
        }
        let message = error.to_string();
        if message.contains("CORS") || message.contains("cross-origin") {
            return Self::Cors(message);
        }
        Self::Connect(message)
    }
}
