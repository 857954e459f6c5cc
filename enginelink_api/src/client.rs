use std::sync::Arc;

use enginelink_common::time::Duration;
use enginelink_common::{retry_async, Retry};
use http::Method;
use serde_json::Value;

use crate::constants::{
    EngineEndpoints, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
use crate::{
    ApiError, ApiErrorKind, HttpRequest, HttpTransport, LogNotifier, Notifier, ReqwestTransport,
    TransportError,
};

/// Options applied to a single logical request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub headers: Vec<(String, String)>,
    /// Suppresses the user-facing notification on terminal failure. Probes and
    /// heartbeats set this; user-initiated calls do not.
    pub silent_on_error: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            headers: Vec::new(),
            silent_on_error: false,
        }
    }
}

impl RequestOptions {
    pub fn silent() -> Self {
        Self {
            silent_on_error: true,
            ..Default::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Body of a successful response: parsed JSON when the engine says JSON,
/// otherwise the raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Client for one engine base URL.
///
/// Explicitly constructed and passed by reference; there is no global
/// instance. Cloning is cheap, the transport is shared.
pub struct ApiClient<T = ReqwestTransport> {
    transport: Arc<T>,
    base_url: String,
    default_headers: Vec<(String, String)>,
    notifier: Arc<dyn Notifier>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            base_url: self.base_url.clone(),
            default_headers: self.default_headers.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl ApiClient<ReqwestTransport> {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self::with_transport(
            Arc::new(ReqwestTransport::new()?),
            base_url,
        ))
    }
}

impl<T: HttpTransport> ApiClient<T> {
    pub fn with_transport(transport: Arc<T>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            default_headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn set_default_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.default_headers.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.default_headers.push((key, value));
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET parameters come from a flat JSON object; null entries are skipped.
    fn query_url(url: String, params: &Value) -> String {
        let Some(map) = params.as_object() else {
            return url;
        };
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            match value.as_str() {
                Some(s) => serializer.append_pair(key, s),
                None => serializer.append_pair(key, &value.to_string()),
            };
        }
        let query = serializer.finish();
        if query.is_empty() {
            return url;
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{query}")
    }

    /// Executes one logical request. Transient failures (network, timeout) are
    /// retried with linear backoff; response-class failures are classified
    /// immediately. Exactly one of the parsed payload or an [`ApiError`] comes
    /// back; retries are invisible to the caller.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        data: Option<Value>,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        let mut url = self.endpoint(path);
        let mut body = None;
        if let Some(data) = data {
            if method == Method::GET {
                url = Self::query_url(url, &data);
            } else {
                body = Some(data);
            }
        }

        let mut headers = self.default_headers.clone();
        headers.extend(options.headers.iter().cloned());

        let retry = Retry::builder()
            .max_retries(options.max_retries)
            .delay(options.retry_delay)
            .build();

        let result = retry_async!(
            retry,
            (async {
                self.attempt(
                    method.clone(),
                    url.clone(),
                    headers.clone(),
                    body.clone(),
                    options.timeout,
                )
                .await
            })
        );

        result.map_err(|error| {
            if !options.silent_on_error {
                self.notifier.notify_error("API Error", &error.message);
            }
            error
        })
    }

    async fn attempt(
        &self,
        method: Method,
        url: String,
        headers: Vec<(String, String)>,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Payload, ApiError> {
        tracing::trace!(%method, %url, "engine request");
        let request = HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        };
        let response = self.transport.execute(request).await.map_err(ApiError::from)?;

        if response.status.is_success() {
            if response.is_json() {
                let value = serde_json::from_str(&response.body).map_err(|e| {
                    ApiError::new(ApiErrorKind::Unknown, format!("malformed JSON body: {e}"))
                })?;
                return Ok(Payload::Json(value));
            }
            return Ok(Payload::Text(response.body));
        }

        let data = serde_json::from_str(&response.body).ok();
        Err(ApiError::from_status(response.status, data))
    }

    pub async fn get(
        &self,
        path: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        self.request(Method::GET, path, params, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        data: Option<Value>,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        self.request(Method::POST, path, data, options).await
    }

    pub async fn put(
        &self,
        path: &str,
        data: Option<Value>,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        self.request(Method::PUT, path, data, options).await
    }

    pub async fn delete(
        &self,
        path: &str,
        data: Option<Value>,
        options: RequestOptions,
    ) -> Result<Payload, ApiError> {
        self.request(Method::DELETE, path, data, options).await
    }

    // Engine API surface. Shapes are opaque pass-through; only the probe's
    // marker field is ever inspected, and that happens in the caller.

    /// Probe used for connection validation and heartbeats. Silent: the caller
    /// renders its own message.
    pub async fn system_stats(&self, options: RequestOptions) -> Result<Payload, ApiError> {
        self.get(EngineEndpoints::SYSTEM_STATS, None, options).await
    }

    /// Submits a workflow graph for generation.
    pub async fn submit_prompt(&self, workflow: Value) -> Result<Payload, ApiError> {
        self.post(EngineEndpoints::PROMPT, Some(workflow), RequestOptions::default())
            .await
    }

    pub async fn queue_status(&self) -> Result<Payload, ApiError> {
        self.get(EngineEndpoints::QUEUE, None, RequestOptions::silent())
            .await
    }

    pub async fn interrupt(&self) -> Result<Payload, ApiError> {
        self.post(EngineEndpoints::INTERRUPT, None, RequestOptions::default())
            .await
    }

    pub async fn history(&self) -> Result<Payload, ApiError> {
        self.get(EngineEndpoints::HISTORY, None, RequestOptions::default())
            .await
    }

    pub async fn history_item(&self, prompt_id: &str) -> Result<Payload, ApiError> {
        let path = format!("{}/{prompt_id}", EngineEndpoints::HISTORY);
        self.get(&path, None, RequestOptions::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockHttpTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn json_response(body: Value) -> crate::HttpResponse {
        crate::HttpResponse {
            status: http::StatusCode::OK,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }

    fn client(transport: MockHttpTransport) -> ApiClient<MockHttpTransport> {
        ApiClient::with_transport(Arc::new(transport), "https://engine.example")
    }

    #[derive(Default)]
    struct CountingNotifier {
        notified: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn notify_error(&self, _title: &str, _message: &str) {
            self.notified.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn parses_json_success_bodies() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(json!({"system": {"os": "linux"}}))));

        let payload = client(transport)
            .system_stats(RequestOptions::silent())
            .await
            .unwrap();
        assert_eq!(
            payload,
            Payload::Json(json!({"system": {"os": "linux"}}))
        );
    }

    #[tokio::test]
    async fn falls_back_to_text_for_non_json_bodies() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Ok(crate::HttpResponse {
                status: http::StatusCode::OK,
                content_type: Some("text/plain".to_string()),
                body: "pong".to_string(),
            })
        });

        let payload = client(transport)
            .get("/ping", None, RequestOptions::silent())
            .await
            .unwrap();
        assert_eq!(payload, Payload::Text("pong".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_exhaust_the_retry_budget() {
        let mut transport = MockHttpTransport::new();
        // initial attempt + 2 retries
        transport
            .expect_execute()
            .times(3)
            .returning(|_| Err(TransportError::Connect("connection refused".to_string())));

        let error = client(transport)
            .get("/queue", None, RequestOptions::silent())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ApiErrorKind::Network);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_then_classified() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .times(3)
            .returning(|_| Err(TransportError::TimedOut));

        let error = client(transport)
            .get("/system_stats", None, RequestOptions::silent())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ApiErrorKind::Timeout);
    }

    #[tokio::test]
    async fn validation_responses_are_not_retried() {
        let mut transport = MockHttpTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Ok(crate::HttpResponse {
                status: http::StatusCode::UNPROCESSABLE_ENTITY,
                content_type: Some("application/json".to_string()),
                body: json!({"error": "bad workflow"}).to_string(),
            })
        });

        let error = client(transport)
            .post("/prompt", Some(json!({})), RequestOptions::silent())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ApiErrorKind::Validation);
        assert_eq!(error.status, Some(422));
        assert_eq!(error.data, Some(json!({"error": "bad workflow"})));
    }

    #[tokio::test]
    async fn cors_failures_are_terminal_on_the_first_attempt() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(TransportError::Cors("origin rejected".to_string())));

        let error = client(transport)
            .get("/queue", None, RequestOptions::silent())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ApiErrorKind::Cors);
    }

    #[tokio::test]
    async fn get_parameters_become_a_query_string() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .withf(|request| {
                request.method == Method::GET
                    && request.body.is_none()
                    && request.url == "https://engine.example/history?limit=5&offset=10"
            })
            .times(1)
            .returning(|_| Ok(json_response(json!({}))));

        client(transport)
            .get(
                "/history",
                Some(json!({"limit": 5, "offset": 10, "cursor": null})),
                RequestOptions::silent(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn post_bodies_are_serialized_with_json_headers() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .withf(|request| {
                request.method == Method::POST
                    && request.body == Some(json!({"workflow": "graph"}))
                    && request
                        .headers
                        .iter()
                        .any(|(k, v)| k == "Content-Type" && v == "application/json")
            })
            .times(1)
            .returning(|_| Ok(json_response(json!({"prompt_id": "abc"}))));

        client(transport)
            .submit_prompt(json!({"workflow": "graph"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn terminal_failures_notify_unless_silenced() {
        let notifier = Arc::new(CountingNotifier::default());

        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .times(2)
            .returning(|_| Err(TransportError::Cors("origin rejected".to_string())));
        let api = client(transport).with_notifier(notifier.clone());

        let _ = api.get("/queue", None, RequestOptions::silent()).await;
        assert_eq!(notifier.notified.load(Ordering::SeqCst), 0);

        let _ = api.get("/queue", None, RequestOptions::default()).await;
        assert_eq!(notifier.notified.load(Ordering::SeqCst), 1);
    }
}
