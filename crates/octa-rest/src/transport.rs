//! Transport layer for REST communication

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::types::ApiErrorBody;
use crate::RestError;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// Raw HTTP response: status plus body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Create a response with a JSON body
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RestError> {
        serde_json::from_str(&self.body).map_err(RestError::from)
    }

    /// Turn a non-success response into an error, keeping the API's error code
    pub fn into_error(self) -> RestError {
        let parsed: ApiErrorBody = serde_json::from_str(&self.body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            self.body
        } else {
            parsed.message
        };
        RestError::Http {
            status: self.status,
            message,
            error_code: parsed.error_code,
        }
    }
}

/// Transport trait for REST communication (object-safe)
///
/// Paths are relative to the transport's base URL and include the query string.
pub trait Transport: Send + Sync {
    /// Send a GET request
    fn get(&self, path: &str) -> Result<HttpResponse, RestError>;

    /// Send a POST request with an optional JSON body
    fn post(&self, path: &str, body: Option<&Value>) -> Result<HttpResponse, RestError>;

    /// Base URL requests are resolved against
    fn base_url(&self) -> &str;
}

#[derive(Default)]
struct MockState {
    responses: HashMap<(Method, String), VecDeque<HttpResponse>>,
    requests: Vec<(Method, String)>,
}

/// Mock transport for testing
///
/// Responses are queued per method and path. The last queued response for a
/// path is sticky, so a single `set_response` answers every later request.
/// Clones share state, so a test can keep a handle after moving one into a client.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport with no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all responses for a path with a single sticky one
    pub fn set_response(&self, method: Method, path: &str, status: u16, body: Value) {
        let mut state = self.state.lock();
        let queue = state
            .responses
            .entry((method, path.to_string()))
            .or_default();
        queue.clear();
        queue.push_back(HttpResponse::json(status, &body));
    }

    /// Queue a response after the ones already set for a path
    pub fn push_response(&self, method: Method, path: &str, status: u16, body: Value) {
        self.state
            .lock()
            .responses
            .entry((method, path.to_string()))
            .or_default()
            .push_back(HttpResponse::json(status, &body));
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().requests.clone()
    }

    /// Clear responses and recorded requests
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.responses.clear();
        state.requests.clear();
    }

    fn respond(&self, method: Method, path: &str) -> Result<HttpResponse, RestError> {
        let mut state = self.state.lock();
        state.requests.push((method, path.to_string()));

        let queue = state
            .responses
            .get_mut(&(method, path.to_string()))
            .ok_or_else(|| {
                RestError::Transport(format!("no mock response for {:?} {}", method, path))
            })?;

        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.ok_or_else(|| RestError::Transport(format!("no mock response for {:?} {}", method, path)))
    }
}

impl Transport for MockTransport {
    fn get(&self, path: &str) -> Result<HttpResponse, RestError> {
        self.respond(Method::Get, path)
    }

    fn post(&self, path: &str, _body: Option<&Value>) -> Result<HttpResponse, RestError> {
        self.respond(Method::Post, path)
    }

    fn base_url(&self) -> &str {
        "mock://"
    }
}

/// HTTP transport for real REST communication
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Create a new HTTP transport with a per-request timeout
    ///
    /// A timeout too large to form a deadline disables the request timeout.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, RestError> {
        let timeout = std::time::Instant::now()
            .checked_add(timeout)
            .map(|_| timeout);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn finish(
        &self,
        url: &str,
        result: reqwest::Result<reqwest::blocking::Response>,
    ) -> Result<HttpResponse, RestError> {
        let response = result.map_err(|e| map_reqwest_error(url, e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| map_reqwest_error(url, e))?;
        tracing::debug!(url, status, "REST response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(feature = "http")]
fn map_reqwest_error(url: &str, e: reqwest::Error) -> RestError {
    if e.is_timeout() {
        RestError::Timeout(format!("request to {}", url))
    } else {
        RestError::Transport(e.to_string())
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<HttpResponse, RestError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "GET");
        let result = self.client.get(&url).send();
        self.finish(&url, result)
    }

    fn post(&self, path: &str, body: Option<&Value>) -> Result<HttpResponse, RestError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "POST");
        let mut request = self.client.post(&url);
        request = match body {
            Some(body) => request.json(body),
            // Some faucets reject a POST without an explicit length
            None => request.header(reqwest::header::CONTENT_LENGTH, 0),
        };
        let result = request.send();
        self.finish(&url, result)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[cfg(feature = "http")]
    #[test]
    fn test_http_transport_unbounded_timeout() {
        // Nothing listens on port 1; the request must fail, not panic
        let transport =
            HttpTransport::new("http://127.0.0.1:1/", std::time::Duration::MAX).unwrap();
        assert_eq!(transport.base_url(), "http://127.0.0.1:1");
        assert!(transport.get("/v1").is_err());
    }

    #[test]
    fn test_mock_transport_unknown_path() {
        let transport = MockTransport::new();
        let result = transport.get("/v1/nothing");
        assert!(matches!(result, Err(RestError::Transport(_))));
    }

    #[test]
    fn test_mock_transport_sticky_response() {
        let transport = MockTransport::new();
        transport.set_response(Method::Get, "/v1", 200, json!({"chain_id": 4}));

        for _ in 0..3 {
            let response = transport.get("/v1").unwrap();
            assert_eq!(response.status, 200);
        }
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_mock_transport_queued_responses() {
        let transport = MockTransport::new();
        transport.push_response(Method::Get, "/a", 404, json!({}));
        transport.push_response(Method::Get, "/a", 200, json!({}));

        assert_eq!(transport.get("/a").unwrap().status, 404);
        assert_eq!(transport.get("/a").unwrap().status, 200);
        assert_eq!(transport.get("/a").unwrap().status, 200);
    }

    #[test]
    fn test_mock_transport_methods_are_distinct() {
        let transport = MockTransport::new();
        transport.set_response(Method::Post, "/mint", 200, json!([]));
        assert!(transport.get("/mint").is_err());
        assert!(transport.post("/mint", None).is_ok());
    }

    #[test]
    fn test_into_error_keeps_error_code() {
        let response = HttpResponse::json(
            404,
            &json!({"message": "Account not found", "error_code": "account_not_found"}),
        );
        match response.into_error() {
            RestError::Http {
                status,
                message,
                error_code,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Account not found");
                assert_eq!(error_code.as_deref(), Some("account_not_found"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_into_error_plain_text_body() {
        let response = HttpResponse {
            status: 502,
            body: "bad gateway".to_string(),
        };
        let err = response.into_error();
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
    }
}
