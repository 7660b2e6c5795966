//! Shared HTTP client for the Zo operations console.
//!
//! Every network-calling collaborator goes through one [`HttpGateway`]. The
//! gateway attaches the static client key, the device-identity headers, and
//! the bearer token to each outbound request, reading the credential store at
//! send time rather than at construction time. A 401 response from any call
//! clears the session keys and hands control to the installed
//! [`UnauthorizedHandler`] — there is no per-call opt-out; a 401 from the
//! backend is ground truth that the session is dead.

use credential_store::{CredentialManager, StorageError};
use reqwest::{header, Method};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Static header identifying the calling application (not the device).
pub const HEADER_CLIENT_KEY: &str = "client-key";
/// Device-persistent id header.
pub const HEADER_DEVICE_ID: &str = "client-device-id";
/// Device-persistent secret header.
pub const HEADER_DEVICE_SECRET: &str = "client-device-secret";

/// Gateway error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credential store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The backend rejected the session; session keys have been cleared and
    /// the unauthorized handler has run.
    #[error("Session rejected by backend")]
    Unauthorized,

    /// Non-2xx response other than 401
    #[error("Backend error (HTTP {status}): {message}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body, if any
        message: String,
    },
}

impl GatewayError {
    /// The HTTP status associated with this error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Unauthorized => Some(401),
            GatewayError::Backend { status, .. } => Some(*status),
            GatewayError::Http(e) => e.status().map(|s| s.as_u16()),
            GatewayError::Storage(_) => None,
        }
    }

    /// The backend-provided error message, when one exists.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            GatewayError::Backend { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Seam for the forced navigation to the unauthenticated entry point.
///
/// Invoked after the session keys have been cleared. Embedders install a
/// handler that returns the UI to the login screen.
pub trait UnauthorizedHandler: Send + Sync {
    /// Called once per 401 response, after the session keys are cleared.
    fn on_unauthorized(&self);
}

/// Default handler: logs and nothing else.
pub struct LogUnauthorizedHandler;

impl UnauthorizedHandler for LogUnauthorizedHandler {
    fn on_unauthorized(&self) {
        warn!("Backend rejected the session; returning to the login entry point");
    }
}

/// The shared HTTP client.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    client_key: String,
    credentials: Arc<CredentialManager>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
}

impl HttpGateway {
    /// Create a new gateway.
    ///
    /// # Arguments
    /// * `base_url` - Fixed API base URL (e.g. `https://api.zo.network/v1`)
    /// * `client_key` - Static client-key header value
    /// * `credentials` - Credential store read on every request
    /// * `unauthorized` - Handler invoked on any 401 response
    pub fn new(
        base_url: impl Into<String>,
        client_key: impl Into<String>,
        credentials: Arc<CredentialManager>,
        unauthorized: Arc<dyn UnauthorizedHandler>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            client_key: client_key.into(),
            credentials,
            unauthorized,
        }
    }

    /// Build the absolute URL for an API path.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Assemble a request with the outbound header set.
    ///
    /// Runs per call, not once at startup: device identity is read (and
    /// lazily created) from the store, and the bearer token — if present —
    /// reflects the store's state at send time, so a token written
    /// mid-session is picked up by the very next request.
    pub fn build_request(&self, method: Method, path: &str) -> GatewayResult<reqwest::RequestBuilder> {
        let identity = self.credentials.device_identity()?;

        let mut builder = self
            .client
            .request(method, self.endpoint(path))
            .header(header::ACCEPT, "application/json")
            .header(HEADER_CLIENT_KEY, &self.client_key)
            .header(HEADER_DEVICE_ID, identity.device_id)
            .header(HEADER_DEVICE_SECRET, identity.device_secret);

        if let Some(token) = self.credentials.get_token()? {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        Ok(builder)
    }

    /// Send a request and apply the inbound policy.
    ///
    /// Successes pass through as the parsed JSON body (`Null` when the body
    /// is empty or not JSON). A 401 triggers the global side effect; other
    /// non-2xx statuses become [`GatewayError::Backend`] with the backend's
    /// message extracted from the body when present.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<Value> {
        let mut builder = self.build_request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(path = %path, "Sending request");
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.handle_unauthorized()?;
            return Err(GatewayError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = extract_error_message(&text).unwrap_or_default();
            warn!(status = %status, path = %path, "Request failed");
            return Err(GatewayError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    /// GET a path.
    pub async fn get(&self, path: &str) -> GatewayResult<Value> {
        self.send(Method::GET, path, None).await
    }

    /// POST a JSON body to a path.
    pub async fn post_json(&self, path: &str, body: &Value) -> GatewayResult<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// The 401 side effect: clear the session keys (device identity stays)
    /// and notify the unauthorized handler.
    fn handle_unauthorized(&self) -> GatewayResult<()> {
        warn!("Received 401; clearing session");
        self.credentials.clear_session()?;
        self.unauthorized.on_unauthorized();
        Ok(())
    }
}

/// Pull a human-readable error message out of a backend error body.
///
/// The backend is inconsistent: the message may live under `error`,
/// `message`, or `detail`, possibly nested in a `data` wrapper.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let inner = value.get("data").unwrap_or(&value);

    for key in ["error", "message", "detail"] {
        if let Some(message) = inner.get(key).and_then(Value::as_str) {
            if !message.is_empty() {
                return Some(message.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use credential_store::{AuthUser, CredentialKeys, CredentialStorage, StorageResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory storage for testing.
    struct MemoryStorage {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStorage {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl CredentialStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    /// Records how many times navigation was forced.
    struct RecordingHandler {
        count: AtomicUsize,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                count: AtomicUsize::new(0),
            }
        }
    }

    impl UnauthorizedHandler for RecordingHandler {
        fn on_unauthorized(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn make_gateway() -> (HttpGateway, Arc<CredentialManager>, Arc<RecordingHandler>) {
        let credentials = Arc::new(CredentialManager::new(Box::new(MemoryStorage::new())));
        let handler = Arc::new(RecordingHandler::new());
        let gateway = HttpGateway::new(
            "https://api.test.zo.network/v1",
            "test-client-key",
            credentials.clone(),
            handler.clone(),
        );
        (gateway, credentials, handler)
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let (gateway, _, _) = make_gateway();
        assert_eq!(
            gateway.endpoint("/auth/login/check"),
            "https://api.test.zo.network/v1/auth/login/check"
        );
        assert_eq!(
            gateway.endpoint("auth/login/check"),
            "https://api.test.zo.network/v1/auth/login/check"
        );
    }

    #[test]
    fn test_request_carries_client_and_device_headers() {
        let (gateway, credentials, _) = make_gateway();

        let request = gateway
            .build_request(Method::GET, "/auth/login/check")
            .unwrap()
            .build()
            .unwrap();

        let identity = credentials.device_identity().unwrap();
        let headers = request.headers();
        assert_eq!(headers.get(HEADER_CLIENT_KEY).unwrap(), "test-client-key");
        assert_eq!(
            headers.get(HEADER_DEVICE_ID).unwrap(),
            identity.device_id.as_str()
        );
        assert_eq!(
            headers.get(HEADER_DEVICE_SECRET).unwrap(),
            identity.device_secret.as_str()
        );
    }

    #[test]
    fn test_no_authorization_header_without_token() {
        let (gateway, _, _) = make_gateway();

        let request = gateway
            .build_request(Method::GET, "/cities")
            .unwrap()
            .build()
            .unwrap();

        assert!(request.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_token_written_mid_session_is_picked_up() {
        let (gateway, credentials, _) = make_gateway();

        // First request: unauthenticated
        let request = gateway
            .build_request(Method::GET, "/cities")
            .unwrap()
            .build()
            .unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());

        // A login happens elsewhere
        let user = AuthUser::new("user-1", "91", "9876543210");
        credentials.set_session("fresh-token", &user, 1_999_999_999_000).unwrap();

        // The very next request carries the bearer without reconfiguring
        let request = gateway
            .build_request(Method::GET, "/cities")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(header::AUTHORIZATION).unwrap(),
            "Bearer fresh-token"
        );
    }

    #[test]
    fn test_device_identity_created_lazily_per_request() {
        let (gateway, credentials, _) = make_gateway();

        // Nothing persisted yet; building a request must create the pair
        gateway.build_request(Method::GET, "/cities").unwrap();

        let identity = credentials.device_identity().unwrap();
        assert!(!identity.device_id.is_empty());
        assert!(!identity.device_secret.is_empty());
    }

    #[test]
    fn test_unauthorized_clears_session_and_navigates() {
        let (gateway, credentials, handler) = make_gateway();

        let user = AuthUser::new("user-1", "91", "9876543210");
        credentials.set_session("tok", &user, 1_999_999_999_000).unwrap();
        let identity = credentials.device_identity().unwrap();

        gateway.handle_unauthorized().unwrap();

        assert!(credentials.get_token().unwrap().is_none());
        assert!(credentials.get_user().unwrap().is_none());
        assert!(credentials.get_valid_till().unwrap().is_none());
        // Device identity survives the forced logout
        assert_eq!(credentials.device_identity().unwrap(), identity);
        assert_eq!(handler.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unauthorized_handler_fires_once_per_401() {
        let (gateway, _, handler) = make_gateway();

        gateway.handle_unauthorized().unwrap();
        gateway.handle_unauthorized().unwrap();
        assert_eq!(handler.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_extract_error_message_variants() {
        assert_eq!(
            extract_error_message(r#"{"error": "Invalid OTP"}"#),
            Some("Invalid OTP".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"message": "Too many attempts"}"#),
            Some("Too many attempts".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"detail": "Not found"}"#),
            Some("Not found".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"data": {"error": "Invalid OTP"}}"#),
            Some("Invalid OTP".to_string())
        );
    }

    #[test]
    fn test_extract_error_message_absent() {
        assert_eq!(extract_error_message("not json"), None);
        assert_eq!(extract_error_message(r#"{"status": "failed"}"#), None);
        assert_eq!(extract_error_message(r#"{"error": ""}"#), None);
        assert_eq!(extract_error_message(r#"{"error": 42}"#), None);
    }

    #[test]
    fn test_gateway_error_status() {
        assert_eq!(GatewayError::Unauthorized.status(), Some(401));
        assert_eq!(
            GatewayError::Backend {
                status: 500,
                message: String::new()
            }
            .status(),
            Some(500)
        );
        assert_eq!(
            GatewayError::Storage(StorageError::Encoding("x".into())).status(),
            None
        );
    }

    #[test]
    fn test_gateway_error_backend_message() {
        let err = GatewayError::Backend {
            status: 400,
            message: "Invalid OTP".to_string(),
        };
        assert_eq!(err.backend_message(), Some("Invalid OTP"));

        let empty = GatewayError::Backend {
            status: 400,
            message: String::new(),
        };
        assert_eq!(empty.backend_message(), None);
        assert_eq!(GatewayError::Unauthorized.backend_message(), None);
    }
}
