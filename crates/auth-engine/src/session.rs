//! Session controller: the single owner of auth state.
//!
//! Drives the state machine in `fsm.rs` through the startup check, login,
//! silent refresh and logout. All storage writes go through the credential
//! store, all network calls through the gateway; the identity synchronizer
//! is strictly downstream and can never affect the session outcome.

use crate::fsm::{SessionMachine, SessionMachineInput, SessionState};
use crate::normalize::{auth_user_from_payload, normalize_login_response, normalize_valid_till_ms};
use crate::{AuthError, AuthResult};
use credential_store::{AuthUser, CredentialManager};
use http_gateway::{GatewayError, HttpGateway};
use identity_sync::IdentitySync;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Fallback session lifetime when a login response omits the expiry.
const DEFAULT_SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Payload for session state-change notifications.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub state: SessionState,
    pub user_id: Option<String>,
    pub mobile_number: Option<String>,
}

type StateCallback = Box<dyn Fn(&StateChange) + Send + Sync>;

/// The session controller.
///
/// In-memory user and token mirror the persisted session; `is_logged_in`
/// answers from memory so it stays cheap and synchronous.
pub struct SessionController {
    credentials: Arc<CredentialManager>,
    gateway: Arc<HttpGateway>,
    syncer: Option<Arc<IdentitySync>>,
    fsm: Mutex<SessionMachine>,
    user: Mutex<Option<AuthUser>>,
    token: Mutex<Option<String>>,
    is_loading: AtomicBool,
    state_callback: Mutex<Option<StateCallback>>,
}

impl SessionController {
    /// Create a controller. The synchronizer is optional so embedders that
    /// have no profile store still get the full session lifecycle.
    pub fn new(
        credentials: Arc<CredentialManager>,
        gateway: Arc<HttpGateway>,
        syncer: Option<Arc<IdentitySync>>,
    ) -> Self {
        Self {
            credentials,
            gateway,
            syncer,
            fsm: Mutex::new(SessionMachine::new()),
            user: Mutex::new(None),
            token: Mutex::new(None),
            is_loading: AtomicBool::new(false),
            state_callback: Mutex::new(None),
        }
    }

    /// Install a callback invoked after every state transition.
    pub fn set_state_callback(&self, callback: StateCallback) {
        *self.state_callback.lock().unwrap() = Some(callback);
    }

    /// Current simplified state.
    pub fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().unwrap().state())
    }

    /// True when both a user and a token are held in memory.
    pub fn is_logged_in(&self) -> bool {
        self.user.lock().unwrap().is_some() && self.token.lock().unwrap().is_some()
    }

    /// True while the startup check (and any refresh it triggers) runs.
    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    /// The in-memory user, if any.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.user.lock().unwrap().clone()
    }

    /// Startup check: decide between verify, refresh, or nothing.
    ///
    /// Runs at most once per cycle — the state machine rejects a second
    /// `StartupCheck` while one is in flight or after it resolved, and that
    /// rejection is answered with `Ok` rather than an error. `is_loading`
    /// is true for the whole duration and false on every exit path.
    pub async fn initialize(&self) -> AuthResult<()> {
        if self.transition(&SessionMachineInput::StartupCheck).is_err() {
            debug!("Startup check already performed; skipping");
            return Ok(());
        }

        self.is_loading.store(true, Ordering::SeqCst);
        let result = self.run_startup_check().await;
        self.is_loading.store(false, Ordering::SeqCst);
        result
    }

    async fn run_startup_check(&self) -> AuthResult<()> {
        if self.credentials.get_token()?.is_none() {
            debug!("No stored token; attempting silent refresh");
            self.transition(&SessionMachineInput::TokenMissing)?;
            return self.silent_refresh().await;
        }

        self.transition(&SessionMachineInput::TokenFound)?;
        match self.gateway.get("/auth/login/check").await {
            Ok(_) => match self.credentials.get_session()? {
                Some(session) => {
                    // The check endpoint only confirms validity; the stored
                    // serialized copy is the rehydration source
                    *self.user.lock().unwrap() = Some(session.user);
                    *self.token.lock().unwrap() = Some(session.token);
                    self.transition(&SessionMachineInput::Verified)?;
                    info!("Stored session verified");
                    Ok(())
                }
                None => {
                    // Token verified but the stored triple is incomplete;
                    // rebuild it through a refresh
                    warn!("Stored session incomplete after verify; refreshing");
                    self.transition(&SessionMachineInput::VerifyErrored)?;
                    self.silent_refresh().await
                }
            },
            Err(GatewayError::Unauthorized) => {
                // Gateway already cleared storage and ran the handler
                info!("Stored session rejected by backend");
                self.transition(&SessionMachineInput::VerifyRejected)?;
                self.clear_memory();
                Ok(())
            }
            Err(e) => {
                warn!("Session verify failed: {}", e);
                self.transition(&SessionMachineInput::VerifyErrored)?;
                self.silent_refresh().await
            }
        }
    }

    /// One refresh attempt, never more.
    ///
    /// The gateway forwards the stored token (even a stale one) as the
    /// bearer. Any failure degrades silently to a logged-out state.
    async fn silent_refresh(&self) -> AuthResult<()> {
        debug!("Attempting silent refresh");
        let body = match self.gateway.post_json("/auth/login/refresh", &json!({})).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Silent refresh failed: {}", e);
                return self.refresh_failed();
            }
        };

        let payload = normalize_login_response(&body);
        let token = match payload.token {
            Some(token) => token,
            None => {
                warn!("Refresh response carried no token");
                return self.refresh_failed();
            }
        };

        let previous = self
            .user
            .lock()
            .unwrap()
            .clone()
            .or(self.credentials.get_user().unwrap_or(None));

        let user = match (payload.user, &previous) {
            (Some(value), Some(prev)) => auth_user_from_payload(
                Some(&value),
                &prev.mobile_country_code,
                &prev.mobile_number,
            ),
            (Some(value), None) => auth_user_from_payload(Some(&value), "", ""),
            (None, Some(prev)) => prev.clone(),
            (None, None) => {
                warn!("Refresh response carried no user and none was stored");
                return self.refresh_failed();
            }
        };

        self.login(user, &token, payload.valid_till)
    }

    fn refresh_failed(&self) -> AuthResult<()> {
        let _ = self.transition(&SessionMachineInput::RefreshFailed);
        self.logout()
    }

    /// Establish a session: persist, mirror into memory, transition, then
    /// kick off the identity sync.
    ///
    /// Returns as soon as the session is persisted; the sync runs detached
    /// and its outcome never changes the login result.
    pub fn login(&self, user: AuthUser, token: &str, valid_till_raw: Option<i64>) -> AuthResult<()> {
        let valid_till_ms = valid_till_raw
            .map(normalize_valid_till_ms)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() + DEFAULT_SESSION_TTL_MS);

        self.credentials.set_session(token, &user, valid_till_ms)?;
        *self.token.lock().unwrap() = Some(token.to_string());
        *self.user.lock().unwrap() = Some(user.clone());
        self.transition(&SessionMachineInput::LoginSuccess)?;
        info!(user_id = %user.id, "Session established");

        if let Some(syncer) = &self.syncer {
            let _ = syncer.sync_in_background(user);
        }

        Ok(())
    }

    /// Drop the session everywhere. Idempotent; device identity survives.
    pub fn logout(&self) -> AuthResult<()> {
        self.clear_memory();
        if let Some(syncer) = &self.syncer {
            syncer.clear_cached_profile();
        }
        self.credentials.clear_session()?;
        // Already-unauthenticated states have nothing to transition from
        let _ = self.transition(&SessionMachineInput::LoggedOut);
        info!("Logged out");
        Ok(())
    }

    fn clear_memory(&self) {
        *self.user.lock().unwrap() = None;
        *self.token.lock().unwrap() = None;
    }

    /// Feed one input to the state machine and notify the callback.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<()> {
        let state = {
            let mut fsm = self.fsm.lock().unwrap();
            if fsm.consume(input).is_err() {
                return Err(AuthError::InvalidTransition(format!(
                    "{:?} not accepted in {:?}",
                    input,
                    SessionState::from(fsm.state())
                )));
            }
            SessionState::from(fsm.state())
        };

        if let Some(callback) = self.state_callback.lock().unwrap().as_ref() {
            let user = self.user.lock().unwrap();
            callback(&StateChange {
                state,
                user_id: user.as_ref().map(|u| u.id.clone()),
                mobile_number: user.as_ref().map(|u| u.mobile_number.clone()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credential_store::{CredentialKeys, CredentialStorage, StorageResult};
    use http_gateway::LogUnauthorizedHandler;
    use std::collections::HashMap;

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

    fn make_controller_at(base_url: &str) -> (Arc<SessionController>, Arc<CredentialManager>) {
        let credentials = Arc::new(CredentialManager::new(Box::new(MemoryStorage::new())));
        let gateway = Arc::new(HttpGateway::new(
            base_url,
            "test-client-key",
            credentials.clone(),
            Arc::new(LogUnauthorizedHandler),
        ));
        let controller = Arc::new(SessionController::new(credentials.clone(), gateway, None));
        (controller, credentials)
    }

    fn make_controller() -> (Arc<SessionController>, Arc<CredentialManager>) {
        // Port 9 (discard) is never listening; network paths fail fast
        make_controller_at("http://127.0.0.1:9")
    }

    /// Minimal loopback backend: answers every request with 200 and the
    /// canned JSON body of the first route whose path matches, recording
    /// each request path in `hits`.
    async fn spawn_backend(
        routes: Vec<(&'static str, serde_json::Value)>,
        hits: Arc<Mutex<Vec<String>>>,
    ) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let routes = routes.clone();
                let hits = hits.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).into_owned();
                    let path = request
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("")
                        .to_string();
                    hits.lock().unwrap().push(path.clone());

                    let body = routes
                        .iter()
                        .find(|(route, _)| path.starts_with(route))
                        .map(|(_, value)| value.to_string())
                        .unwrap_or_else(|| "{}".to_string());
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn make_controller_with_syncer() -> (Arc<SessionController>, Arc<CredentialManager>) {
        let credentials = Arc::new(CredentialManager::new(Box::new(MemoryStorage::new())));
        let gateway = Arc::new(HttpGateway::new(
            "http://127.0.0.1:9",
            "test-client-key",
            credentials.clone(),
            Arc::new(LogUnauthorizedHandler),
        ));
        let syncer = Arc::new(IdentitySync::new(Arc::new(
            identity_sync::ProfileStoreClient::new("http://127.0.0.1:9", "anon"),
        )));
        let controller = Arc::new(SessionController::new(
            credentials.clone(),
            gateway,
            Some(syncer),
        ));
        (controller, credentials)
    }

    #[test]
    fn fresh_controller_is_unauthenticated() {
        let (controller, _) = make_controller();
        assert_eq!(controller.state(), SessionState::Unauthenticated);
        assert!(!controller.is_logged_in());
        assert!(!controller.is_loading());
        assert!(controller.current_user().is_none());
    }

    #[test]
    fn login_persists_and_normalizes_seconds_expiry() {
        let (controller, credentials) = make_controller();
        let user = AuthUser::new("u-1", "91", "9876543210");

        controller
            .login(user.clone(), "tok-1", Some(1_999_999_999))
            .unwrap();

        assert!(controller.is_logged_in());
        assert_eq!(controller.state(), SessionState::Authenticated);
        assert_eq!(controller.current_user(), Some(user));

        let session = credentials.get_session().unwrap().unwrap();
        assert_eq!(session.token, "tok-1");
        assert_eq!(session.valid_till_ms, 1_999_999_999_000);
    }

    #[test]
    fn login_keeps_millisecond_expiry() {
        let (controller, credentials) = make_controller();
        let user = AuthUser::new("u-1", "91", "9876543210");

        controller
            .login(user, "tok-1", Some(1_999_999_999_000))
            .unwrap();

        let session = credentials.get_session().unwrap().unwrap();
        assert_eq!(session.valid_till_ms, 1_999_999_999_000);
    }

    #[test]
    fn login_without_expiry_defaults_to_a_day() {
        let (controller, credentials) = make_controller();
        let user = AuthUser::new("u-1", "91", "9876543210");

        let before = chrono::Utc::now().timestamp_millis();
        controller.login(user, "tok-1", None).unwrap();
        let after = chrono::Utc::now().timestamp_millis();

        let session = credentials.get_session().unwrap().unwrap();
        assert!(session.valid_till_ms >= before + DEFAULT_SESSION_TTL_MS);
        assert!(session.valid_till_ms <= after + DEFAULT_SESSION_TTL_MS);
    }

    #[test]
    fn logout_clears_session_but_not_device_identity() {
        let (controller, credentials) = make_controller();
        let identity = credentials.device_identity().unwrap();

        let user = AuthUser::new("u-1", "91", "9876543210");
        controller.login(user, "tok-1", Some(1_999_999_999)).unwrap();

        controller.logout().unwrap();

        assert!(!controller.is_logged_in());
        assert_eq!(controller.state(), SessionState::Unauthenticated);
        assert!(credentials.get_token().unwrap().is_none());
        assert!(credentials.get_user().unwrap().is_none());
        assert!(credentials.get_valid_till().unwrap().is_none());
        assert_eq!(credentials.device_identity().unwrap(), identity);
    }

    #[test]
    fn logout_is_idempotent() {
        let (controller, _) = make_controller();
        controller.logout().unwrap();
        controller.logout().unwrap();
        assert_eq!(controller.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn state_callback_sees_transitions() {
        let (controller, _) = make_controller();
        let seen: Arc<Mutex<Vec<StateChange>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        controller.set_state_callback(Box::new(move |change| {
            sink.lock().unwrap().push(change.clone());
        }));

        let user = AuthUser::new("u-1", "91", "9876543210");
        controller.login(user, "tok-1", Some(1_999_999_999)).unwrap();

        let changes = seen.lock().unwrap();
        let last = changes.last().unwrap();
        assert_eq!(last.state, SessionState::Authenticated);
        assert_eq!(last.user_id.as_deref(), Some("u-1"));
        assert_eq!(last.mobile_number.as_deref(), Some("9876543210"));
    }

    #[tokio::test]
    async fn initialize_with_valid_token_verifies_without_refresh() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let base_url = spawn_backend(
            vec![("/auth/login/check", serde_json::json!({"status": "ok"}))],
            hits.clone(),
        )
        .await;

        let (controller, credentials) = make_controller_at(&base_url);
        let user = AuthUser::new("u-1", "91", "9876543210");
        credentials
            .set_session("tok-1", &user, 1_999_999_999_000)
            .unwrap();

        controller.initialize().await.unwrap();

        assert!(controller.is_logged_in());
        assert_eq!(controller.state(), SessionState::Authenticated);
        assert_eq!(controller.current_user().unwrap().id, "u-1");
        assert!(!controller.is_loading());

        // Exactly one request went out, and it was the verify
        let paths = hits.lock().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].contains("/auth/login/check"));
    }

    #[tokio::test]
    async fn verify_rehydrates_from_the_stored_user() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let base_url = spawn_backend(
            vec![(
                "/auth/login/check",
                serde_json::json!({"data": {"user": {"id": "someone-else"}}}),
            )],
            hits.clone(),
        )
        .await;

        let (controller, credentials) = make_controller_at(&base_url);
        let user = AuthUser::new("u-1", "91", "9876543210");
        credentials
            .set_session("tok-1", &user, 1_999_999_999_000)
            .unwrap();

        controller.initialize().await.unwrap();

        // The stored serialized user is the rehydration source; a user
        // object in the check body does not replace it
        assert_eq!(controller.current_user(), Some(user));
    }

    #[tokio::test]
    async fn successful_refresh_establishes_a_session() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let base_url = spawn_backend(
            vec![(
                "/auth/login/refresh",
                serde_json::json!({"data": {
                    "token": "fresh-tok",
                    "valid_till": 1_999_999_999,
                    "user": {"id": "u-9"}
                }}),
            )],
            hits.clone(),
        )
        .await;

        let (controller, credentials) = make_controller_at(&base_url);

        // No stored token: straight to the single refresh attempt
        controller.initialize().await.unwrap();

        assert!(controller.is_logged_in());
        assert_eq!(controller.state(), SessionState::Authenticated);
        assert_eq!(controller.current_user().unwrap().id, "u-9");
        assert!(!controller.is_loading());

        let session = credentials.get_session().unwrap().unwrap();
        assert_eq!(session.token, "fresh-tok");
        assert_eq!(session.valid_till_ms, 1_999_999_999_000);

        let paths = hits.lock().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].contains("/auth/login/refresh"));
    }

    #[tokio::test]
    async fn initialize_without_token_degrades_silently() {
        let (controller, _) = make_controller();

        // No token stored: one refresh attempt, which fails fast against the
        // dead address, and the controller settles unauthenticated.
        controller.initialize().await.unwrap();

        assert_eq!(controller.state(), SessionState::Unauthenticated);
        assert!(!controller.is_logged_in());
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn initialize_with_token_and_dead_backend_degrades_silently() {
        let (controller, credentials) = make_controller();
        let user = AuthUser::new("u-1", "91", "9876543210");
        credentials
            .set_session("stale-token", &user, 1_999_999_999_000)
            .unwrap();

        // Verify fails with a transport error, the single refresh attempt
        // fails the same way, and the stored session is cleared.
        controller.initialize().await.unwrap();

        assert_eq!(controller.state(), SessionState::Unauthenticated);
        assert!(!controller.is_logged_in());
        assert!(!controller.is_loading());
        assert!(credentials.get_token().unwrap().is_none());
    }

    #[tokio::test]
    async fn second_initialize_is_a_noop_while_authenticated() {
        let (controller, _) = make_controller();
        let user = AuthUser::new("u-1", "91", "9876543210");
        controller.login(user, "tok-1", Some(1_999_999_999)).unwrap();

        // Authenticated state rejects StartupCheck; initialize answers Ok
        // without touching the network or the session.
        controller.initialize().await.unwrap();

        assert_eq!(controller.state(), SessionState::Authenticated);
        assert!(controller.is_logged_in());
    }

    #[tokio::test]
    async fn sync_failure_never_affects_login_state() {
        let (controller, _) = make_controller_with_syncer();
        let user = AuthUser::new("u-1", "91", "9876543210");

        controller.login(user, "tok-1", Some(1_999_999_999)).unwrap();
        assert!(controller.is_logged_in());

        // Give the detached sync task time to fail against the dead address
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert!(controller.is_logged_in());
        assert_eq!(controller.state(), SessionState::Authenticated);
    }

    #[test]
    fn stored_session_alone_is_not_a_login() {
        let (controller, credentials) = make_controller();
        let user = AuthUser::new("u-1", "91", "9876543210");
        credentials
            .set_session("tok-1", &user, 1_999_999_999_000)
            .unwrap();

        // Memory was never populated; only initialize() or login() may
        // promote stored credentials into a live session.
        assert!(!controller.is_logged_in());
        assert_eq!(controller.state(), SessionState::Unauthenticated);
    }
}
