//! High-level API for managing persisted credentials.

use crate::{
    AuthUser, CredentialKeys, CredentialStorage, DeviceIdentity, Session, StorageError,
    StorageResult,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

/// Length of the random suffix appended to generated device ids.
const DEVICE_ID_SUFFIX_LEN: usize = 8;

/// High-level API over a [`CredentialStorage`] backend.
///
/// The session triple (token, user, valid-till) is written and removed
/// together; device identity is written once and survives logout.
pub struct CredentialManager {
    storage: Box<dyn CredentialStorage>,
}

impl CredentialManager {
    /// Create a new credential manager with the given storage backend
    pub fn new(storage: Box<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Session triple
    // ==========================================

    /// Retrieve the bearer token
    pub fn get_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(CredentialKeys::TOKEN)
    }

    /// Retrieve the stored user
    pub fn get_user(&self) -> StorageResult<Option<AuthUser>> {
        match self.storage.get(CredentialKeys::USER)? {
            Some(raw) => {
                let user = serde_json::from_str(&raw).map_err(|e| {
                    StorageError::Encoding(format!("stored user is not valid JSON: {}", e))
                })?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Retrieve the token expiry as epoch milliseconds
    pub fn get_valid_till(&self) -> StorageResult<Option<i64>> {
        match self.storage.get(CredentialKeys::TOKEN_VALID_TILL)? {
            Some(raw) => {
                let ms = raw.parse::<i64>().map_err(|e| {
                    StorageError::Encoding(format!("stored valid-till is not numeric: {}", e))
                })?;
                Ok(Some(ms))
            }
            None => Ok(None),
        }
    }

    /// Persist a complete session. `valid_till_ms` must already be in
    /// milliseconds; normalization happens at login time.
    pub fn set_session(
        &self,
        token: &str,
        user: &AuthUser,
        valid_till_ms: i64,
    ) -> StorageResult<()> {
        let serialized = serde_json::to_string(user)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        self.storage.set(CredentialKeys::TOKEN, token)?;
        self.storage.set(CredentialKeys::USER, &serialized)?;
        self.storage
            .set(CredentialKeys::TOKEN_VALID_TILL, &valid_till_ms.to_string())?;

        debug!(user_id = %user.id, "Session persisted");
        Ok(())
    }

    /// Retrieve the session only when all three values are present and parse.
    pub fn get_session(&self) -> StorageResult<Option<Session>> {
        let token = match self.get_token()? {
            Some(t) => t,
            None => return Ok(None),
        };
        let user = match self.get_user()? {
            Some(u) => u,
            None => return Ok(None),
        };
        let valid_till_ms = match self.get_valid_till()? {
            Some(v) => v,
            None => return Ok(None),
        };

        Ok(Some(Session {
            token,
            user,
            valid_till_ms,
        }))
    }

    /// Whether a complete session is stored.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.get_session()?.is_some())
    }

    /// Remove the session triple. Device identity is untouched so the device
    /// is still recognized on the next login. Idempotent.
    pub fn clear_session(&self) -> StorageResult<()> {
        for key in CredentialKeys::SESSION_KEYS {
            self.storage.delete(key)?;
        }
        debug!("Session cleared");
        Ok(())
    }

    /// Whether the stored expiry has passed. A missing expiry counts as
    /// expired. Display-only; session validity is the backend's call.
    pub fn is_session_expired(&self) -> StorageResult<bool> {
        match self.get_valid_till()? {
            Some(valid_till_ms) => Ok(valid_till_ms <= chrono::Utc::now().timestamp_millis()),
            None => Ok(true),
        }
    }

    // ==========================================
    // Device identity
    // ==========================================

    /// Get the stable device identity, creating and persisting it on first
    /// use. Both values are written before this returns, so every request
    /// (authenticated or not) carries them.
    pub fn device_identity(&self) -> StorageResult<DeviceIdentity> {
        let device_id = self.storage.get(CredentialKeys::DEVICE_ID)?;
        let device_secret = self.storage.get(CredentialKeys::DEVICE_SECRET)?;

        if let (Some(device_id), Some(device_secret)) = (device_id, device_secret) {
            return Ok(DeviceIdentity {
                device_id,
                device_secret,
            });
        }

        let identity = generate_device_identity();
        self.storage
            .set(CredentialKeys::DEVICE_ID, &identity.device_id)?;
        self.storage
            .set(CredentialKeys::DEVICE_SECRET, &identity.device_secret)?;

        debug!(device_id = %identity.device_id, "Generated device identity");
        Ok(identity)
    }
}

/// Synthesize a fresh device identity: timestamp plus random suffix for the
/// id, and an opaque encoding of timestamp and id for the secret.
fn generate_device_identity() -> DeviceIdentity {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DEVICE_ID_SUFFIX_LEN)
        .map(char::from)
        .collect();

    let device_id = format!("{}-{}", now_ms, suffix);
    let device_secret = BASE64.encode(format!("{}:{}", now_ms, device_id));

    DeviceIdentity {
        device_id,
        device_secret,
    }
}
