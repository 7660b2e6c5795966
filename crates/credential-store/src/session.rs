//! Session and identity types persisted by the credential store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated user.
///
/// The backend's identity payload is an opaque bag of fields; only `id` and
/// the mobile number/country code used to authenticate are guaranteed. The
/// rest is carried through unchanged in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Backend-issued user id (falls back to the mobile number when the
    /// backend omits one).
    pub id: String,
    /// Country code used to authenticate (e.g. "91").
    pub mobile_country_code: String,
    /// Mobile number used to authenticate.
    pub mobile_number: String,
    /// Remaining backend-provided identity fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthUser {
    /// Create a user with only the guaranteed fields.
    pub fn new(
        id: impl Into<String>,
        mobile_country_code: impl Into<String>,
        mobile_number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            mobile_country_code: mobile_country_code.into(),
            mobile_number: mobile_number.into(),
            extra: Map::new(),
        }
    }

    /// Email from the backend payload, if present.
    pub fn email(&self) -> Option<&str> {
        self.extra.get("email").and_then(Value::as_str)
    }

    /// Display name from the backend payload, if present.
    ///
    /// The backend is inconsistent about the field name across endpoints.
    pub fn full_name(&self) -> Option<&str> {
        self.extra
            .get("name")
            .or_else(|| self.extra.get("full_name"))
            .and_then(Value::as_str)
    }
}

/// A fully materialized session: all three persisted values present.
///
/// Partial sessions (token without user, or vice versa) are not a valid rest
/// state; [`crate::CredentialManager::get_session`] returns `None` for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Bearer token for Authorization headers.
    pub token: String,
    /// The authenticated user.
    pub user: AuthUser,
    /// Token expiry as epoch milliseconds.
    pub valid_till_ms: i64,
}

/// Stable device-identity pair, generated once per install and never rotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Locally generated device id.
    pub device_id: String,
    /// Opaque device secret derived from the id at generation time.
    pub device_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_user_roundtrips_opaque_fields() {
        let json = serde_json::json!({
            "id": "u-1",
            "mobile_country_code": "91",
            "mobile_number": "9876543210",
            "email": "ops@zo.network",
            "name": "Asha",
            "role": "manager"
        });

        let user: AuthUser = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.email(), Some("ops@zo.network"));
        assert_eq!(user.full_name(), Some("Asha"));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn auth_user_full_name_accepts_alias() {
        let mut user = AuthUser::new("u-2", "91", "9876543210");
        user.extra
            .insert("full_name".to_string(), Value::String("Ravi".to_string()));
        assert_eq!(user.full_name(), Some("Ravi"));
    }

    #[test]
    fn auth_user_missing_optional_fields() {
        let user = AuthUser::new("u-3", "91", "9876543210");
        assert_eq!(user.email(), None);
        assert_eq!(user.full_name(), None);
    }
}
