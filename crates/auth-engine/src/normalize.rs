//! Normalization of backend login/verify/refresh responses.
//!
//! The backend is inconsistent across endpoints: payloads arrive top-level or
//! wrapped in `data`, the token may be named `token` or `access_token`, and
//! the expiry may be `valid_till` or `expires_at`, in seconds or
//! milliseconds, as a number or a numeric string. Everything here is pure so
//! the quirks stay exhaustively testable.

use credential_store::AuthUser;
use serde_json::Value;

/// Epoch values below this are taken to be seconds, not milliseconds.
const MS_THRESHOLD: i64 = 1_000_000_000_000;

/// Normalize an expiry to epoch milliseconds.
pub fn normalize_valid_till_ms(raw: i64) -> i64 {
    if raw < MS_THRESHOLD {
        raw * 1000
    } else {
        raw
    }
}

/// The three values a login-shaped response may carry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoginPayload {
    /// The raw user object, if the response carried one.
    pub user: Option<Value>,
    /// The bearer token, under either of its names.
    pub token: Option<String>,
    /// The expiry as sent, before seconds/milliseconds normalization.
    pub valid_till: Option<i64>,
}

/// Pull the user, token and expiry out of a login-shaped response body.
pub fn normalize_login_response(body: &Value) -> LoginPayload {
    let inner = body.get("data").unwrap_or(body);

    let token = ["token", "access_token"]
        .iter()
        .find_map(|key| inner.get(*key).and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let valid_till = ["valid_till", "expires_at"]
        .iter()
        .find_map(|key| inner.get(*key).and_then(numeric_value));

    LoginPayload {
        user: inner.get("user").filter(|u| u.is_object()).cloned(),
        token,
        valid_till,
    }
}

/// Accept a JSON number or a numeric string.
fn numeric_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Build an [`AuthUser`] from a backend user payload.
///
/// Guarantees an `id` (string or number accepted; the mobile number is the
/// last resort) and attaches the mobile fields the user authenticated with.
/// Every other payload field is carried through opaquely.
pub fn auth_user_from_payload(payload: Option<&Value>, country_code: &str, mobile: &str) -> AuthUser {
    let mut user = AuthUser::new(mobile, country_code, mobile);

    if let Some(Value::Object(map)) = payload {
        for (key, value) in map {
            match key.as_str() {
                "id" => {
                    if let Some(s) = value.as_str() {
                        user.id = s.to_string();
                    } else if let Some(n) = value.as_i64() {
                        user.id = n.to_string();
                    }
                }
                // The values the user actually typed win over the payload's
                "mobile_country_code" | "mobile_number" => {}
                _ => {
                    user.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    user
}
