//! Credential key constants.

/// Persisted keys used by the console
pub struct CredentialKeys;

impl CredentialKeys {
    /// Bearer token
    pub const TOKEN: &'static str = "zo_token";

    /// Serialized authenticated user
    pub const USER: &'static str = "zo_user";

    /// Token expiry (string epoch milliseconds)
    pub const TOKEN_VALID_TILL: &'static str = "zo_token_valid_till";

    /// Device ID (generated once, never rotated)
    pub const DEVICE_ID: &'static str = "zo_device_id";

    /// Device secret (generated once, never rotated)
    pub const DEVICE_SECRET: &'static str = "zo_device_secret";

    /// The keys removed on logout. Device identity survives logout so the
    /// device is still recognized on the next login.
    pub const SESSION_KEYS: [&'static str; 3] =
        [Self::TOKEN, Self::USER, Self::TOKEN_VALID_TILL];
}
