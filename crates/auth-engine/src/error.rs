//! Error types for the session controller and login flow.

use http_gateway::GatewayError;
use thiserror::Error;

/// Result type alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors surfaced by the session controller and the OTP login flow.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The phone field does not hold exactly ten digits.
    #[error("Enter a valid 10-digit mobile number")]
    InvalidPhoneNumber,

    /// OTP submission was attempted with empty slots remaining.
    #[error("Enter the complete 6-digit code")]
    IncompleteOtp,

    /// A login or refresh response carried no usable token.
    #[error("Login response carried no token")]
    MissingToken,

    /// The state machine rejected an input in the current state.
    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    /// Gateway-level failure (transport, backend error, or forced logout).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Credential store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] credential_store::StorageError),
}

impl AuthError {
    /// Message suitable for direct display.
    ///
    /// Backend errors surface the backend's own text when it sent any;
    /// transport failures fall back to a generic line.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Gateway(e) => e
                .backend_message()
                .map(str::to_string)
                .unwrap_or_else(|| "Something went wrong. Please try again.".to_string()),
            other => other.to_string(),
        }
    }
}
