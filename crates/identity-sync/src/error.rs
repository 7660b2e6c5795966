//! Error types for profile synchronization.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing the identity profile.
///
/// Sync is best-effort; callers generally log these and move on rather than
/// surfacing them to the session flow.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The HTTP request itself failed (network, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The profile store answered with a non-success status.
    #[error("Profile store error ({status}): {message}")]
    Store { status: u16, message: String },

    /// The profile store answered 2xx but the body was not what we expect.
    #[error("Malformed profile response: {0}")]
    Malformed(String),
}
