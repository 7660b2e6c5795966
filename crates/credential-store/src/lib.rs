//! Durable credential storage for the Zo operations console.
//!
//! Persists the bearer token, serialized user, token expiry, and the stable
//! device-identity pair across restarts. Session values are cleared on logout
//! and on authorization failure; device identity is generated once and kept
//! forever.

mod file;
mod keys;
mod manager;
mod session;
mod traits;

pub use file::FileStorage;
pub use keys::CredentialKeys;
pub use manager::CredentialManager;
pub use session::{AuthUser, DeviceIdentity, Session};
pub use traits::CredentialStorage;

use console_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a CredentialManager backed by the console's credentials file.
pub fn create_credential_manager(paths: &Paths) -> StorageResult<CredentialManager> {
    let storage = FileStorage::open(paths.credentials_file())?;
    Ok(CredentialManager::new(Box::new(storage)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_credential_manager() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let manager = create_credential_manager(&paths).unwrap();
        assert!(!manager.has_session().unwrap());
    }

    #[test]
    fn test_manager_persists_across_instances() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let identity = {
            let manager = create_credential_manager(&paths).unwrap();
            manager.device_identity().unwrap()
        };

        let manager = create_credential_manager(&paths).unwrap();
        assert_eq!(manager.device_identity().unwrap(), identity);
    }
}
