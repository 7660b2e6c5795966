//! Storage trait definitions.

use crate::StorageResult;

/// Trait for durable key-value credential storage backends.
///
/// Absence of a key is a valid, common result and is never an error.
pub trait CredentialStorage: Send + Sync {
    /// Store a value, overwriting unconditionally
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
