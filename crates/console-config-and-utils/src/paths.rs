//! File system paths for the console.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the console.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for console runtime files (~/.zo-console)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.zo-console`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".zo-console"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.zo-console).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.zo-console/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the credentials file path (~/.zo-console/credentials.json).
    pub fn credentials_file(&self) -> PathBuf {
        self.base_dir.join("credentials.json")
    }

    /// Get the logs directory (~/.zo-console/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the console log file path (~/.zo-console/logs/console.log).
    pub fn console_log_file(&self) -> PathBuf {
        self.logs_dir().join("console.log")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("Failed to determine home directory")
    }
}
