//! Core types, configuration, and utilities for the Zo operations console.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_BASE_URL, DEFAULT_CLIENT_KEY, DEFAULT_LOG_LEVEL, DEFAULT_PROFILE_API_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
