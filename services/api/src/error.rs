//! services/api/src/error.rs
//!
//! Failures that stop the companion service from starting or serving. Per-message
//! failures never reach this type; they are answered on the message bus instead.

use crate::config::ConfigError;
use study_cards_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The environment did not describe a usable service, e.g. a bad `BIND_ADDRESS`.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Opening storage or migrating highlights failed at startup.
    #[error("Startup failed in a service port: {0}")]
    Port(#[from] PortError),

    /// Binding the listener or serving connections.
    #[error("Server IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Internal(String),
}
