//! crates/study_cards_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the storage backend, the model provider and the flashcard app.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Flashcard, ModelCredentials};
use crate::parser::ParseFailure;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// Every failure is scoped to the single operation that produced it; nothing here
/// is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The caller supplied something unusable (empty selection, missing API key).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A remote collaborator could not be reached or answered with a non-2xx status.
    #[error("Network error: {0}")]
    Network(String),
    /// A remote collaborator answered, but reported an error in its payload.
    #[error("Rejected by remote service: {0}")]
    Rejected(String),
    /// The model reply could not be turned into flashcards.
    #[error("Malformed model response ({failure})")]
    MalformedResponse { failure: ParseFailure, raw: String },
    /// The persistence layer failed. Callers should re-read before retrying.
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// A short, stable tag for the error class, suitable for UI branching.
    pub fn kind(&self) -> &'static str {
        match self {
            PortError::InvalidInput(_) => "input",
            PortError::Network(_) => "network",
            PortError::Rejected(_) => "rejected",
            PortError::MalformedResponse { .. } => "malformed_response",
            PortError::Storage(_) => "storage",
            PortError::Unexpected(_) => "unexpected",
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A namespaced key-value store holding JSON values, in the manner of extension
/// local storage. Implementations must make `set` durable before returning.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Sends one user-role prompt and returns the single text reply.
    async fn complete(&self, prompt: &str, credentials: &ModelCredentials) -> PortResult<String>;
}

/// The external flashcard application.
#[async_trait]
pub trait FlashcardSink: Send + Sync {
    /// Version handshake. Never fails: any error means "unavailable".
    async fn is_available(&self) -> bool;

    async fn list_decks(&self) -> PortResult<Vec<String>>;

    /// Adds one note per card. Each slot holds the created note id, or `None`
    /// when the sink refused that card (duplicates are the usual reason).
    async fn add_cards(&self, cards: &[Flashcard], deck_name: &str) -> PortResult<Vec<Option<u64>>>;

    async fn sync(&self) -> PortResult<()>;
}
