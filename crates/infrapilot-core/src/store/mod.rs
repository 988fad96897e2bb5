//! Storage abstraction for conversation state.
//!
//! The [`ConversationStore`] trait defines the two operations the request
//! handler needs, enabling pluggable backends (SQLite in the app crate,
//! in-memory here for tests and embedding).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ConversationState;

/// Abstract storage backend for conversation records.
///
/// Semantics:
/// - `load` of an unknown id returns a fresh Start-state record — that is
///   a default, not an error. Errors are reserved for backend failures
///   (connectivity, corrupt records).
/// - `save` upserts by id and stamps `updated_at`; last write wins. A
///   single logical user drives one conversation serially, so no
///   optimistic concurrency control is needed.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the state for `id`, or a fresh Start state if unknown.
    async fn load(&self, id: &str) -> Result<ConversationState>;

    /// Insert or update the record, overwriting `updated_at`.
    async fn save(&self, state: &ConversationState) -> Result<()>;
}
