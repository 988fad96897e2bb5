//! In-memory [`ConversationStore`] implementation for tests and for
//! embedding the engine in other tools.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ConversationState;

use super::ConversationStore;

/// In-memory store; contents are lost when the process exits.
pub struct InMemoryStore {
    records: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load(&self, id: &str) -> Result<ConversationState> {
        let records = self.records.read().unwrap();
        Ok(records
            .get(id)
            .cloned()
            .unwrap_or_else(|| ConversationState::new(id)))
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        let mut stamped = state.clone();
        stamped.updated_at = chrono::Utc::now().timestamp();
        let mut records = self.records.write().unwrap();
        records.insert(stamped.id.clone(), stamped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DialogueState;

    #[tokio::test]
    async fn load_unknown_id_returns_fresh_start_state() {
        let store = InMemoryStore::new();
        let state = store.load("nope").await.unwrap();
        assert_eq!(state.id, "nope");
        assert_eq!(state.state, DialogueState::Start);
        assert!(state.slots.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn load_is_idempotent_without_intervening_save() {
        let store = InMemoryStore::new();
        let mut state = ConversationState::new("c-1");
        state.state = DialogueState::CollectingSlots;
        state.current_intent = Some("DEPLOY_EC2".to_string());
        state
            .slots
            .insert("instance_type".to_string(), "t2.micro".to_string());
        store.save(&state).await.unwrap();

        let first = store.load("c-1").await.unwrap();
        let second = store.load("c-1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn save_upserts_and_stamps_updated_at() {
        let store = InMemoryStore::new();
        let state = ConversationState::new("c-1");
        store.save(&state).await.unwrap();

        let loaded = store.load("c-1").await.unwrap();
        assert!(loaded.updated_at > 0);

        let mut changed = loaded.clone();
        changed.state = DialogueState::CollectingSlots;
        changed.current_intent = Some("DEPLOY_K8S".to_string());
        store.save(&changed).await.unwrap();

        let reloaded = store.load("c-1").await.unwrap();
        assert_eq!(reloaded.state, DialogueState::CollectingSlots);
        assert_eq!(store.len(), 1);
        assert!(reloaded.updated_at >= loaded.updated_at);
    }
}
