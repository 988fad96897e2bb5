//! SQLite-backed [`ConversationStore`] implementation.
//!
//! One row per conversation in the `conversations` table. Slot values
//! are stored as a JSON object in `slots_json`; `updated_at` is stamped
//! on every save.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use infrapilot_core::error::{Error, Result};
use infrapilot_core::models::{ConversationState, DialogueState};
use infrapilot_core::store::ConversationStore;

/// SQLite implementation of the [`ConversationStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load(&self, id: &str) -> Result<ConversationState> {
        let row = sqlx::query(
            "SELECT id, state, current_intent, slots_json, last_reply, updated_at
             FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::collaborator("store", e))?;

        let Some(row) = row else {
            // Unknown id is a default, not an error.
            return Ok(ConversationState::new(id));
        };

        let state_text: String = row.get("state");
        let state = DialogueState::parse(&state_text).ok_or_else(|| {
            Error::collaborator("store", format!("invalid dialogue state '{}'", state_text))
        })?;

        let slots_json: String = row.get("slots_json");
        let slots: HashMap<String, String> = serde_json::from_str(&slots_json)
            .map_err(|e| Error::collaborator("store", format!("invalid slots record: {}", e)))?;

        Ok(ConversationState {
            id: row.get("id"),
            state,
            current_intent: row.get("current_intent"),
            slots,
            last_reply: row.get("last_reply"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        let slots_json = serde_json::to_string(&state.slots)
            .map_err(|e| Error::collaborator("store", e))?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO conversations (id, state, current_intent, slots_json, last_reply, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                current_intent = excluded.current_intent,
                slots_json = excluded.slots_json,
                last_reply = excluded.last_reply,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.id)
        .bind(state.state.as_str())
        .bind(&state.current_intent)
        .bind(&slots_json)
        .bind(&state.last_reply)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::collaborator("store", e))?;

        Ok(())
    }
}
