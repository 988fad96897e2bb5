//! Request boundary shared by the HTTP server and the interactive REPL.
//!
//! [`ChatService`] is the single place collaborator failures surface:
//! it resolves the conversation id, loads state (degrading to a fresh
//! conversation when the store is unreachable), advances the dialogue
//! engine, and persists the result unconditionally — even on the
//! non-transition clarification path, so `updated_at` advances.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use infrapilot_core::engine::DialogueEngine;
use infrapilot_core::error::{Error, Result};
use infrapilot_core::models::ConversationState;
use infrapilot_core::store::ConversationStore;

/// Incoming chat turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Outgoing chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub conversation_id: String,
}

/// Boundary adapter: one `handle` call per conversational turn.
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    engine: DialogueEngine,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>, engine: DialogueEngine) -> Self {
        Self { store, engine }
    }

    /// Process one turn.
    ///
    /// Fails with [`Error::BadRequest`] before touching the store when
    /// the message is missing or empty. A store load failure degrades
    /// to a fresh conversation; a save failure is logged and the reply
    /// is still returned — conversational state is advisory, not
    /// authoritative.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply> {
        let message = request.message.unwrap_or_default();
        if message.is_empty() {
            return Err(Error::BadRequest("No message provided".to_string()));
        }

        let conversation_id = request
            .conversation_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let state = match self.store.load(&conversation_id).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %err,
                    "failed to load conversation state, starting fresh"
                );
                ConversationState::new(conversation_id.clone())
            }
        };

        let outcome = self.engine.advance(state, &message).await?;

        if let Err(err) = self.store.save(&outcome.state).await {
            tracing::error!(
                conversation_id = %conversation_id,
                error = %err,
                "failed to save conversation state"
            );
        }

        Ok(ChatReply {
            message: outcome.reply,
            conversation_id,
        })
    }
}

/// Interactive chat loop on stdin/stdout. Keeps a single conversation
/// id across turns; `exit` quits.
pub async fn run_repl(service: &ChatService) -> anyhow::Result<()> {
    println!("InfraPilot interactive chat");
    println!("Type 'exit' to quit");
    println!();

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut conversation_id: Option<String> = None;

    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let request = ChatRequest {
            message: Some(input.to_string()),
            conversation_id: conversation_id.clone(),
        };

        match service.handle(request).await {
            Ok(reply) => {
                conversation_id = Some(reply.conversation_id.clone());
                println!("Pilot: {}", reply.message);
            }
            Err(err) => {
                tracing::error!(error = %err, "chat turn failed");
                println!("Pilot: I encountered an error. Please try again.");
            }
        }
        println!();
    }

    Ok(())
}
