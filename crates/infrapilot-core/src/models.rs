//! Core data models for multi-turn conversations.
//!
//! A [`ConversationState`] is the single mutable record per conversation:
//! which phase the dialogue is in, which intent was detected, and which
//! slot values have been collected so far.

use std::collections::HashMap;

/// Phase of a slot-filling conversation.
///
/// Transitions are strictly forward: `Start → CollectingSlots → Complete`.
/// `Complete` is terminal — further turns replay the final reply without
/// re-invoking the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    /// No intent detected yet. The classifier runs only in this state.
    Start,
    /// An intent is set; slots are being collected one per turn.
    CollectingSlots,
    /// All slots filled and code generated. Terminal.
    Complete,
}

impl DialogueState {
    /// Stable text form used in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::CollectingSlots => "COLLECTING_SLOTS",
            Self::Complete => "COMPLETE",
        }
    }

    /// Parse the persisted text form. Returns `None` for unrecognized
    /// values so store implementations can surface a typed error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "START" => Some(Self::Start),
            "COLLECTING_SLOTS" => Some(Self::CollectingSlots),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Per-conversation state, persisted after every turn.
///
/// Invariants maintained by the engine:
/// - `current_intent` is unset iff `state == Start`.
/// - `slots` is empty while `state == Start`.
/// - Every key in `slots` is a slot name declared by `current_intent`.
/// - Once `state == Complete` the record is no longer mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    /// Opaque identifier correlating turns of the same exchange.
    pub id: String,
    pub state: DialogueState,
    /// Set exactly once, on the Start → CollectingSlots transition.
    pub current_intent: Option<String>,
    /// Collected slot values, keyed by slot name. Values are opaque
    /// strings stored verbatim from user input.
    pub slots: HashMap<String, String>,
    /// Most recent engine reply. Lets the terminal Complete state replay
    /// its final message without calling the generator again.
    pub last_reply: Option<String>,
    /// Unix-seconds timestamp, stamped by the store on every write.
    pub updated_at: i64,
}

impl ConversationState {
    /// Fresh conversation in the Start state with no intent and no slots.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: DialogueState::Start,
            current_intent: None,
            slots: HashMap::new(),
            last_reply: None,
            updated_at: 0,
        }
    }
}
