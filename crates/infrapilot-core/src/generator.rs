//! Code generator trait.
//!
//! Invoked exactly once per conversation, on the transition into the
//! Complete state, with the detected intent and every collected slot.
//! The Gemini-backed implementation lives in the `infrapilot` app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Generates the infrastructure-as-code artifact for a fully-specified
/// intent.
#[async_trait]
pub trait Generator: Send + Sync {
    /// `slots` carries every collected value as `(name, value)` pairs in
    /// the intent's declared order, so identical inputs always produce
    /// an identical request to the backing model.
    async fn generate(&self, intent_id: &str, slots: &[(String, String)]) -> Result<String>;
}
