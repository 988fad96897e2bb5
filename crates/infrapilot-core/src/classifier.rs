//! Intent classifier trait.
//!
//! Classification is delegated to an external model; the core only
//! defines the interface. The classifier reports its best raw match —
//! the engine owns the confidence threshold, so acceptance semantics
//! stay testable with stubbed classifiers.
//!
//! Concrete implementations (Gemini embeddings) live in the `infrapilot`
//! app crate.

use async_trait::async_trait;

use crate::error::Result;

/// A registered intent presented to the classifier as a match target.
#[derive(Debug, Clone)]
pub struct IntentCandidate {
    pub id: String,
    pub description: String,
}

/// The classifier's best match for an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentMatch {
    /// Id of the best-matching candidate.
    pub intent_id: String,
    /// Raw similarity score in `[0.0, 1.0]`. The engine accepts only
    /// when this is strictly above its threshold.
    pub confidence: f64,
}

/// Classifies a free-text utterance against candidate intent descriptions.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Return the best-matching candidate with its confidence, or `None`
    /// when no candidate matches at all. Candidates are given in
    /// registry declaration order.
    async fn classify(
        &self,
        utterance: &str,
        candidates: &[IntentCandidate],
    ) -> Result<Option<IntentMatch>>;
}
