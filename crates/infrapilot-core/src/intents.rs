//! Intent definitions and the read-only intent registry.
//!
//! An [`IntentDefinition`] pairs a classifier-facing description with an
//! ordered list of slots; the order defines the fixed sequence in which
//! the engine asks its questions. The registry is built once at process
//! start (from the built-ins or from configuration) and never mutated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single named parameter required to fully specify an intent's action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    /// Slot name, unique within its intent (e.g. `instance_type`).
    pub name: String,
    /// The question asked to elicit this slot.
    pub prompt: String,
}

/// A classified user goal with its ordered slot schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefinition {
    /// Unique intent id (e.g. `DEPLOY_EC2`).
    pub id: String,
    /// Natural-language sentence used as the classifier's matching target.
    pub description: String,
    /// Slots in the order they are requested. May be empty, in which case
    /// the intent completes on the turn it is detected.
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
}

fn slot(name: &str, prompt: &str) -> SlotDefinition {
    SlotDefinition {
        name: name.to_string(),
        prompt: prompt.to_string(),
    }
}

/// Fixed table of intents, preserving declaration order.
///
/// Declaration order matters twice: it is the order candidates are
/// presented to the classifier, and each intent's slot order is the
/// order questions are asked.
#[derive(Debug, Clone)]
pub struct IntentRegistry {
    intents: Vec<IntentDefinition>,
}

impl IntentRegistry {
    pub fn new(intents: Vec<IntentDefinition>) -> Self {
        Self { intents }
    }

    /// The built-in deployment intents.
    pub fn builtins() -> Self {
        Self::new(vec![
            IntentDefinition {
                id: "DEPLOY_EC2".to_string(),
                description: "Deploy Docker on EC2".to_string(),
                slots: vec![
                    slot("instance_type", "What EC2 instance type do you want to use?"),
                    slot("region", "Which AWS region should the instance be deployed in?"),
                    slot("image_name", "What's the name of your Docker image?"),
                ],
            },
            IntentDefinition {
                id: "DEPLOY_K8S".to_string(),
                description: "Deploy Docker on Kubernetes".to_string(),
                slots: vec![
                    slot("cluster_name", "What should we name the Kubernetes cluster?"),
                    slot("node_count", "How many worker nodes do you need?"),
                    slot("node_type", "What instance type for the worker nodes?"),
                ],
            },
        ])
    }

    /// All registered intents in declaration order.
    pub fn all(&self) -> &[IntentDefinition] {
        &self.intents
    }

    /// Look up an intent by id. Fails with [`Error::UnknownIntent`] so a
    /// hallucinated classifier label can never proceed with undefined
    /// slots.
    pub fn get(&self, intent_id: &str) -> Result<&IntentDefinition> {
        self.intents
            .iter()
            .find(|i| i.id == intent_id)
            .ok_or_else(|| Error::UnknownIntent(intent_id.to_string()))
    }

    /// First declared slot of an intent, or `None` for zero-slot intents.
    pub fn first_slot(&self, intent_id: &str) -> Result<Option<&SlotDefinition>> {
        Ok(self.get(intent_id)?.slots.first())
    }

    /// First declared slot not present in `filled`, or `None` when every
    /// slot has a value.
    pub fn next_unfilled_slot(
        &self,
        intent_id: &str,
        filled: &HashMap<String, String>,
    ) -> Result<Option<&SlotDefinition>> {
        Ok(self
            .get(intent_id)?
            .slots
            .iter()
            .find(|s| !filled.contains_key(&s.name)))
    }
}
