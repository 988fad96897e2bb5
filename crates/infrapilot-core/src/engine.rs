//! Slot-filling dialogue engine.
//!
//! [`DialogueEngine::advance`] is the single state-transition function:
//! it takes the current [`ConversationState`] and the new user utterance
//! and returns the updated state plus the reply to show the user.
//!
//! External effects are gated strictly by the entry state:
//!
//! | Entry state | External call |
//! |-------------|---------------|
//! | `Start` | classifier, once |
//! | `CollectingSlots` | generator, only on the turn that fills the last slot |
//! | `Complete` | none — the final reply is replayed |
//!
//! Collaborator failures propagate as typed errors to the request
//! boundary; the engine itself neither retries nor logs.

use std::sync::Arc;

use crate::classifier::{IntentCandidate, IntentClassifier};
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::intents::IntentRegistry;
use crate::models::{ConversationState, DialogueState};

/// Classifier scores at or below this are treated as a miss unless
/// overridden via [`DialogueEngine::with_threshold`].
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Reply when no intent clears the confidence threshold. Not an error:
/// the conversation simply stays at Start.
pub const CLARIFICATION_REPLY: &str =
    "I'm not sure what you'd like to do. Could you please be more specific?";

/// Prefix of the final reply carrying the generated artifact.
pub const CODE_REPLY_PREFIX: &str = "Here's your infrastructure code:\n\n";

/// Result of one conversational turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Updated conversation state, to be persisted by the caller.
    pub state: ConversationState,
    /// Message to show the user.
    pub reply: String,
}

/// The conversation manager. Holds the registry and both collaborators
/// as explicit dependencies; construction happens once at process start.
pub struct DialogueEngine {
    registry: Arc<IntentRegistry>,
    classifier: Arc<dyn IntentClassifier>,
    generator: Arc<dyn Generator>,
    threshold: f64,
}

impl DialogueEngine {
    pub fn new(
        registry: Arc<IntentRegistry>,
        classifier: Arc<dyn IntentClassifier>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            registry,
            classifier,
            generator,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Override the acceptance threshold. The comparison is exclusive:
    /// a score exactly at the threshold is a miss.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Advance the conversation by one turn.
    pub async fn advance(&self, state: ConversationState, utterance: &str) -> Result<TurnOutcome> {
        match state.state {
            DialogueState::Start => self.detect_intent(state, utterance).await,
            DialogueState::CollectingSlots => self.collect_slot(state, utterance).await,
            DialogueState::Complete => Ok(Self::replay(state)),
        }
    }

    /// Start state: classify the utterance and either begin collecting
    /// slots or ask for clarification.
    async fn detect_intent(
        &self,
        state: ConversationState,
        utterance: &str,
    ) -> Result<TurnOutcome> {
        let candidates: Vec<IntentCandidate> = self
            .registry
            .all()
            .iter()
            .map(|i| IntentCandidate {
                id: i.id.clone(),
                description: i.description.clone(),
            })
            .collect();

        let matched = self
            .classifier
            .classify(utterance, &candidates)
            .await?
            .filter(|m| m.confidence > self.threshold);

        let Some(matched) = matched else {
            // Non-transition: state stays at Start, slots stay empty.
            return Ok(TurnOutcome {
                state,
                reply: CLARIFICATION_REPLY.to_string(),
            });
        };

        // A hallucinated label outside the registry must not proceed.
        let intent_id = self.registry.get(&matched.intent_id)?.id.clone();

        let mut state = state;
        state.current_intent = Some(intent_id.clone());
        state.slots.clear();
        state.state = DialogueState::CollectingSlots;

        match self.registry.first_slot(&intent_id)? {
            Some(slot) => {
                let reply = slot.prompt.clone();
                state.last_reply = Some(reply.clone());
                Ok(TurnOutcome { state, reply })
            }
            // Zero-slot intent: nothing to collect, generate immediately.
            None => self.finish(state).await,
        }
    }

    /// CollectingSlots state: record the answer to the question asked on
    /// the previous turn, then ask the next question or finish.
    async fn collect_slot(
        &self,
        state: ConversationState,
        utterance: &str,
    ) -> Result<TurnOutcome> {
        let intent_id = state
            .current_intent
            .clone()
            .ok_or_else(|| Error::UnknownIntent("(conversation has no intent)".to_string()))?;

        let mut state = state;

        // The utterance answers the most recently asked question, i.e.
        // the first unfilled slot at entry. Stored verbatim — values are
        // opaque strings, never validated or coerced.
        let pending = self
            .registry
            .next_unfilled_slot(&intent_id, &state.slots)?
            .map(|s| s.name.clone());
        if let Some(name) = pending {
            state.slots.insert(name, utterance.to_string());
        }

        match self.registry.next_unfilled_slot(&intent_id, &state.slots)? {
            Some(next) => {
                let reply = next.prompt.clone();
                state.last_reply = Some(reply.clone());
                Ok(TurnOutcome { state, reply })
            }
            None => self.finish(state).await,
        }
    }

    /// All slots filled: invoke the generator once and enter the
    /// terminal Complete state.
    async fn finish(&self, mut state: ConversationState) -> Result<TurnOutcome> {
        let intent_id = state
            .current_intent
            .clone()
            .ok_or_else(|| Error::UnknownIntent("(conversation has no intent)".to_string()))?;
        let intent = self.registry.get(&intent_id)?;

        // Declared order, not map order, so the generator request is
        // deterministic for identical slot values.
        let ordered: Vec<(String, String)> = intent
            .slots
            .iter()
            .filter_map(|s| {
                state
                    .slots
                    .get(&s.name)
                    .map(|v| (s.name.clone(), v.clone()))
            })
            .collect();

        let code = self.generator.generate(&intent_id, &ordered).await?;

        state.state = DialogueState::Complete;
        let reply = format!("{}{}", CODE_REPLY_PREFIX, code);
        state.last_reply = Some(reply.clone());
        Ok(TurnOutcome { state, reply })
    }

    /// Complete is terminal: replay the final reply without touching the
    /// generator.
    fn replay(state: ConversationState) -> TurnOutcome {
        let reply = state.last_reply.clone().unwrap_or_else(|| {
            // Only reachable for hand-written records: the engine always
            // stores the final reply when it completes a conversation.
            "This conversation is complete. Start a new one to generate more code.".to_string()
        });
        TurnOutcome { state, reply }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::classifier::IntentMatch;
    use crate::intents::{IntentDefinition, IntentRegistry};

    /// Classifier stub returning a fixed result.
    struct FixedClassifier {
        result: Option<IntentMatch>,
    }

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(
            &self,
            _utterance: &str,
            _candidates: &[IntentCandidate],
        ) -> Result<Option<IntentMatch>> {
            Ok(self.result.clone())
        }
    }

    /// Generator stub recording every call.
    struct RecordingGenerator {
        calls: AtomicUsize,
        last_request: Mutex<Option<(String, Vec<(String, String)>)>>,
    }

    impl RecordingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, intent_id: &str, slots: &[(String, String)]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() =
                Some((intent_id.to_string(), slots.to_vec()));
            Ok(format!("resource \"{}\" {{}}", intent_id))
        }
    }

    fn engine_with(
        confidence: Option<f64>,
        generator: Arc<RecordingGenerator>,
    ) -> DialogueEngine {
        let classifier = FixedClassifier {
            result: confidence.map(|c| IntentMatch {
                intent_id: "DEPLOY_EC2".to_string(),
                confidence: c,
            }),
        };
        DialogueEngine::new(
            Arc::new(IntentRegistry::builtins()),
            Arc::new(classifier),
            generator,
        )
    }

    #[tokio::test]
    async fn confident_match_starts_slot_collection() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.9), generator.clone());

        let outcome = engine
            .advance(ConversationState::new("c-1"), "deploy my app on ec2")
            .await
            .unwrap();

        assert_eq!(outcome.state.state, DialogueState::CollectingSlots);
        assert_eq!(outcome.state.current_intent.as_deref(), Some("DEPLOY_EC2"));
        assert!(outcome.state.slots.is_empty());
        assert_eq!(outcome.reply, "What EC2 instance type do you want to use?");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn low_confidence_asks_for_clarification() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.5), generator);

        let outcome = engine
            .advance(ConversationState::new("c-1"), "do something")
            .await
            .unwrap();

        assert_eq!(outcome.reply, CLARIFICATION_REPLY);
        assert_eq!(outcome.state.state, DialogueState::Start);
        assert!(outcome.state.current_intent.is_none());
        assert!(outcome.state.slots.is_empty());
    }

    #[tokio::test]
    async fn score_exactly_at_threshold_is_a_miss() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(DEFAULT_CONFIDENCE_THRESHOLD), generator);

        let outcome = engine
            .advance(ConversationState::new("c-1"), "deploy on ec2")
            .await
            .unwrap();

        assert_eq!(outcome.reply, CLARIFICATION_REPLY);
        assert_eq!(outcome.state.state, DialogueState::Start);
    }

    #[tokio::test]
    async fn classifier_returning_nothing_asks_for_clarification() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(None, generator);

        let outcome = engine
            .advance(ConversationState::new("c-1"), "gibberish")
            .await
            .unwrap();

        assert_eq!(outcome.reply, CLARIFICATION_REPLY);
        assert_eq!(outcome.state.state, DialogueState::Start);
    }

    #[tokio::test]
    async fn unregistered_classifier_label_fails_with_unknown_intent() {
        let classifier = FixedClassifier {
            result: Some(IntentMatch {
                intent_id: "DEPLOY_MARS".to_string(),
                confidence: 0.95,
            }),
        };
        let engine = DialogueEngine::new(
            Arc::new(IntentRegistry::builtins()),
            Arc::new(classifier),
            Arc::new(RecordingGenerator::new()),
        );

        let err = engine
            .advance(ConversationState::new("c-1"), "colonize mars")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownIntent(id) if id == "DEPLOY_MARS"));
    }

    #[tokio::test]
    async fn three_turns_fill_all_slots_and_generate_once() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.9), generator.clone());

        let turn1 = engine
            .advance(ConversationState::new("c-1"), "deploy docker on ec2")
            .await
            .unwrap();
        let turn2 = engine.advance(turn1.state, "t2.micro").await.unwrap();
        assert_eq!(
            turn2.reply,
            "Which AWS region should the instance be deployed in?"
        );
        let turn3 = engine.advance(turn2.state, "us-east-1").await.unwrap();
        assert_eq!(turn3.reply, "What's the name of your Docker image?");
        assert_eq!(turn3.state.state, DialogueState::CollectingSlots);

        let turn4 = engine.advance(turn3.state, "myapp:latest").await.unwrap();
        assert_eq!(turn4.state.state, DialogueState::Complete);
        assert!(turn4.reply.starts_with(CODE_REPLY_PREFIX));

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        let (intent_id, slots) = generator.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(intent_id, "DEPLOY_EC2");
        assert_eq!(
            slots,
            vec![
                ("instance_type".to_string(), "t2.micro".to_string()),
                ("region".to_string(), "us-east-1".to_string()),
                ("image_name".to_string(), "myapp:latest".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn slot_answers_are_stored_verbatim() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.9), generator);

        let turn1 = engine
            .advance(ConversationState::new("c-1"), "deploy on ec2")
            .await
            .unwrap();
        let turn2 = engine
            .advance(turn1.state, "  T2.MICRO with spaces  ")
            .await
            .unwrap();

        assert_eq!(
            turn2.state.slots.get("instance_type").map(String::as_str),
            Some("  T2.MICRO with spaces  ")
        );
    }

    #[tokio::test]
    async fn zero_slot_intent_completes_on_detection_turn() {
        let registry = IntentRegistry::new(vec![IntentDefinition {
            id: "SHOW_STATUS".to_string(),
            description: "Show deployment status".to_string(),
            slots: Vec::new(),
        }]);
        let classifier = FixedClassifier {
            result: Some(IntentMatch {
                intent_id: "SHOW_STATUS".to_string(),
                confidence: 0.9,
            }),
        };
        let generator = Arc::new(RecordingGenerator::new());
        let engine = DialogueEngine::new(
            Arc::new(registry),
            Arc::new(classifier),
            generator.clone(),
        );

        let outcome = engine
            .advance(ConversationState::new("c-1"), "what's deployed?")
            .await
            .unwrap();

        assert_eq!(outcome.state.state, DialogueState::Complete);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn complete_state_replays_without_regenerating() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.9), generator.clone());

        let mut outcome = engine
            .advance(ConversationState::new("c-1"), "deploy on ec2")
            .await
            .unwrap();
        for answer in ["t2.micro", "us-east-1", "myapp:latest"] {
            outcome = engine.advance(outcome.state, answer).await.unwrap();
        }
        let final_reply = outcome.reply.clone();
        assert_eq!(outcome.state.state, DialogueState::Complete);

        let replayed = engine.advance(outcome.state, "thanks!").await.unwrap();
        assert_eq!(replayed.reply, final_reply);
        assert_eq!(replayed.state.state, DialogueState::Complete);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn advance_is_deterministic_with_stubbed_collaborators() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.9), generator);

        let first = engine
            .advance(ConversationState::new("c-1"), "deploy on ec2")
            .await
            .unwrap();
        let second = engine
            .advance(ConversationState::new("c-1"), "deploy on ec2")
            .await
            .unwrap();

        assert_eq!(first.state, second.state);
        assert_eq!(first.reply, second.reply);
    }

    #[tokio::test]
    async fn collected_slots_stay_within_declared_schema() {
        let generator = Arc::new(RecordingGenerator::new());
        let engine = engine_with(Some(0.9), generator);
        let registry = IntentRegistry::builtins();

        let mut outcome = engine
            .advance(ConversationState::new("c-1"), "deploy on ec2")
            .await
            .unwrap();
        for answer in ["t2.micro", "us-east-1"] {
            outcome = engine.advance(outcome.state, answer).await.unwrap();
            let intent = outcome.state.current_intent.as_deref().unwrap();
            let declared = registry.get(intent).unwrap();
            for key in outcome.state.slots.keys() {
                assert!(declared.slots.iter().any(|s| &s.name == key));
            }
        }
    }
}
