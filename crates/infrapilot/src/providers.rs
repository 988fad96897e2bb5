//! Gemini-backed collaborator implementations.
//!
//! Two providers, both talking to the Google Generative Language API:
//! - **[`GeminiClassifier`]** — embeds the utterance and every candidate
//!   intent description via `batchEmbedContents`, scores candidates by
//!   cosine similarity, and reports the best raw match. The acceptance
//!   threshold is applied by the dialogue engine, not here.
//! - **[`GeminiGenerator`]** — calls `generateContent` with a fixed
//!   prompt template carrying the intent id and collected slot values.
//!
//! Plus a `disabled` variant of each that always errors, used when no
//! credentials are configured.
//!
//! # Retry Strategy
//!
//! Both providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;

use infrapilot_core::classifier::{IntentCandidate, IntentClassifier, IntentMatch};
use infrapilot_core::error::{Error, Result};
use infrapilot_core::generator::Generator;

use crate::config::{ClassifierConfig, GeneratorConfig};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Create the configured [`IntentClassifier`].
///
/// # Errors
///
/// Fails for unknown providers, a missing model, or a missing
/// `GOOGLE_API_KEY` when the provider is `gemini`.
pub fn create_classifier(config: &ClassifierConfig) -> anyhow::Result<Arc<dyn IntentClassifier>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClassifier)),
        "gemini" => Ok(Arc::new(GeminiClassifier::new(config)?)),
        other => bail!("Unknown classifier provider: {}", other),
    }
}

/// Create the configured [`Generator`].
pub fn create_generator(config: &GeneratorConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        other => bail!("Unknown generator provider: {}", other),
    }
}

fn api_key() -> anyhow::Result<String> {
    match std::env::var("GOOGLE_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => bail!("GOOGLE_API_KEY environment variable not set"),
    }
}

// ============ Disabled Providers ============

/// Classifier used when no credentials are configured; always errors.
pub struct DisabledClassifier;

#[async_trait]
impl IntentClassifier for DisabledClassifier {
    async fn classify(
        &self,
        _utterance: &str,
        _candidates: &[IntentCandidate],
    ) -> Result<Option<IntentMatch>> {
        Err(Error::collaborator(
            "classifier",
            "classifier provider is disabled",
        ))
    }
}

/// Generator used when no credentials are configured; always errors.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _intent_id: &str, _slots: &[(String, String)]) -> Result<String> {
        Err(Error::collaborator(
            "generator",
            "generator provider is disabled",
        ))
    }
}

// ============ Shared HTTP plumbing ============

/// POST a JSON body with retry/backoff, returning the parsed response.
///
/// Retries 429/5xx/network errors up to `max_retries` times; any other
/// client error fails immediately.
async fn post_with_retry(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client.post(url).json(body).send().await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| Error::collaborator(service, e));
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(Error::collaborator(
                        service,
                        format!("Gemini API error {}: {}", status, body_text),
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                return Err(Error::collaborator(
                    service,
                    format!("Gemini API error {}: {}", status, body_text),
                ));
            }
            Err(e) => {
                last_err = Some(Error::collaborator(service, e));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| Error::collaborator(service, "request failed after retries")))
}

fn build_client(timeout_secs: u64, service: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::collaborator(service, e))
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

// ============ Gemini Classifier ============

/// Embedding-similarity intent classifier.
///
/// Embeds `[utterance, description_1, ..., description_n]` in one batch
/// call and scores each candidate by cosine similarity against the
/// utterance. Reports the argmax with its raw score; negative
/// similarities are clamped to `0.0` so confidence stays in `[0, 1]`.
pub struct GeminiClassifier {
    model: String,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl GeminiClassifier {
    pub fn new(config: &ClassifierConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("classifier.model required for Gemini provider"))?;
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            model,
            endpoint,
            api_key: api_key()?,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let client = build_client(self.timeout_secs, "classifier")?;
        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.endpoint, self.model, self.api_key
        );

        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [ { "text": text } ] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let json = post_with_retry(&client, "classifier", &url, &body, self.max_retries).await?;
        parse_embeddings(&json)
    }
}

/// Extract the `embeddings[].values` arrays, in request order.
fn parse_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::collaborator("classifier", "invalid response: missing embeddings array")
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let values = embedding
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                Error::collaborator("classifier", "invalid response: missing embedding values")
            })?;
        let vec: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

#[async_trait]
impl IntentClassifier for GeminiClassifier {
    async fn classify(
        &self,
        utterance: &str,
        candidates: &[IntentCandidate],
    ) -> Result<Option<IntentMatch>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut texts: Vec<&str> = Vec::with_capacity(candidates.len() + 1);
        texts.push(utterance);
        texts.extend(candidates.iter().map(|c| c.description.as_str()));

        let embeddings = self.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::collaborator(
                "classifier",
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    embeddings.len()
                ),
            ));
        }

        let Some((utterance_vec, candidate_vecs)) = embeddings.split_first() else {
            return Err(Error::collaborator("classifier", "empty embedding response"));
        };

        let best = candidates
            .iter()
            .zip(candidate_vecs.iter())
            .map(|(candidate, vec)| {
                let score = f64::from(cosine_similarity(utterance_vec, vec)).max(0.0);
                IntentMatch {
                    intent_id: candidate.id.clone(),
                    confidence: score,
                }
            })
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        Ok(best)
    }
}

// ============ Gemini Generator ============

/// Infrastructure-code generator backed by `generateContent`.
pub struct GeminiGenerator {
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    max_retries: u32,
    timeout_secs: u64,
}

impl GeminiGenerator {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generator.model required for Gemini provider"))?;
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            model,
            endpoint,
            api_key: api_key()?,
            temperature: config.temperature,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

/// Render the fixed generation prompt. Slot lines follow the intent's
/// declared order so identical inputs produce identical prompts.
fn build_prompt(intent_id: &str, slots: &[(String, String)]) -> String {
    let mut configuration = String::new();
    for (name, value) in slots {
        configuration.push_str(&format!("  {}: {}\n", name, value));
    }

    format!(
        "Generate infrastructure code for:\n\
         Intent: {}\n\
         Configuration:\n\
         {}\n\
         Return only the infrastructure code without any explanation.",
        intent_id, configuration
    )
}

/// Extract and concatenate the first candidate's text parts.
fn parse_generated_text(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            Error::collaborator("generator", "invalid response: missing candidates")
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(Error::collaborator(
            "generator",
            "invalid response: empty generation",
        ));
    }

    Ok(text)
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, intent_id: &str, slots: &[(String, String)]) -> Result<String> {
        let client = build_client(self.timeout_secs, "generator")?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [ {
                "role": "user",
                "parts": [ { "text": build_prompt(intent_id, slots) } ],
            } ],
            "generationConfig": { "temperature": self.temperature },
        });

        let json = post_with_retry(&client, "generator", &url, &body, self.max_retries).await?;
        parse_generated_text(&json)
    }
}
