use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use infrapilot_core::intents::{IntentDefinition, IntentRegistry};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    pub server: ServerConfig,
    /// Custom intents replacing the built-ins. An array of tables so
    /// slot order is preserved.
    #[serde(default)]
    pub intents: Vec<IntentDefinition>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Embedding model (e.g. `text-embedding-004`). Required when the
    /// provider is `gemini`.
    #[serde(default)]
    pub model: Option<String>,
    /// Exclusive acceptance threshold: a score exactly at the threshold
    /// is a miss.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            threshold: default_threshold(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Generation model (e.g. `gemini-1.5-pro`). Required when the
    /// provider is `gemini`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_threshold() -> f64 {
    0.7
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_temperature() -> f32 {
    0.2
}

impl Config {
    /// Build the intent registry: configured intents when present,
    /// built-ins otherwise.
    pub fn registry(&self) -> IntentRegistry {
        if self.intents.is_empty() {
            IntentRegistry::builtins()
        } else {
            IntentRegistry::new(self.intents.clone())
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate classifier
    if !(0.0..=1.0).contains(&config.classifier.threshold) {
        anyhow::bail!("classifier.threshold must be in [0.0, 1.0]");
    }
    validate_provider("classifier", &config.classifier.provider, &config.classifier.model)?;
    validate_provider("generator", &config.generator.provider, &config.generator.model)?;

    // Validate custom intents
    for intent in &config.intents {
        if intent.id.is_empty() {
            anyhow::bail!("intents entries must have a non-empty id");
        }
        let dupes = config.intents.iter().filter(|i| i.id == intent.id).count();
        if dupes > 1 {
            anyhow::bail!("duplicate intent id: '{}'", intent.id);
        }
        for slot in &intent.slots {
            if slot.name.is_empty() {
                anyhow::bail!("intent '{}' has a slot with an empty name", intent.id);
            }
            let slot_dupes = intent.slots.iter().filter(|s| s.name == slot.name).count();
            if slot_dupes > 1 {
                anyhow::bail!(
                    "intent '{}' declares slot '{}' more than once",
                    intent.id,
                    slot.name
                );
            }
        }
    }

    Ok(config)
}

fn validate_provider(section: &str, provider: &str, model: &Option<String>) -> Result<()> {
    match provider {
        "disabled" => Ok(()),
        "gemini" => {
            if model.is_none() {
                anyhow::bail!("{}.model must be specified when provider is 'gemini'", section);
            }
            Ok(())
        }
        other => anyhow::bail!(
            "Unknown {} provider: '{}'. Must be disabled or gemini.",
            section,
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let tmp = tempfile::NamedTempFile::new()?;
        std::fs::write(tmp.path(), toml_str)?;
        load_config(tmp.path())
    }

    const MINIMAL: &str = r#"
[db]
path = "./data/pilot.sqlite"

[server]
bind = "127.0.0.1:8388"
"#;

    #[test]
    fn minimal_config_applies_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.classifier.provider, "disabled");
        assert_eq!(config.classifier.threshold, 0.7);
        assert_eq!(config.classifier.max_retries, 5);
        assert_eq!(config.generator.provider, "disabled");
        assert!(config.intents.is_empty());
    }

    #[test]
    fn minimal_config_falls_back_to_builtin_intents() {
        let config = parse(MINIMAL).unwrap();
        let registry = config.registry();
        assert!(registry.get("DEPLOY_EC2").is_ok());
        assert!(registry.get("DEPLOY_K8S").is_ok());
    }

    #[test]
    fn custom_intents_preserve_slot_order() {
        let toml_str = format!(
            "{}\n{}",
            MINIMAL,
            r#"
[[intents]]
id = "DEPLOY_LAMBDA"
description = "Deploy a serverless function"

  [[intents.slots]]
  name = "function_name"
  prompt = "What should the function be called?"

  [[intents.slots]]
  name = "runtime"
  prompt = "Which runtime do you want?"
"#
        );
        let config = parse(&toml_str).unwrap();
        let registry = config.registry();
        let intent = registry.get("DEPLOY_LAMBDA").unwrap();
        let names: Vec<&str> = intent.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["function_name", "runtime"]);
        // Custom intents replace the built-ins.
        assert!(registry.get("DEPLOY_EC2").is_err());
    }

    #[test]
    fn gemini_provider_requires_model() {
        let toml_str = format!("{}\n[classifier]\nprovider = \"gemini\"\n", MINIMAL);
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("classifier.model"));
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let toml_str = format!(
            "{}\n[classifier]\nprovider = \"disabled\"\nthreshold = 1.5\n",
            MINIMAL
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let toml_str = format!("{}\n[generator]\nprovider = \"openai\"\n", MINIMAL);
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("Unknown generator provider"));
    }

    #[test]
    fn duplicate_intent_ids_rejected() {
        let toml_str = format!(
            "{}\n{}",
            MINIMAL,
            r#"
[[intents]]
id = "A"
description = "first"

[[intents]]
id = "A"
description = "second"
"#
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate intent id"));
    }

    #[test]
    fn duplicate_slot_names_rejected() {
        let toml_str = format!(
            "{}\n{}",
            MINIMAL,
            r#"
[[intents]]
id = "A"
description = "first"

  [[intents.slots]]
  name = "x"
  prompt = "first x?"

  [[intents.slots]]
  name = "x"
  prompt = "second x?"
"#
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
