//! Analyzer configuration.
//!
//! Loaded from an optional TOML file and then overridden from the environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | EARNINGS_QA_CUE | loose | `loose` ("first question" / "question comes") or `joint` ("[operator instructions]" + "first question"). |
//! | EARNINGS_TRIGGER_POLICY | retain | Keep (`retain`) or discard (`drop`) the operator turn that opens Q&A. |
//! | EARNINGS_CONFIDENCE_THRESHOLD | 0.5 | Classifications at or below this score are ignored. |
//! | EARNINGS_TOP_N | 5 | Strategic focuses kept per quarter. |
//! | EARNINGS_MEMORY_DEPTH | 3 | Prior quarters remembered for novelty weighting. |
//! | EARNINGS_FOCUS_SCOPE | all | `all` sections or only `prepared` remarks feed focus extraction. |
//! | EARNINGS_CLASSIFIER | lexicon | `lexicon` (local) or `remote`. |
//! | EARNINGS_CLASSIFIER_ENDPOINT | - | Base URL of an OpenAI-compatible API. |
//! | EARNINGS_CLASSIFIER_MODEL | gpt-4o-mini | Remote model name. |
//! | EARNINGS_CLASSIFIER_TIMEOUT_SECS | 30 | Per-call timeout. |
//! | EARNINGS_CLASSIFIER_RETRIES | 1 | Extra attempts after a failed call. |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, SignalError};
use crate::sections::{CueRule, TriggerPolicy};

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_top_n() -> usize {
    5
}

fn default_memory_depth() -> usize {
    3
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "EARNINGS_CLASSIFIER_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusScope {
    /// Prepared remarks and Q&A together.
    #[default]
    All,
    Prepared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    #[default]
    Lexicon,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            endpoint: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub qa_cue: CueRule,
    #[serde(default)]
    pub trigger_policy: TriggerPolicy,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_memory_depth")]
    pub memory_depth: usize,
    #[serde(default)]
    pub focus_scope: FocusScope,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            qa_cue: CueRule::default(),
            trigger_policy: TriggerPolicy::default(),
            confidence_threshold: default_confidence_threshold(),
            top_n: default_top_n(),
            memory_depth: default_memory_depth(),
            focus_scope: FocusScope::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SignalError::Config(e.to_string()))?;
        config.validate()
    }

    /// Read `path` when given (defaults otherwise), then apply `EARNINGS_*`
    /// overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; `lookup` is the environment in
    /// production.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EARNINGS_QA_CUE") {
            self.qa_cue = parse_keyword(&v, "EARNINGS_QA_CUE")?;
        }
        if let Some(v) = lookup("EARNINGS_TRIGGER_POLICY") {
            self.trigger_policy = parse_keyword(&v, "EARNINGS_TRIGGER_POLICY")?;
        }
        if let Some(v) = lookup("EARNINGS_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = parse_value(&v, "EARNINGS_CONFIDENCE_THRESHOLD")?;
        }
        if let Some(v) = lookup("EARNINGS_TOP_N") {
            self.top_n = parse_value(&v, "EARNINGS_TOP_N")?;
        }
        if let Some(v) = lookup("EARNINGS_MEMORY_DEPTH") {
            self.memory_depth = parse_value(&v, "EARNINGS_MEMORY_DEPTH")?;
        }
        if let Some(v) = lookup("EARNINGS_FOCUS_SCOPE") {
            self.focus_scope = parse_keyword(&v, "EARNINGS_FOCUS_SCOPE")?;
        }
        if let Some(v) = lookup("EARNINGS_CLASSIFIER") {
            self.classifier.backend = parse_keyword(&v, "EARNINGS_CLASSIFIER")?;
        }
        if let Some(v) = lookup("EARNINGS_CLASSIFIER_ENDPOINT") {
            self.classifier.endpoint = Some(v.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("EARNINGS_CLASSIFIER_MODEL") {
            self.classifier.model = v.trim().to_string();
        }
        if let Some(v) = lookup("EARNINGS_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_value(&v, "EARNINGS_CLASSIFIER_TIMEOUT_SECS")?;
        }
        if let Some(v) = lookup("EARNINGS_CLASSIFIER_RETRIES") {
            self.classifier.retries = parse_value(&v, "EARNINGS_CLASSIFIER_RETRIES")?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(SignalError::Config(format!(
                "confidence_threshold must be in [0, 1), got {}",
                self.confidence_threshold
            )));
        }
        if self.memory_depth == 0 {
            return Err(SignalError::Config("memory_depth must be at least 1".into()));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(SignalError::Config("classifier timeout must be positive".into()));
        }
        Ok(self)
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| SignalError::Config(format!("{key}: cannot parse `{raw}`")))
}

// Unit enums parse with their serde spelling.
fn parse_keyword<T: serde::de::DeserializeOwned>(raw: &str, key: &str) -> Result<T> {
    let quoted = Value::String(raw.trim().to_ascii_lowercase());
    serde_json::from_value(quoted)
        .map_err(|_| SignalError::Config(format!("{key}: unknown value `{raw}`")))
}
