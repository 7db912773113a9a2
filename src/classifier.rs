//! Sentiment / summary capability injected into the signal extractor.
//!
//! Two backends are selected by configuration: a local financial-lexicon
//! model and an OpenAI-compatible chat endpoint. Anything else can be plugged
//! in through [`FnClassifier`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ClassifierBackend, ClassifierConfig};
use crate::error::{Result, SignalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Positive,
    Neutral,
    Negative,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Positive, Label::Neutral, Label::Negative];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            _ => Err(SignalError::UnparseableLabel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub score: f64,
}

impl Classification {
    pub fn new(label: Label, score: f64) -> Self {
        Self { label, score }
    }
}

/// Free-text model output, parsed when it carries a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Parsed(Value),
    Unparsed(String),
}

impl ModelOutput {
    /// Parse the span between the first `{` and the last `}`; keep the raw
    /// text when there is none or it is not valid JSON.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Self::Parsed(value);
                }
            }
        }
        Self::Unparsed(trimmed.to_string())
    }

    pub fn parsed(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Unparsed(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, text: &str) -> Result<Classification>;

    fn classify_batch(&self, texts: &[&str]) -> Vec<Result<Classification>> {
        texts.iter().map(|text| self.classify(text)).collect()
    }

    /// Free-text generation for an instruction prompt.
    fn summarize(&self, _prompt: &str) -> Result<ModelOutput> {
        Err(SignalError::Classifier(format!(
            "{} does not support summaries",
            self.name()
        )))
    }
}

type SummaryFn = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Adapts plain functions to the [`Classifier`] interface.
pub struct FnClassifier<F> {
    classify: F,
    summarize: Option<SummaryFn>,
}

impl<F> FnClassifier<F>
where
    F: Fn(&str) -> Result<Classification> + Send + Sync,
{
    pub fn new(classify: F) -> Self {
        Self {
            classify,
            summarize: None,
        }
    }

    pub fn with_summaries<S>(mut self, summarize: S) -> Self
    where
        S: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.summarize = Some(Box::new(summarize));
        self
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: Fn(&str) -> Result<Classification> + Send + Sync,
{
    fn name(&self) -> &str {
        "function"
    }

    fn classify(&self, text: &str) -> Result<Classification> {
        (self.classify)(text)
    }

    fn summarize(&self, prompt: &str) -> Result<ModelOutput> {
        match &self.summarize {
            Some(summarize) => summarize(prompt).map(|raw| ModelOutput::from_text(&raw)),
            None => Err(SignalError::Classifier("function does not support summaries".into())),
        }
    }
}

/// Local model: counts hits against a financial sentiment lexicon.
pub struct LexiconClassifier {
    positive_words: HashSet<&'static str>,
    negative_words: HashSet<&'static str>,
}

impl LexiconClassifier {
    pub fn new() -> Self {
        Self {
            positive_words: Self::build_positive_lexicon(),
            negative_words: Self::build_negative_lexicon(),
        }
    }

    fn count_hits(&self, text: &str) -> (usize, usize) {
        let lowered = text.to_lowercase();
        let mut positive = 0;
        let mut negative = 0;
        for word in lowered.split(|c: char| !c.is_alphanumeric() && c != '\'') {
            if self.positive_words.contains(word) {
                positive += 1;
            } else if self.negative_words.contains(word) {
                negative += 1;
            }
        }
        (positive, negative)
    }

    fn build_positive_lexicon() -> HashSet<&'static str> {
        [
            // growth and performance
            "growth", "growing", "grew", "increase", "increased", "increasing",
            "improve", "improved", "improvement", "improving", "strong", "stronger",
            "strength", "robust", "solid", "excellent", "exceptional", "outstanding",
            "record", "beat", "exceeded", "surpassed", "outperformed",
            // momentum
            "momentum", "accelerate", "accelerated", "accelerating",
            "expansion", "expand", "expanded", "expanding",
            // position
            "leader", "leading", "leadership", "advantage", "opportunity",
            "opportunities",
            // tone
            "confident", "confidence", "optimistic", "positive", "pleased",
            "excited", "encouraged", "favorable", "success", "successful",
            "achieve", "achieved", "deliver", "delivered", "raise", "raised",
            "upside", "demand",
        ]
        .into_iter()
        .collect()
    }

    fn build_negative_lexicon() -> HashSet<&'static str> {
        [
            // decline
            "decline", "declined", "declining", "decrease", "decreased",
            "decreasing", "drop", "dropped", "dropping", "fall", "fell",
            "falling", "weak", "weaker", "weakness", "soft", "softer",
            // problems
            "challenge", "challenges", "challenging", "difficult", "difficulty",
            "headwind", "headwinds", "pressure", "pressured", "pressures",
            "concern", "concerns", "concerned", "risk", "risks",
            // results
            "loss", "losses", "miss", "missed", "shortfall",
            "disappointing", "disappointed", "underperformed",
            // uncertainty
            "uncertain", "uncertainty", "volatile", "volatility",
            "downturn", "recession", "slowdown", "slowing", "slower",
            // actions
            "restructuring", "layoff", "layoffs", "impairment", "writedown",
            "lowered", "downgrade", "downside", "constrained", "shortage",
        ]
        .into_iter()
        .collect()
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for LexiconClassifier {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn classify(&self, text: &str) -> Result<Classification> {
        let (positive, negative) = self.count_hits(text);
        let total = (positive + negative) as f64;

        let classification = if positive == negative {
            // no hits is a confident neutral, a tie becomes less certain the more hits it has
            Classification::new(Label::Neutral, 1.0 / (1.0 + 0.25 * total))
        } else {
            let margin = positive.abs_diff(negative) as f64 / (total + 1.0);
            let label = if positive > negative {
                Label::Positive
            } else {
                Label::Negative
            };
            Classification::new(label, 0.5 + 0.5 * margin)
        };
        debug!(positive, negative, label = %classification.label, "lexicon classification");
        Ok(classification)
    }
}

const CLASSIFY_PROMPT: &str = "Classify the sentiment of the following earnings call text as \
Positive, Neutral, or Negative. Respond with JSON only: {\"label\": <label>, \"score\": <confidence 0-1>}.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Remote model behind an OpenAI-compatible `chat/completions` endpoint.
pub struct RemoteClassifier {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    retries: u32,
    client: reqwest::blocking::Client,
}

impl RemoteClassifier {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            timeout,
            retries,
            client,
        })
    }

    fn complete(&self, system: Option<&str>, user: &str, max_tokens: u32) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
            max_tokens,
        };

        let mut attempt = 0;
        loop {
            match self.send(&body) {
                Ok(content) => return Ok(content),
                Err(error) if attempt < self.retries && error.is_adapter_failure() => {
                    attempt += 1;
                    warn!(model = %self.model, attempt, error = %error, "retrying remote classifier");
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn send(&self, body: &ChatRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| self.map_http_error(e))?;
        let parsed: ChatResponse = response.json().map_err(|e| self.map_http_error(e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SignalError::Classifier("response contained no choices".into()))
    }

    fn map_http_error(&self, error: reqwest::Error) -> SignalError {
        if error.is_timeout() {
            SignalError::ClassifierTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SignalError::Http(error)
        }
    }
}

impl Classifier for RemoteClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    fn classify(&self, text: &str) -> Result<Classification> {
        let reply = self.complete(Some(CLASSIFY_PROMPT), text, 20)?;
        parse_classification(&reply)
    }

    fn summarize(&self, prompt: &str) -> Result<ModelOutput> {
        let reply = self.complete(None, prompt, 200)?;
        Ok(ModelOutput::from_text(&reply))
    }
}

/// Read a label/score pair from model output. A bare reply is read as a
/// label in its first word with full confidence.
pub fn parse_classification(reply: &str) -> Result<Classification> {
    match ModelOutput::from_text(reply) {
        ModelOutput::Parsed(value) => {
            let label = value
                .get("label")
                .and_then(Value::as_str)
                .ok_or_else(|| SignalError::UnparseableLabel(reply.to_string()))?
                .parse()?;
            let score = value.get("score").and_then(Value::as_f64).unwrap_or(1.0);
            Ok(Classification::new(label, score))
        }
        ModelOutput::Unparsed(text) => {
            let first = text
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .trim_matches(|c: char| !c.is_alphabetic());
            Ok(Classification::new(first.parse()?, 1.0))
        }
    }
}

/// Build the backend named by the configuration.
pub fn build_classifier(config: &ClassifierConfig) -> Result<Box<dyn Classifier>> {
    match config.backend {
        ClassifierBackend::Lexicon => Ok(Box::new(LexiconClassifier::new())),
        ClassifierBackend::Remote => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                SignalError::Config("remote classifier requires an endpoint".into())
            })?;
            let api_key = std::env::var(&config.api_key_env).ok();
            let classifier = RemoteClassifier::new(
                endpoint,
                &config.model,
                api_key,
                Duration::from_secs(config.timeout_secs),
                config.retries,
            )?;
            Ok(Box::new(classifier))
        }
    }
}
