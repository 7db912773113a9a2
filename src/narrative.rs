//! Free-text narrative analysis through [`Classifier::summarize`].
//!
//! Every entry point degrades to an empty result when the model is
//! unavailable or unhelpful. Failures are logged, never returned.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::{Classifier, ModelOutput};
use crate::transcriptparser::Utterance;

const BOILERPLATE: &[&str] = &[
    "webcast",
    "investor relations",
    "replay until",
    "today's call is nvidia's property",
];

pub const MAX_EXCERPT_CHARS: usize = 1000;
pub const MAX_FOCUS_CHARS: usize = 4000;
pub const DEFAULT_CHUNK_CHARS: usize = 2000;

/// Model reading of one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionNarrative {
    pub raw: String,
    #[serde(serialize_with = "serialize_parsed")]
    pub parsed: ModelOutput,
}

impl SectionNarrative {
    pub fn empty() -> Self {
        Self {
            raw: String::new(),
            parsed: ModelOutput::Unparsed(String::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// `sentiment` field of the parsed reply, if any.
    pub fn sentiment(&self) -> Option<&str> {
        self.parsed.parsed()?.get("sentiment")?.as_str()
    }
}

fn serialize_parsed<S: serde::Serializer>(parsed: &ModelOutput, serializer: S) -> Result<S::Ok, S::Error> {
    match parsed {
        ModelOutput::Parsed(value) => value.serialize(serializer),
        ModelOutput::Unparsed(_) => serializer.serialize_none(),
    }
}

/// Drop webcast, investor-relations and replay housekeeping.
pub fn filter_boilerplate<'a>(utterances: &'a [Utterance]) -> Vec<&'a Utterance> {
    utterances
        .iter()
        .filter(|u| {
            let lowered = u.text.to_lowercase();
            !BOILERPLATE.iter().any(|phrase| lowered.contains(phrase))
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn section_prompt(section: &str, excerpt: &str) -> String {
    format!(
        "You are a financial analytics assistant. Analyze the {section} section of an earnings call \
transcript, providing overall sentiment and three key themes in concise JSON.\nExcerpt:\n{excerpt}\n"
    )
}

/// Ask the model for overall sentiment and three themes of one section.
pub fn analyze_section<C>(classifier: &C, section: &str, utterances: &[Utterance]) -> SectionNarrative
where
    C: Classifier + ?Sized,
{
    let texts: Vec<&str> = filter_boilerplate(utterances)
        .into_iter()
        .filter(|u| !u.is_operator())
        .map(|u| u.text.as_str())
        .collect();
    if texts.is_empty() {
        debug!(section, "no content for narrative");
        return SectionNarrative::empty();
    }

    let joined = texts.join("\n---\n");
    let prompt = section_prompt(section, truncate_chars(&joined, MAX_EXCERPT_CHARS));
    match classifier.summarize(&prompt) {
        Ok(parsed) => SectionNarrative {
            raw: match &parsed {
                ModelOutput::Parsed(value) => value.to_string(),
                ModelOutput::Unparsed(raw) => raw.clone(),
            },
            parsed,
        },
        Err(error) => {
            warn!(section, code = error.error_code(), error = %error, "narrative analysis failed");
            SectionNarrative::empty()
        }
    }
}

/// Pack blank-line separated paragraphs into chunks of at most `max_chars`.
/// A single paragraph longer than the limit becomes its own chunk.
pub fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in text.split("\n\n") {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(current.trim().to_string());
            current.clear();
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

/// Summarize each chunk in one sentence, then fuse the summaries into a
/// sentiment and three themes. Chunks the model fails on are skipped.
pub fn analyze_long<C>(classifier: &C, text: &str) -> SectionNarrative
where
    C: Classifier + ?Sized,
{
    let summaries: Vec<String> = chunk_paragraphs(text, DEFAULT_CHUNK_CHARS)
        .iter()
        .filter_map(|chunk| {
            let prompt = format!("Summarize this earnings call excerpt in one sentence:\n{chunk}\nSummary:");
            match classifier.summarize(&prompt) {
                Ok(ModelOutput::Unparsed(summary)) if !summary.is_empty() => Some(summary),
                Ok(ModelOutput::Parsed(value)) => Some(value.to_string()),
                Ok(_) => None,
                Err(error) => {
                    warn!(code = error.error_code(), error = %error, "chunk summary failed");
                    None
                }
            }
        })
        .collect();
    if summaries.is_empty() {
        return SectionNarrative::empty();
    }

    let bullets = summaries
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "You are a financial analytics assistant. Given the following bullet summaries of an earnings call:\n\
{bullets}\nProvide JSON with keys:\n  \"sentiment\": one of \"Positive\", \"Neutral\", \"Negative\"\n  \
\"themes\": list of 3 key themes mentioned by management\nOutput ONLY the JSON object."
    );
    match classifier.summarize(&prompt) {
        Ok(parsed) => SectionNarrative {
            raw: match &parsed {
                ModelOutput::Parsed(value) => value.to_string(),
                ModelOutput::Unparsed(raw) => raw.clone(),
            },
            parsed,
        },
        Err(error) => {
            warn!(code = error.error_code(), error = %error, "summary synthesis failed");
            SectionNarrative::empty()
        }
    }
}

/// Ask the model for three to five short strategic focuses.
pub fn model_focuses<C>(classifier: &C, text: &str) -> Vec<String>
where
    C: Classifier + ?Sized,
{
    if text.trim().is_empty() {
        return Vec::new();
    }
    let prompt = format!(
        "Based on the following earnings call transcript excerpt, identify the top 3-5 strategic focuses \
or key themes that the company is emphasizing. Format your response as a comma-separated list of short \
phrases (2-4 words each).\n\nTranscript excerpt:\n{}...\n\nStrategic focuses:",
        truncate_chars(text, MAX_FOCUS_CHARS)
    );
    let reply = match classifier.summarize(&prompt) {
        Ok(ModelOutput::Unparsed(reply)) => reply,
        Ok(ModelOutput::Parsed(Value::Array(items))) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        Ok(ModelOutput::Parsed(other)) => {
            warn!(reply = %other, "focus reply was not a list");
            return Vec::new();
        }
        Err(error) => {
            warn!(code = error.error_code(), error = %error, "model focus extraction failed");
            return Vec::new();
        }
    };
    reply
        .split(',')
        .map(str::trim)
        .filter(|focus| !focus.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, FnClassifier, Label, LexiconClassifier};
    use crate::error::SignalError;
    use std::sync::{Arc, Mutex};

    fn neutral(_: &str) -> crate::error::Result<Classification> {
        Ok(Classification::new(Label::Neutral, 0.9))
    }

    fn utterances() -> Vec<Utterance> {
        vec![
            Utterance::new("Operator", "Please stand by."),
            Utterance::new("Simona Jankowski", "This call is being webcast live on our investor relations website."),
            Utterance::new("Jensen Huang", "Blackwell is in full production."),
            Utterance::new("Colette Kress", "Data center revenue was a record."),
        ]
    }

    #[test]
    fn boilerplate_is_filtered() {
        let all = utterances();
        let kept = filter_boilerplate(&all);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|u| !u.text.contains("webcast")));
    }

    #[test]
    fn section_prompt_carries_joined_excerpt() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let classifier = FnClassifier::new(neutral).with_summaries(move |prompt| {
            *sink.lock().unwrap() = prompt.to_string();
            Ok("Here: {\"sentiment\": \"Positive\", \"themes\": [\"Blackwell\"]}".to_string())
        });

        let narrative = analyze_section(&classifier, "Prepared Remarks", &utterances());
        assert_eq!(narrative.sentiment(), Some("Positive"));

        let prompt = seen.lock().unwrap().clone();
        assert!(prompt.contains("Prepared Remarks section"));
        assert!(prompt.contains("Blackwell is in full production.\n---\nData center revenue was a record."));
        assert!(!prompt.contains("Please stand by"));
        assert!(!prompt.contains("webcast"));
    }

    #[test]
    fn excerpt_is_truncated() {
        let long = vec![Utterance::new("Jensen Huang", "é".repeat(3000))];
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let classifier = FnClassifier::new(neutral).with_summaries(move |prompt| {
            *sink.lock().unwrap() = prompt.matches('é').count();
            Ok("no json".to_string())
        });

        let narrative = analyze_section(&classifier, "Q&A", &long);
        assert_eq!(*seen.lock().unwrap(), MAX_EXCERPT_CHARS);
        assert_eq!(narrative.parsed, ModelOutput::Unparsed("no json".into()));
        assert_eq!(narrative.sentiment(), None);
    }

    #[test]
    fn empty_or_failed_analysis_is_empty() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let classifier = FnClassifier::new(neutral).with_summaries(move |_| {
            *counter.lock().unwrap() += 1;
            Err(SignalError::ClassifierTimeout { timeout_ms: 10 })
        });

        let only_operator = vec![Utterance::new("Operator", "Your first question comes from Acme.")];
        assert!(analyze_section(&classifier, "Q&A", &only_operator).is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);

        assert!(analyze_section(&classifier, "Q&A", &utterances()).is_empty());
        assert_eq!(*calls.lock().unwrap(), 1);

        assert!(analyze_section(&LexiconClassifier::new(), "Q&A", &utterances()).is_empty());
    }

    #[test]
    fn paragraphs_pack_up_to_limit() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        assert_eq!(chunk_paragraphs(text, 10), vec!["aaaa\n\nbbbb", "cccc"]);
        assert_eq!(chunk_paragraphs(text, 100), vec![text]);
        assert_eq!(chunk_paragraphs("toolong\n\nx", 3), vec!["toolong", "x"]);
        assert!(chunk_paragraphs("  \n\n ", 10).is_empty());
    }

    #[test]
    fn long_text_is_summarized_then_synthesized() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&prompts);
        let classifier = FnClassifier::new(neutral).with_summaries(move |prompt| {
            sink.lock().unwrap().push(prompt.to_string());
            if prompt.starts_with("Summarize") {
                Ok("Demand is strong.".to_string())
            } else {
                Ok("{\"sentiment\": \"Positive\", \"themes\": [\"AI\"]}".to_string())
            }
        });

        let text = format!("{}\n\n{}", "a".repeat(1500), "b".repeat(1500));
        let narrative = analyze_long(&classifier, &text);

        assert_eq!(narrative.sentiment(), Some("Positive"));
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[2].contains("- Demand is strong.\n- Demand is strong."));
    }

    #[test]
    fn model_focuses_split_on_commas() {
        let classifier = FnClassifier::new(neutral)
            .with_summaries(|_| Ok(" Blackwell ramp, Sovereign AI ,, Networking ".to_string()));
        assert_eq!(
            model_focuses(&classifier, "some transcript"),
            ["Blackwell ramp", "Sovereign AI", "Networking"]
        );
    }

    #[test]
    fn model_focuses_fail_to_empty() {
        assert!(model_focuses(&LexiconClassifier::new(), "some transcript").is_empty());
        let classifier = FnClassifier::new(neutral).with_summaries(|_| Ok("{\"focus\": 1}".to_string()));
        assert!(model_focuses(&classifier, "some transcript").is_empty());
        assert!(model_focuses(&classifier, "   ").is_empty());
    }
}
