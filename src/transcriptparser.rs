use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SignalError};

/// Speaker assigned to text that precedes (or lacks) any speaker label.
pub const UNKNOWN_SPEAKER: &str = "Unknown";

// "Jensen Huang: ..." at the start of a line.
const LINE_ANCHOR: &str = r"(?m)^(\p{Lu}[\p{L} &'()\-]*):[ \t]";

// "... Welcome. John Smith: ..." after a sentence end on the same line.
// Every word of an inline name must be capitalised.
const INLINE_ANCHOR: &str =
    r#"[.!?]["')\]]*[ \t]+(\p{Lu}[\p{L}'\-]*(?:[ \t]+[\p{Lu}&(][\p{L}&'()\-]*){0,4}):[ \t]"#;

/// One speaker's contiguous turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }

    pub fn is_operator(&self) -> bool {
        self.speaker.trim().eq_ignore_ascii_case("operator")
    }
}

/// Transcript text after unwrapping an optional JSON envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTranscript {
    pub date: Option<String>,
    pub text: String,
}

impl RawTranscript {
    /// Use the `transcript` field when `input` is a JSON document carrying
    /// one, otherwise treat `input` as plain text.
    pub fn detect(input: &str) -> Self {
        match serde_json::from_str::<Value>(input) {
            Ok(value) => Self::from_value(&value).unwrap_or_else(|| Self::plain(input)),
            Err(_) => Self::plain(input),
        }
    }

    /// Strict variant: the input must be JSON with a `transcript` field.
    pub fn from_json(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(&value).ok_or(SignalError::MissingField("transcript"))
    }

    pub fn plain(text: &str) -> Self {
        Self {
            date: None,
            text: text.to_string(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let transcript = value.get("transcript")?.as_str()?;
        let date = value
            .get("date")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            date,
            // API payloads sometimes double-escape newlines.
            text: transcript.replace("\\n", "\n"),
        })
    }
}

/// Splits transcript text into ordered speaker turns.
pub trait SpeakerTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Utterance>;
}

#[derive(Debug)]
struct Anchor<'src> {
    start: usize,
    body_start: usize,
    speaker: &'src str,
}

/// Line-oriented `Name: text` tokenizer.
#[derive(Debug, Clone)]
pub struct RegexSpeakerTokenizer {
    line_anchor: Regex,
    inline_anchor: Regex,
}

impl RegexSpeakerTokenizer {
    pub fn new() -> Self {
        Self {
            line_anchor: Regex::new(LINE_ANCHOR).expect("line anchor pattern compiles"),
            inline_anchor: Regex::new(INLINE_ANCHOR).expect("inline anchor pattern compiles"),
        }
    }

    fn anchors<'src>(&self, text: &'src str) -> Vec<Anchor<'src>> {
        let mut anchors = Vec::new();

        for caps in self.line_anchor.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            anchors.push(Anchor {
                start: whole.start(),
                body_start: whole.end(),
                speaker: name.as_str().trim(),
            });
        }

        for caps in self.inline_anchor.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            anchors.push(Anchor {
                start: name.start(),
                body_start: whole.end(),
                speaker: name.as_str().trim(),
            });
        }

        anchors.sort_by_key(|a| a.start);
        anchors.dedup_by_key(|a| a.start);
        anchors
    }
}

impl Default for RegexSpeakerTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeakerTokenizer for RegexSpeakerTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Utterance> {
        let anchors = self.anchors(text);
        let mut utterances = Vec::with_capacity(anchors.len() + 1);

        let first_start = anchors.first().map_or(text.len(), |a| a.start);
        let lead = text[..first_start].trim();
        if !lead.is_empty() {
            utterances.push(Utterance::new(UNKNOWN_SPEAKER, lead));
        }

        for (i, anchor) in anchors.iter().enumerate() {
            let end = anchors.get(i + 1).map_or(text.len(), |next| next.start);
            let body = text.get(anchor.body_start..end).unwrap_or_default().trim();
            if body.is_empty() {
                debug!(speaker = anchor.speaker, "skipping empty turn");
                continue;
            }
            utterances.push(Utterance::new(anchor.speaker, body));
        }

        debug!(count = utterances.len(), "tokenized transcript");
        utterances
    }
}
