//! Per-quarter signal extraction.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::classifier::Classifier;
use crate::config::{AnalyzerConfig, FocusScope};
use crate::focus::{FocusExtractor, FocusScore, NoveltyMemory, Taxonomy};
use crate::sections::Transcript;
use crate::sentiment::{section_sentiment, SectionSignal};

/// Everything derived from one quarter's call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterSignalBundle {
    pub management_sentiment: SectionSignal,
    pub qa_sentiment: SectionSignal,
    pub strategic_focuses: Vec<String>,
}

/// Sentiment for both sections plus ranked strategic focuses.
///
/// Focus extraction reads and updates the [`NoveltyMemory`] it is handed, so
/// calls for one ticker must happen in ascending quarter order against the
/// same memory.
pub struct SignalExtractor {
    classifier: Arc<dyn Classifier>,
    confidence_threshold: f64,
    focus: FocusExtractor,
    focus_scope: FocusScope,
}

impl SignalExtractor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        confidence_threshold: f64,
        focus: FocusExtractor,
        focus_scope: FocusScope,
    ) -> Self {
        Self {
            classifier,
            confidence_threshold,
            focus,
            focus_scope,
        }
    }

    pub fn from_config(classifier: Arc<dyn Classifier>, config: &AnalyzerConfig) -> Self {
        Self::new(
            classifier,
            config.confidence_threshold,
            FocusExtractor::new(Taxonomy::default(), config.top_n),
            config.focus_scope,
        )
    }

    pub fn extract(&self, transcript: &Transcript, memory: &mut NoveltyMemory) -> QuarterSignalBundle {
        let scores = self.focus_scores(transcript, memory);
        let bundle = QuarterSignalBundle {
            management_sentiment: section_sentiment(
                self.classifier.as_ref(),
                &transcript.prepared_remarks,
                self.confidence_threshold,
            ),
            qa_sentiment: section_sentiment(
                self.classifier.as_ref(),
                &transcript.qanda,
                self.confidence_threshold,
            ),
            strategic_focuses: scores.into_iter().map(|f| f.label).collect(),
        };

        info!(
            date = transcript.date.as_deref().unwrap_or("-"),
            management_positive = bundle.management_sentiment.positive_avg,
            qa_positive = bundle.qa_sentiment.positive_avg,
            focuses = bundle.strategic_focuses.len(),
            "extracted quarter signals"
        );
        bundle
    }

    /// Ranked focuses with their weights. Updates `memory`.
    pub fn focus_scores(&self, transcript: &Transcript, memory: &mut NoveltyMemory) -> Vec<FocusScore> {
        match self.focus_scope {
            FocusScope::All => self.focus.extract(
                transcript.prepared_remarks.iter().chain(&transcript.qanda),
                memory,
            ),
            FocusScope::Prepared => self.focus.extract(&transcript.prepared_remarks, memory),
        }
    }
}
