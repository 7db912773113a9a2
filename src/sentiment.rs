//! Per-section sentiment histograms.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::{Classification, Classifier, Label};
use crate::error::{Result, SignalError};
use crate::transcriptparser::Utterance;

/// Share of accepted classifications per label. All zero for an empty
/// section, otherwise the three ratios sum to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSignal {
    pub positive_avg: f64,
    pub neutral_avg: f64,
    pub negative_avg: f64,
}

impl SectionSignal {
    pub fn from_counts(positive: usize, neutral: usize, negative: usize) -> Self {
        let total = positive + neutral + negative;
        if total == 0 {
            return Self::default();
        }
        let total = total as f64;
        Self {
            positive_avg: positive as f64 / total,
            neutral_avg: neutral as f64 / total,
            negative_avg: negative as f64 / total,
        }
    }

    pub fn ratio(&self, label: Label) -> f64 {
        match label {
            Label::Positive => self.positive_avg,
            Label::Neutral => self.neutral_avg,
            Label::Negative => self.negative_avg,
        }
    }

    pub fn total(&self) -> f64 {
        self.positive_avg + self.neutral_avg + self.negative_avg
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0.0
    }

    /// Dominant label; ties go to the earlier of Positive, Neutral, Negative.
    pub fn majority(&self) -> Option<Label> {
        if self.is_empty() {
            return None;
        }
        Label::ALL
            .into_iter()
            .fold(None, |best: Option<Label>, label| match best {
                Some(b) if self.ratio(b) >= self.ratio(label) => Some(b),
                _ => Some(label),
            })
    }
}

/// Classify every non-operator utterance and build the label histogram.
///
/// Only classifications scoring above `threshold` are counted. A failed
/// classification drops that utterance and is logged, as does a batch that
/// comes back short.
pub fn section_sentiment<C>(classifier: &C, utterances: &[Utterance], threshold: f64) -> SectionSignal
where
    C: Classifier + ?Sized,
{
    let texts: Vec<&str> = utterances
        .iter()
        .filter(|u| !u.is_operator())
        .map(|u| u.text.as_str())
        .collect();
    if texts.is_empty() {
        return SectionSignal::default();
    }

    let mut counts = [0usize; 3];
    let mut rejected = 0usize;
    let mut failed = 0usize;

    let results = align_results(classifier.classify_batch(&texts), texts.len());
    for (text, result) in texts.iter().zip(results) {
        match result {
            Ok(Classification { label, score }) if score > threshold => {
                let slot = match label {
                    Label::Positive => 0,
                    Label::Neutral => 1,
                    Label::Negative => 2,
                };
                counts[slot] += 1;
            }
            Ok(_) => rejected += 1,
            Err(error) => {
                failed += 1;
                warn!(
                    classifier = classifier.name(),
                    code = error.error_code(),
                    error = %error,
                    chars = text.len(),
                    "classification failed; utterance excluded"
                );
            }
        }
    }

    debug!(
        accepted = counts.iter().sum::<usize>(),
        rejected, failed, "section sentiment"
    );
    SectionSignal::from_counts(counts[0], counts[1], counts[2])
}

/// One result per utterance: missing entries become failures and surplus
/// entries are dropped.
fn align_results(mut results: Vec<Result<Classification>>, expected: usize) -> Vec<Result<Classification>> {
    if results.len() != expected {
        warn!(expected, got = results.len(), "classifier batch size mismatch");
        results.resize_with(expected, || {
            Err(SignalError::Classifier("no result returned for utterance".into()))
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FnClassifier;

    fn keyword_classifier() -> impl Classifier {
        FnClassifier::new(|text: &str| {
            if text.contains("boom") {
                Err(SignalError::ClassifierTimeout { timeout_ms: 30_000 })
            } else if text.contains("good") {
                Ok(Classification::new(Label::Positive, 0.9))
            } else if text.contains("bad") {
                Ok(Classification::new(Label::Negative, 0.8))
            } else if text.contains("meh") {
                Ok(Classification::new(Label::Neutral, 0.4))
            } else {
                Ok(Classification::new(Label::Neutral, 0.7))
            }
        })
    }

    fn section(lines: &[(&str, &str)]) -> Vec<Utterance> {
        lines.iter().map(|(s, t)| Utterance::new(*s, *t)).collect()
    }

    #[test]
    fn ratios_are_shares_of_accepted_labels() {
        let utterances = section(&[
            ("Jane Doe", "good quarter"),
            ("Jane Doe", "good margins"),
            ("John Roe", "bad supply"),
            ("John Roe", "flat"),
        ]);
        let signal = section_sentiment(&keyword_classifier(), &utterances, 0.5);

        assert_eq!(signal.positive_avg, 0.5);
        assert_eq!(signal.negative_avg, 0.25);
        assert_eq!(signal.neutral_avg, 0.25);
        assert!((signal.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn operator_turns_are_ignored() {
        let utterances = section(&[("Operator", "bad line"), ("Jane Doe", "good")]);
        let signal = section_sentiment(&keyword_classifier(), &utterances, 0.5);
        assert_eq!(signal.positive_avg, 1.0);
        assert_eq!(signal.negative_avg, 0.0);
    }

    #[test]
    fn low_confidence_and_failures_are_excluded() {
        let utterances = section(&[
            ("Jane Doe", "meh"),
            ("Jane Doe", "boom"),
            ("John Roe", "bad"),
        ]);
        let signal = section_sentiment(&keyword_classifier(), &utterances, 0.5);
        assert_eq!(signal, SectionSignal::from_counts(0, 0, 1));
    }

    #[test]
    fn empty_section_is_all_zero() {
        let signal = section_sentiment(&keyword_classifier(), &[], 0.5);
        assert_eq!(signal, SectionSignal::default());
        assert_eq!(signal.total(), 0.0);
        assert_eq!(signal.majority(), None);
    }

    #[test]
    fn nothing_accepted_is_all_zero() {
        let utterances = section(&[("Jane Doe", "meh"), ("John Roe", "boom")]);
        let signal = section_sentiment(&keyword_classifier(), &utterances, 0.5);
        assert!(signal.is_empty());
    }

    /// Answers only the first utterance of every batch.
    struct FirstOnly;

    impl Classifier for FirstOnly {
        fn name(&self) -> &str {
            "first-only"
        }

        fn classify(&self, _text: &str) -> Result<Classification> {
            Ok(Classification::new(Label::Positive, 0.9))
        }

        fn classify_batch(&self, texts: &[&str]) -> Vec<Result<Classification>> {
            texts.iter().take(1).map(|t| self.classify(t)).collect()
        }
    }

    #[test]
    fn short_batch_counts_missing_results_as_failures() {
        let texts = ["one", "two", "three"];
        let aligned = align_results(FirstOnly.classify_batch(&texts), texts.len());
        assert_eq!(aligned.len(), 3);
        assert!(aligned[0].is_ok());
        assert!(aligned[1..]
            .iter()
            .all(|r| matches!(r, Err(SignalError::Classifier(_)))));

        let utterances = section(&[("Jane Doe", "one"), ("John Roe", "two"), ("Jane Doe", "three")]);
        let signal = section_sentiment(&FirstOnly, &utterances, 0.5);
        assert_eq!(signal, SectionSignal::from_counts(1, 0, 0));
    }

    #[test]
    fn surplus_batch_results_are_dropped() {
        let extra = vec![
            Ok(Classification::new(Label::Negative, 0.9)),
            Ok(Classification::new(Label::Positive, 0.9)),
        ];
        assert_eq!(align_results(extra, 1).len(), 1);
    }

    #[test]
    fn majority_prefers_positive_on_ties() {
        assert_eq!(SectionSignal::from_counts(1, 1, 0).majority(), Some(Label::Positive));
        assert_eq!(SectionSignal::from_counts(0, 1, 1).majority(), Some(Label::Neutral));
        assert_eq!(SectionSignal::from_counts(0, 1, 3).majority(), Some(Label::Negative));
    }
}
