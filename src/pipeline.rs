//! One ticker's run from raw transcripts to a [`SignalReport`].

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, info_span};

use crate::classifier::Classifier;
use crate::config::AnalyzerConfig;
use crate::error::{Result, SignalError};
use crate::focus::NoveltyMemory;
use crate::longitudinal::SignalReport;
use crate::quarter::QuarterId;
use crate::sections::{partition, OperatorCueDetector, SectionBoundaryDetector, Transcript};
use crate::signals::{QuarterSignalBundle, SignalExtractor};
use crate::transcriptparser::{RawTranscript, RegexSpeakerTokenizer, SpeakerTokenizer};

/// Owns the novelty memory for a single ticker and refuses to go back in
/// time: each processed quarter must be strictly later than the last.
pub struct TickerPipeline {
    ticker: String,
    tokenizer: Box<dyn SpeakerTokenizer>,
    detector: Box<dyn SectionBoundaryDetector>,
    extractor: SignalExtractor,
    memory: NoveltyMemory,
    last: Option<QuarterId>,
    signals: BTreeMap<QuarterId, QuarterSignalBundle>,
}

impl TickerPipeline {
    pub fn new(
        ticker: &str,
        tokenizer: Box<dyn SpeakerTokenizer>,
        detector: Box<dyn SectionBoundaryDetector>,
        extractor: SignalExtractor,
        memory: NoveltyMemory,
    ) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            tokenizer,
            detector,
            extractor,
            memory,
            last: None,
            signals: BTreeMap::new(),
        }
    }

    pub fn from_config(ticker: &str, classifier: Arc<dyn Classifier>, config: &AnalyzerConfig) -> Self {
        Self::new(
            ticker,
            Box::new(RegexSpeakerTokenizer::new()),
            Box::new(OperatorCueDetector::new(config.qa_cue, config.trigger_policy)),
            SignalExtractor::from_config(classifier, config),
            NoveltyMemory::new(config.memory_depth),
        )
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn memory(&self) -> &NoveltyMemory {
        &self.memory
    }

    /// Tokenize and partition without touching any state.
    pub fn segment(&self, raw: &str) -> Transcript {
        let source = RawTranscript::detect(raw);
        let utterances = self.tokenizer.tokenize(&source.text);
        let mut transcript = partition(self.detector.as_ref(), utterances);
        transcript.date = source.date;
        transcript
    }

    pub fn process_quarter(&mut self, quarter: QuarterId, raw: &str) -> Result<QuarterSignalBundle> {
        if let Some(previous) = self.last {
            if quarter <= previous {
                return Err(SignalError::OutOfOrder {
                    previous: previous.to_string(),
                    attempted: quarter.to_string(),
                });
            }
        }

        let span = info_span!("quarter", ticker = %self.ticker, %quarter);
        let _guard = span.enter();

        let transcript = self.segment(raw);
        info!(
            prepared = transcript.prepared_remarks.len(),
            qanda = transcript.qanda.len(),
            "segmented transcript"
        );
        let bundle = self.extractor.extract(&transcript, &mut self.memory);

        self.last = Some(quarter);
        self.signals.insert(quarter, bundle.clone());
        Ok(bundle)
    }

    /// Process every transcript in ascending quarter order and return the
    /// aggregate report. Keys must be `YYYYQ#`.
    pub fn run<I, K, V>(&mut self, transcripts: I) -> Result<SignalReport>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let ordered = transcripts
            .into_iter()
            .map(|(key, raw)| Ok((key.as_ref().parse::<QuarterId>()?, raw)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        for (quarter, raw) in &ordered {
            self.process_quarter(*quarter, raw.as_ref())?;
        }
        info!(ticker = %self.ticker, quarters = self.signals.len(), "run complete");
        Ok(self.report())
    }

    pub fn report(&self) -> SignalReport {
        SignalReport::from_signals(self.signals.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LexiconClassifier;

    fn pipeline() -> TickerPipeline {
        TickerPipeline::from_config("nvda", Arc::new(LexiconClassifier::new()), &AnalyzerConfig::default())
    }

    const UPBEAT: &str = "Operator: Welcome.\nJensen Huang: Record demand and strong growth.\nOperator: Your first question comes from Acme.\nAnalyst: Great results.\nJensen Huang: Thank you.";
    const GLUM: &str = "Operator: Welcome.\nJensen Huang: Headwinds and weak demand caused a decline.\nOperator: Your first question comes from Acme.\nAnalyst: Any risk to margins?";

    #[test]
    fn segment_keeps_json_date() {
        let raw = serde_json::json!({"date": "2024-08-28", "transcript": UPBEAT}).to_string();
        let transcript = pipeline().segment(&raw);
        assert_eq!(transcript.date.as_deref(), Some("2024-08-28"));
        assert_eq!(transcript.prepared_remarks.len(), 2);
        assert_eq!(transcript.qanda.len(), 3);
    }

    #[test]
    fn out_of_order_quarters_are_rejected() {
        let mut pipeline = pipeline();
        pipeline.process_quarter("2024Q2".parse().unwrap(), UPBEAT).unwrap();

        let same = pipeline.process_quarter("2024Q2".parse().unwrap(), UPBEAT);
        assert!(matches!(same, Err(SignalError::OutOfOrder { .. })));
        let earlier = pipeline.process_quarter("2024Q1".parse().unwrap(), UPBEAT);
        assert!(matches!(earlier, Err(SignalError::OutOfOrder { .. })));

        assert_eq!(pipeline.memory().len(), 1);
        assert!(pipeline.process_quarter("2024Q3".parse().unwrap(), GLUM).is_ok());
    }

    #[test]
    fn run_sorts_quarters_and_reports_tone_shift() {
        let mut pipeline = pipeline();
        let report = pipeline
            .run([("2024Q2", GLUM), ("2024Q1", UPBEAT)])
            .unwrap();

        assert_eq!(report.signals.len(), 2);
        let shift = &report.qoq_tone_change["2024Q1_to_2024Q2"];
        assert!(shift.management_tone_shift < 0.0);
        assert_eq!(pipeline.memory().texts().count(), 2);
    }

    #[test]
    fn run_rejects_bad_quarter_before_processing() {
        let mut pipeline = pipeline();
        let result = pipeline.run([("2024Q1", UPBEAT), ("latest", GLUM)]);
        assert!(matches!(result, Err(SignalError::InvalidQuarter(_))));
        assert!(pipeline.memory().is_empty());
    }

    #[test]
    fn memory_stays_bounded_over_many_quarters() {
        let mut pipeline = pipeline();
        let quarters = ["2023Q1", "2023Q2", "2023Q3", "2023Q4", "2024Q1"];
        for (i, quarter) in quarters.iter().enumerate() {
            let text = format!("Jane Doe: quarter number {i} gaming.");
            pipeline.process_quarter(quarter.parse().unwrap(), &text).unwrap();
            assert!(pipeline.memory().len() <= 3);
        }
        let remembered: Vec<&str> = pipeline.memory().texts().collect();
        assert_eq!(
            remembered,
            ["quarter number 2 gaming.", "quarter number 3 gaming.", "quarter number 4 gaming."]
        );
    }
}
