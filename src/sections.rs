//! Prepared-remarks / Q&A partitioning.
//!
//! The partitioner is a two-state machine: it starts in prepared remarks and
//! moves to Q&A on the first operator hand-off cue. Q&A is terminal.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::transcriptparser::Utterance;

/// Operator phrasing that opens the question queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueRule {
    /// "first question" or "question comes" anywhere in the operator turn.
    #[default]
    Loose,
    /// "[operator instructions]" together with "first question".
    Joint,
}

impl CueRule {
    pub fn matches(self, lowered: &str) -> bool {
        match self {
            Self::Loose => lowered.contains("first question") || lowered.contains("question comes"),
            Self::Joint => {
                lowered.contains("[operator instructions]") && lowered.contains("first question")
            }
        }
    }
}

/// What happens to the operator turn that triggers the Q&A transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPolicy {
    /// Keep it as the first Q&A utterance.
    #[default]
    Retain,
    /// Drop it from both sections.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepared,
    Qa,
}

/// Decides where prepared remarks end.
pub trait SectionBoundaryDetector {
    /// True when `utterance` hands the call over to analyst questions.
    fn is_boundary(&self, utterance: &Utterance) -> bool;

    fn trigger_policy(&self) -> TriggerPolicy {
        TriggerPolicy::Retain
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorCueDetector {
    pub rule: CueRule,
    pub policy: TriggerPolicy,
}

impl OperatorCueDetector {
    pub fn new(rule: CueRule, policy: TriggerPolicy) -> Self {
        Self { rule, policy }
    }
}

impl SectionBoundaryDetector for OperatorCueDetector {
    fn is_boundary(&self, utterance: &Utterance) -> bool {
        utterance.is_operator() && self.rule.matches(&utterance.text.to_lowercase())
    }

    fn trigger_policy(&self) -> TriggerPolicy {
        self.policy
    }
}

/// A call split into its two discourse phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    #[serde(default)]
    pub date: Option<String>,
    pub prepared_remarks: Vec<Utterance>,
    pub qanda: Vec<Utterance>,
}

impl Transcript {
    pub fn len(&self) -> usize {
        self.prepared_remarks.len() + self.qanda.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_qanda(&self) -> bool {
        !self.qanda.is_empty()
    }
}

/// Partition `utterances` in source order. With no cue everything is prepared
/// remarks and Q&A is empty.
pub fn partition<D>(detector: &D, utterances: Vec<Utterance>) -> Transcript
where
    D: SectionBoundaryDetector + ?Sized,
{
    let mut phase = Phase::Prepared;
    let mut transcript = Transcript::default();

    for utterance in utterances {
        if phase == Phase::Prepared && detector.is_boundary(&utterance) {
            phase = Phase::Qa;
            debug!(at = transcript.prepared_remarks.len(), "q&a hand-off detected");
            if detector.trigger_policy() == TriggerPolicy::Drop {
                continue;
            }
        }
        match phase {
            Phase::Prepared => transcript.prepared_remarks.push(utterance),
            Phase::Qa => transcript.qanda.push(utterance),
        }
    }

    if phase == Phase::Prepared {
        info!(
            utterances = transcript.prepared_remarks.len(),
            "no q&a hand-off found; treating whole call as prepared remarks"
        );
    }
    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcriptparser::{RegexSpeakerTokenizer, SpeakerTokenizer};

    const CALL: &str = "Operator: Welcome everyone.\nJensen Huang: Thanks. Revenue grew.\nOperator: [Operator Instructions] Your first question comes from...\nAnalyst: What about margins?\nJensen Huang: Margins improved.";

    fn tokens(text: &str) -> Vec<Utterance> {
        RegexSpeakerTokenizer::new().tokenize(text)
    }

    #[test]
    fn retained_trigger_opens_qanda() {
        let transcript = partition(&OperatorCueDetector::default(), tokens(CALL));

        assert_eq!(transcript.prepared_remarks.len(), 2);
        assert_eq!(transcript.qanda.len(), 3);
        assert_eq!(transcript.prepared_remarks[0].speaker, "Operator");
        assert_eq!(transcript.prepared_remarks[1].speaker, "Jensen Huang");
        assert!(transcript.qanda[0].is_operator());
        assert_eq!(transcript.qanda[1].speaker, "Analyst");
    }

    #[test]
    fn dropped_trigger_is_in_neither_section() {
        let detector = OperatorCueDetector::new(CueRule::Loose, TriggerPolicy::Drop);
        let transcript = partition(&detector, tokens(CALL));

        assert_eq!(transcript.prepared_remarks.len(), 2);
        assert_eq!(transcript.qanda.len(), 2);
        assert_eq!(transcript.qanda[0].speaker, "Analyst");
        assert_eq!(transcript.len() + 1, tokens(CALL).len());
    }

    #[test]
    fn retain_and_drop_are_distinguishable() {
        let retained = partition(&OperatorCueDetector::default(), tokens(CALL));
        let dropped = partition(
            &OperatorCueDetector::new(CueRule::Loose, TriggerPolicy::Drop),
            tokens(CALL),
        );
        assert_ne!(retained.qanda, dropped.qanda);
        assert_eq!(retained.prepared_remarks, dropped.prepared_remarks);
    }

    #[test]
    fn no_cue_means_empty_qanda() {
        let text = "Operator: Welcome.\nJane Doe: Revenue grew.\nJohn Roe: Thank you all.";
        let transcript = partition(&OperatorCueDetector::default(), tokens(text));

        assert!(transcript.qanda.is_empty());
        assert!(!transcript.has_qanda());
        assert_eq!(transcript.prepared_remarks.len(), 3);
    }

    #[test]
    fn joint_rule_needs_both_markers() {
        let loose_only = "Operator: Thanks.\nJane Doe: Hi.\nOperator: Our first question comes from Acme.\nAnalyst: Hello?";

        let loose = partition(&OperatorCueDetector::default(), tokens(loose_only));
        assert_eq!(loose.qanda.len(), 2);

        let joint = partition(
            &OperatorCueDetector::new(CueRule::Joint, TriggerPolicy::Retain),
            tokens(loose_only),
        );
        assert!(joint.qanda.is_empty());

        let joint_hit = partition(
            &OperatorCueDetector::new(CueRule::Joint, TriggerPolicy::Retain),
            tokens(CALL),
        );
        assert_eq!(joint_hit.qanda.len(), 3);
    }

    #[test]
    fn cue_from_a_non_operator_is_ignored() {
        let text = "Jane Doe: The first question we asked ourselves was simple.\nJohn Roe: Indeed.";
        let transcript = partition(&OperatorCueDetector::default(), tokens(text));
        assert!(transcript.qanda.is_empty());
    }

    #[test]
    fn qanda_is_terminal() {
        let text = "Operator: Your first question comes from Acme.\nAnalyst: Q?\nOperator: Welcome back to prepared remarks.\nJane Doe: A.";
        let transcript = partition(&OperatorCueDetector::default(), tokens(text));
        assert!(transcript.prepared_remarks.is_empty());
        assert_eq!(transcript.qanda.len(), 4);
    }

    #[test]
    fn partition_preserves_every_utterance_in_order() {
        let original = tokens(CALL);
        let transcript = partition(&OperatorCueDetector::default(), original.clone());

        assert_eq!(transcript.len(), original.len());
        let rejoined: Vec<_> = transcript
            .prepared_remarks
            .iter()
            .chain(transcript.qanda.iter())
            .cloned()
            .collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn transcript_serializes_with_camel_case_sections() {
        let transcript = partition(&OperatorCueDetector::default(), tokens(CALL));
        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json.get("preparedRemarks").is_some());
        assert!(json.get("qanda").is_some());
    }
}
