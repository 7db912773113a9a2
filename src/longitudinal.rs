//! Quarter-over-quarter tone shifts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::quarter::QuarterId;
use crate::signals::QuarterSignalBundle;

/// Change in positive share between two adjacent quarters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub from_quarter: QuarterId,
    pub to_quarter: QuarterId,
    pub management_tone_shift: f64,
    pub qa_tone_shift: f64,
}

impl DeltaRecord {
    pub fn between(
        from_quarter: QuarterId,
        prev: &QuarterSignalBundle,
        to_quarter: QuarterId,
        cur: &QuarterSignalBundle,
    ) -> Self {
        Self {
            from_quarter,
            to_quarter,
            management_tone_shift: cur.management_sentiment.positive_avg
                - prev.management_sentiment.positive_avg,
            qa_tone_shift: cur.qa_sentiment.positive_avg - prev.qa_sentiment.positive_avg,
        }
    }

    /// Report key, `"{from}_to_{to}"`.
    pub fn key(&self) -> String {
        format!("{}_to_{}", self.from_quarter, self.to_quarter)
    }
}

/// Sort quarters chronologically and diff each adjacent pair.
///
/// Keys must be `YYYYQ#`; anything else is an `InvalidQuarter` error. Fewer
/// than two quarters yields no records.
pub fn deltas<'a, I, K>(signals: I) -> Result<Vec<DeltaRecord>>
where
    I: IntoIterator<Item = (&'a K, &'a QuarterSignalBundle)>,
    K: AsRef<str> + ?Sized + 'a,
{
    let ordered = signals
        .into_iter()
        .map(|(key, bundle)| Ok((key.as_ref().parse::<QuarterId>()?, bundle)))
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(chronological_deltas(&ordered))
}

pub fn chronological_deltas(signals: &BTreeMap<QuarterId, &QuarterSignalBundle>) -> Vec<DeltaRecord> {
    let ordered: Vec<_> = signals.iter().collect();
    ordered
        .windows(2)
        .map(|pair| {
            let (prev_id, prev) = pair[0];
            let (cur_id, cur) = pair[1];
            let record = DeltaRecord::between(*prev_id, prev, *cur_id, cur);
            debug!(
                key = %record.key(),
                management = record.management_tone_shift,
                qa = record.qa_tone_shift,
                "tone shift"
            );
            record
        })
        .collect()
}

/// Aggregate persisted per ticker: every quarter's bundle plus the tone shifts
/// between neighbours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub signals: BTreeMap<QuarterId, QuarterSignalBundle>,
    pub qoq_tone_change: BTreeMap<String, DeltaRecord>,
}

impl SignalReport {
    pub fn from_signals(signals: BTreeMap<QuarterId, QuarterSignalBundle>) -> Self {
        let borrowed: BTreeMap<QuarterId, &QuarterSignalBundle> =
            signals.iter().map(|(id, bundle)| (*id, bundle)).collect();
        let qoq_tone_change = chronological_deltas(&borrowed)
            .into_iter()
            .map(|record| (record.key(), record))
            .collect();
        Self {
            signals,
            qoq_tone_change,
        }
    }

    pub fn latest(&self) -> Option<(&QuarterId, &QuarterSignalBundle)> {
        self.signals.iter().next_back()
    }
}
