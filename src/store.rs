//! Flat-file layout under a data directory:
//! `{TICKER}_{YYYYQ#}.txt` per transcript and one `{TICKER}_signals.json`
//! report per ticker.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::longitudinal::SignalReport;
use crate::quarter::QuarterId;

pub fn transcript_path(dir: &Path, ticker: &str, quarter: QuarterId) -> PathBuf {
    dir.join(format!("{}_{quarter}.txt", ticker.to_uppercase()))
}

pub fn report_path(dir: &Path, ticker: &str) -> PathBuf {
    dir.join(format!("{}_signals.json", ticker.to_uppercase()))
}

/// Every transcript stored for `ticker`, keyed by quarter. Files whose suffix
/// is not a quarter identifier are skipped.
pub fn load_transcripts(dir: &Path, ticker: &str) -> Result<BTreeMap<QuarterId, String>> {
    let prefix = format!("{}_", ticker.to_uppercase());
    let mut transcripts = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(tag) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".txt"))
        else {
            continue;
        };
        match tag.parse::<QuarterId>() {
            Ok(quarter) => {
                transcripts.insert(quarter, fs::read_to_string(&path)?);
            }
            Err(error) => warn!(file = name, error = %error, "skipping transcript file"),
        }
    }

    debug!(ticker, dir = %dir.display(), count = transcripts.len(), "loaded transcripts");
    Ok(transcripts)
}

pub fn save_transcript(dir: &Path, ticker: &str, quarter: QuarterId, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = transcript_path(dir, ticker, quarter);
    fs::write(&path, text)?;
    Ok(path)
}

/// Overwrite the ticker's report.
pub fn save_report(dir: &Path, ticker: &str, report: &SignalReport) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = report_path(dir, ticker);
    fs::write(&path, serde_json::to_string_pretty(report)?)?;
    debug!(path = %path.display(), quarters = report.signals.len(), "saved report");
    Ok(path)
}

pub fn load_report(dir: &Path, ticker: &str) -> Result<SignalReport> {
    let text = fs::read_to_string(report_path(dir, ticker))?;
    Ok(serde_json::from_str(&text)?)
}
