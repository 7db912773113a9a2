use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignalError>;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transcript document has no `{0}` field")]
    MissingField(&'static str),

    #[error("invalid quarter identifier `{0}` (expected YYYYQ#)")]
    InvalidQuarter(String),

    #[error("quarter {attempted} is not after {previous}; quarters must be processed in ascending order")]
    OutOfOrder { previous: String, attempted: String },

    #[error("classifier failure: {0}")]
    Classifier(String),

    #[error("classifier timed out after {timeout_ms}ms")]
    ClassifierTimeout { timeout_ms: u64 },

    #[error("classifier returned an unrecognised label: `{0}`")]
    UnparseableLabel(String),

    #[error("http failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("pdf failure: {0}")]
    Pdf(String),
}

impl SignalError {
    /// Stable machine-readable code, one per variant.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "ES-IO",
            Self::Json(_) => "ES-JSON",
            Self::MissingField(_) => "ES-MISSING-FIELD",
            Self::InvalidQuarter(_) => "ES-INVALID-QUARTER",
            Self::OutOfOrder { .. } => "ES-OUT-OF-ORDER",
            Self::Classifier(_) => "ES-CLASSIFIER",
            Self::ClassifierTimeout { .. } => "ES-CLASSIFIER-TIMEOUT",
            Self::UnparseableLabel(_) => "ES-UNPARSEABLE-LABEL",
            Self::Http(_) => "ES-HTTP",
            Self::Config(_) => "ES-CONFIG",
            Self::Pdf(_) => "ES-PDF",
        }
    }

    /// Format errors are surfaced to the caller; adapter errors are recovered
    /// by the extractor.
    #[must_use]
    pub const fn is_adapter_failure(&self) -> bool {
        matches!(
            self,
            Self::Classifier(_)
                | Self::ClassifierTimeout { .. }
                | Self::UnparseableLabel(_)
                | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SignalError;

    #[test]
    fn error_codes_are_unique() {
        let errors = [
            SignalError::Io(std::io::Error::other("x")),
            SignalError::Json(serde_json::from_str::<u8>("nope").unwrap_err()),
            SignalError::MissingField("transcript"),
            SignalError::InvalidQuarter("2024".to_owned()),
            SignalError::OutOfOrder {
                previous: "2024Q2".to_owned(),
                attempted: "2024Q1".to_owned(),
            },
            SignalError::Classifier("down".to_owned()),
            SignalError::ClassifierTimeout { timeout_ms: 10 },
            SignalError::UnparseableLabel("meh".to_owned()),
            SignalError::Config("bad".to_owned()),
            SignalError::Pdf("broken".to_owned()),
        ];
        let mut codes: Vec<_> = errors.iter().map(SignalError::error_code).collect();
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }

    #[test]
    fn adapter_failures_are_distinguished_from_format_errors() {
        assert!(SignalError::ClassifierTimeout { timeout_ms: 5 }.is_adapter_failure());
        assert!(SignalError::UnparseableLabel("?".to_owned()).is_adapter_failure());
        assert!(!SignalError::InvalidQuarter("Q".to_owned()).is_adapter_failure());
        assert!(!SignalError::MissingField("transcript").is_adapter_failure());
    }

    #[test]
    fn out_of_order_message_names_both_quarters() {
        let err = SignalError::OutOfOrder {
            previous: "2024Q3".to_owned(),
            attempted: "2024Q1".to_owned(),
        };
        let text = err.to_string();
        assert!(text.contains("2024Q3"));
        assert!(text.contains("2024Q1"));
    }
}
