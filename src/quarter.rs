use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::SignalError;

/// Fiscal quarter identifier written `YYYYQ#`. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuarterId {
    year: i32,
    quarter: u8,
}

impl QuarterId {
    pub fn year(self) -> i32 {
        self.year
    }

    pub fn quarter(self) -> u8 {
        self.quarter
    }

    /// Calendar quarter containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }

    pub fn previous(self) -> Self {
        match self.quarter {
            1 => Self {
                year: self.year - 1,
                quarter: 4,
            },
            q => Self {
                year: self.year,
                quarter: q - 1,
            },
        }
    }

    /// The `n` quarters ending with the one containing `today`, newest first.
    pub fn last_n(today: NaiveDate, n: usize) -> Vec<Self> {
        std::iter::successors(Some(Self::containing(today)), |q| Some(q.previous()))
            .take(n)
            .collect()
    }
}

impl fmt::Display for QuarterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}Q{}", self.year, self.quarter)
    }
}

impl FromStr for QuarterId {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SignalError::InvalidQuarter(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 6 || bytes[4] != b'Q' || !bytes[..4].iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let year = s[..4].parse().map_err(|_| invalid())?;
        let quarter = match bytes[5] {
            d @ b'1'..=b'4' => d - b'0',
            _ => return Err(invalid()),
        };
        Ok(Self { year, quarter })
    }
}

impl Serialize for QuarterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QuarterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> QuarterId {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_displays() {
        let id = q("2024Q3");
        assert_eq!((id.year(), id.quarter()), (2024, 3));
        assert_eq!(id.to_string(), "2024Q3");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for bad in ["2024Q5", "2024Q0", "24Q1", "2024-Q1", "2024q1", "Q12024", "2024Q12", ""] {
            assert!(
                matches!(bad.parse::<QuarterId>(), Err(SignalError::InvalidQuarter(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn orders_by_year_then_quarter() {
        let mut ids = vec![q("2024Q3"), q("2023Q4"), q("2024Q1")];
        ids.sort();
        let shown: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(shown, ["2023Q4", "2024Q1", "2024Q3"]);
    }

    #[test]
    fn last_n_rolls_back_across_years() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 14).unwrap();
        let shown: Vec<String> = QuarterId::last_n(today, 4).iter().map(ToString::to_string).collect();
        assert_eq!(shown, ["2025Q2", "2025Q1", "2024Q4", "2024Q3"]);
        assert!(QuarterId::last_n(today, 0).is_empty());
    }

    #[test]
    fn containing_maps_month_boundaries() {
        let date = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        assert_eq!(QuarterId::containing(date(3)), q("2024Q1"));
        assert_eq!(QuarterId::containing(date(4)), q("2024Q2"));
        assert_eq!(QuarterId::containing(date(12)), q("2024Q4"));
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&q("2023Q4")).unwrap();
        assert_eq!(json, "\"2023Q4\"");
        let back: QuarterId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q("2023Q4"));
    }
}
