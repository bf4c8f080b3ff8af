use std::{fmt::Display, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Which flavour of the tournament form is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Name, length, optional weight and a tagged checkbox.
    #[default]
    Classic,
    /// Like [`Variant::Classic`] but tagged fish need a tag number and the
    /// dashboard shows a length histogram.
    Tagging,
}

impl Variant {
    pub fn requires_tag_number(self) -> bool {
        matches!(self, Self::Tagging)
    }

    pub fn has_histogram(self) -> bool {
        matches!(self, Self::Tagging)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant {0:?}, expected `classic` or `tagging`")]
pub struct UnknownVariant(String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "tagging" => Ok(Self::Tagging),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
            Self::Tagging => write!(f, "tagging"),
        }
    }
}

/// A catch as entered on the form, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub technician: String,
    pub length_in: f64,
    pub weight_lbs: Option<f64>,
    pub tagged: bool,
    pub tag_number: Option<String>,
}

/// One logged fish.
///
/// Records can only be created by [`CatchLog::append`](crate::catch_log::CatchLog::append)
/// and are never handed out mutably.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchRecord {
    technician: String,
    length_in: f64,
    weight_lbs: Option<f64>,
    tagged: bool,
    tag_number: Option<String>,
    timestamp: NaiveDateTime,
    date: NaiveDate,
}

impl CatchRecord {
    /// Builds a record from an already validated submission.
    pub(crate) fn new(submission: Submission, timestamp: NaiveDateTime) -> Self {
        Self {
            technician: submission.technician.trim().to_string(),
            length_in: submission.length_in,
            weight_lbs: submission
                .weight_lbs
                .filter(|weight| weight.is_finite() && *weight > 0.0),
            tagged: submission.tagged,
            tag_number: submission
                .tag_number
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty()),
            timestamp,
            date: timestamp.date(),
        }
    }

    pub fn technician(&self) -> &str {
        &self.technician
    }

    pub fn length_in(&self) -> f64 {
        self.length_in
    }

    pub fn weight_lbs(&self) -> Option<f64> {
        self.weight_lbs
    }

    pub fn tagged(&self) -> bool {
        self.tagged
    }

    pub fn tag_number(&self) -> Option<&str> {
        self.tag_number.as_deref()
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Display for CatchRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} caught a {:.1}in bass", self.technician, self.length_in)?;
        if let Some(weight) = self.weight_lbs {
            write!(f, " ({weight:.1}lbs)")?;
        }
        match (self.tagged, &self.tag_number) {
            (true, Some(tag)) => write!(f, " tagged #{tag}")?,
            (true, None) => write!(f, " tagged")?,
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("classic", Variant::Classic ; "lowercase classic")]
    #[test_case("Tagging", Variant::Tagging ; "capitalized tagging")]
    #[test_case(" tagging ", Variant::Tagging ; "padded tagging")]
    fn parse_variant(input: &str, expected: Variant) {
        assert_eq!(input.parse::<Variant>().unwrap(), expected);
    }

    #[test]
    fn parse_unknown_variant() {
        assert!("histogram".parse::<Variant>().is_err());
    }

    #[test]
    fn record_normalizes_submission() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 18)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        let record = CatchRecord::new(
            Submission {
                technician: "  Dana ".to_string(),
                length_in: 14.2,
                weight_lbs: Some(0.0),
                tagged: true,
                tag_number: Some(" A-17 ".to_string()),
            },
            timestamp,
        );

        assert_eq!(record.technician(), "Dana");
        assert_eq!(record.weight_lbs(), None);
        assert_eq!(record.tag_number(), Some("A-17"));
        assert_eq!(record.date(), timestamp.date());
        assert_eq!(record.to_string(), "Dana caught a 14.2in bass tagged #A-17");
    }
}
