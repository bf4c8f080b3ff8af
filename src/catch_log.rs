use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};

use crate::models::{CatchRecord, Submission, Variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter your name and a valid length.")]
    MissingField,

    #[error("Please enter the tag number of the tagged fish.")]
    MissingTagNumber,
}

impl ValidationError {
    /// Stable machine readable name used by the JSON API.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::MissingTagNumber => "missing_tag_number",
        }
    }

    /// Inverse of [`ValidationError::kind`].
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "missing_field" => Some(Self::MissingField),
            "missing_tag_number" => Some(Self::MissingTagNumber),
            _ => None,
        }
    }
}

/// Append-only log of the catches made during one session.
#[derive(Debug, Clone, Default)]
pub struct CatchLog {
    variant: Variant,
    records: Vec<CatchRecord>,
}

impl CatchLog {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            records: Vec::new(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Validates `submission`, stamps it with `now` and appends it.
    ///
    /// A rejected submission leaves the log untouched.
    pub fn append(
        &mut self,
        submission: Submission,
        now: NaiveDateTime,
    ) -> Result<&CatchRecord, ValidationError> {
        if let Err(err) = self.validate(&submission) {
            debug!("Rejected submission {submission:?}: {err}");
            return Err(err);
        }

        let record = CatchRecord::new(submission, now);
        info!("{record}");

        self.records.push(record);
        // just pushed, so the log is not empty
        Ok(&self.records[self.records.len() - 1])
    }

    fn validate(&self, submission: &Submission) -> Result<(), ValidationError> {
        let length = submission.length_in;
        if submission.technician.trim().is_empty() || !(length.is_finite() && length > 0.0) {
            return Err(ValidationError::MissingField);
        }

        let has_tag_number = submission
            .tag_number
            .as_deref()
            .map_or(false, |tag| !tag.trim().is_empty());
        if self.variant.requires_tag_number() && submission.tagged && !has_tag_number {
            return Err(ValidationError::MissingTagNumber);
        }

        Ok(())
    }

    /// All records logged on `date`, in insertion order.
    pub fn filter_by_date(&self, date: NaiveDate) -> Vec<&CatchRecord> {
        filter_by_date(&self.records, date)
    }

    pub fn records(&self) -> &[CatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn filter_by_date<'a, I>(records: I, date: NaiveDate) -> Vec<&'a CatchRecord>
where
    I: IntoIterator<Item = &'a CatchRecord>,
{
    records
        .into_iter()
        .filter(|record| record.date() == date)
        .collect()
}
