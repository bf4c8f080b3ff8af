use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    catch_log::CatchLog,
    leaderboard::{biggest_fish, length_histogram, most_fish, AnglerCount, Bucket},
    models::{CatchRecord, Variant},
};

/// A catch as shown in the "All Catches" table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchRow {
    pub technician: String,
    pub length_in: f64,
    pub weight_lbs: Option<f64>,
    pub tagged: bool,
    pub tag_number: Option<String>,
    pub logged_at: String,
}

impl From<&CatchRecord> for CatchRow {
    fn from(record: &CatchRecord) -> Self {
        Self {
            technician: record.technician().to_string(),
            length_in: record.length_in(),
            weight_lbs: record.weight_lbs(),
            tagged: record.tagged(),
            tag_number: record.tag_number().map(str::to_string),
            logged_at: record.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Everything the dashboard shows for a single day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub variant: Variant,
    pub catches: Vec<CatchRow>,
    pub most_fish: Vec<AnglerCount>,
    pub top_angler: Option<AnglerCount>,
    pub biggest_fish: Option<CatchRow>,
    pub histogram: Option<Vec<Bucket>>,
    pub histogram_peak: usize,
}

impl Dashboard {
    pub fn build(log: &CatchLog, date: NaiveDate, bins: usize) -> Self {
        let today = log.filter_by_date(date);

        let most_fish = most_fish(today.iter().copied());
        let histogram = log
            .variant()
            .has_histogram()
            .then(|| length_histogram(today.iter().copied(), bins));
        let histogram_peak = histogram
            .iter()
            .flatten()
            .map(|bucket| bucket.count)
            .max()
            .unwrap_or(0);

        Self {
            date,
            variant: log.variant(),
            top_angler: most_fish.first().cloned(),
            biggest_fish: biggest_fish(today.iter().copied()).map(CatchRow::from),
            catches: today.into_iter().map(CatchRow::from).collect(),
            most_fish,
            histogram,
            histogram_peak,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.catches.is_empty()
    }
}
