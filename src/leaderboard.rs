//! Aggregations shown on the dashboard.
//!
//! Everything here is a pure function of the records passed in. Ties are always
//! resolved in favour of whatever was logged first.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::CatchRecord;

pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnglerCount {
    pub technician: String,
    pub count: usize,
}

/// Number of fish per technician, most first.
pub fn most_fish<'a, I>(records: I) -> Vec<AnglerCount>
where
    I: IntoIterator<Item = &'a CatchRecord>,
{
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<AnglerCount> = Vec::new();

    for record in records {
        let technician = record.technician();
        match positions.get(technician) {
            Some(&position) => counts[position].count += 1,
            None => {
                positions.insert(technician, counts.len());
                counts.push(AnglerCount {
                    technician: technician.to_string(),
                    count: 1,
                });
            }
        }
    }

    // stable, so equal counts keep first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// The longest fish, or `None` if nothing was caught.
pub fn biggest_fish<'a, I>(records: I) -> Option<&'a CatchRecord>
where
    I: IntoIterator<Item = &'a CatchRecord>,
{
    records.into_iter().reduce(|biggest, record| {
        if record.length_in() > biggest.length_in() {
            record
        } else {
            biggest
        }
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Counts lengths into `bins` equally wide buckets between the shortest and
/// the longest fish.
///
/// Buckets are half open except for the last one, which also holds the
/// maximum. If all fish have the same length the range is widened by half an
/// inch on either side.
pub fn length_histogram<'a, I>(records: I, bins: usize) -> Vec<Bucket>
where
    I: IntoIterator<Item = &'a CatchRecord>,
{
    let lengths: Vec<f64> = records.into_iter().map(CatchRecord::length_in).collect();
    if lengths.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut min = lengths.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = lengths.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        min -= 0.5;
        max += 0.5;
    }

    let width = (max - min) / bins as f64;
    let mut buckets: Vec<Bucket> = (0..bins)
        .map(|i| Bucket {
            start: min + width * i as f64,
            end: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for length in lengths {
        let index = (((length - min) / width) as usize).min(bins - 1);
        buckets[index].count += 1;
    }

    buckets
}
