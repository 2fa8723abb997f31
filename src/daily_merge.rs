//! Joins one day's intertie and load tables on hour, aligns the result to the
//! 24 hourly offsets of the day and concatenates days across the window.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::{serialize_date_time, write_csv_atomic, ArtifactError, OutputArtifact};
use crate::extract::{
    display_name, extract_intertie_file, extract_load_file, ExtractError, IntertieHourRecord,
    LoadHourRecord,
};
use crate::window::HOURS_PER_DAY;

/// Column order expected by the warehouse table.
pub const WINDOW_HEADERS: [&str; 6] = [
    "Import",
    "Export",
    "TotalEnergy",
    "TotalLoss",
    "TotalLoad",
    "DateTime",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Replace unset metric cells (placeholders included) with 0.
    pub fill_missing_with_zero: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntertieLoadRecord {
    #[serde(rename = "Import")]
    pub import: Option<f64>,
    #[serde(rename = "Export")]
    pub export: Option<f64>,
    #[serde(rename = "TotalEnergy")]
    pub total_energy: Option<f64>,
    #[serde(rename = "TotalLoss")]
    pub total_loss: Option<f64>,
    #[serde(rename = "TotalLoad")]
    pub total_load: Option<f64>,
    #[serde(rename = "DateTime", serialize_with = "serialize_date_time")]
    pub date_time: NaiveDateTime,
}

impl IntertieLoadRecord {
    pub fn placeholder(date_time: NaiveDateTime) -> Self {
        Self {
            import: None,
            export: None,
            total_energy: None,
            total_loss: None,
            total_load: None,
            date_time,
        }
    }

    pub fn has_metrics(&self) -> bool {
        self.metrics().iter().any(Option::is_some)
    }

    fn metrics(&self) -> [Option<f64>; 5] {
        [
            self.import,
            self.export,
            self.total_energy,
            self.total_loss,
            self.total_load,
        ]
    }

    fn fill_zero(&mut self) {
        for cell in [
            &mut self.import,
            &mut self.export,
            &mut self.total_energy,
            &mut self.total_loss,
            &mut self.total_load,
        ] {
            cell.get_or_insert(0.0);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayMergeStats {
    pub date: NaiveDate,
    pub intertie_hours: usize,
    pub load_hours: usize,
    pub joined_hours: usize,
    /// 1-based hours present in only one of the two sources.
    pub unmatched_hours: Vec<u32>,
    /// 0-based offsets filled with placeholder rows.
    pub placeholder_offsets: Vec<u32>,
    pub coercion_failures: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayMerge {
    pub date: NaiveDate,
    pub records: Vec<IntertieLoadRecord>,
    pub stats: DayMergeStats,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("no 8-digit date token in file name {0}")]
    MissingDateToken(String),
    #[error("invalid date token '{token}' in file name {file}")]
    InvalidDateToken { file: String, token: String },
    #[error("{file}: invalid hour '{value}'")]
    InvalidHour { file: String, value: String },
    #[error("{file}: hour {hour} outside 1-24")]
    HourOutOfRange { file: String, hour: u32 },
    #[error("{file}: hour {hour} appears more than once")]
    DuplicateHour { file: String, hour: u32 },
    #[error("{intertie_file} and {load_file} share no delivery hour")]
    NoMatchingHours {
        intertie_file: String,
        load_file: String,
    },
    #[error("invalid date token pattern: {0}")]
    DatePattern(regex::Error),
    #[error("failed to write window table: {0}")]
    Artifact(#[from] ArtifactError),
}

fn date_token_pattern() -> Result<&'static Regex, MergeError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\d{8}"))
        .as_ref()
        .map_err(|err| MergeError::DatePattern(err.clone()))
}

/// Reads the `YYYYMMDD` token embedded in a daily file name.
pub fn date_from_file_name(file_name: &str) -> Result<NaiveDate, MergeError> {
    let token = date_token_pattern()?
        .find(file_name)
        .ok_or_else(|| MergeError::MissingDateToken(file_name.to_string()))?
        .as_str();
    NaiveDate::parse_from_str(token, "%Y%m%d").map_err(|_| MergeError::InvalidDateToken {
        file: file_name.to_string(),
        token: token.to_string(),
    })
}

/// Extracts both documents of a day and merges them. The day comes from the
/// intertie file name.
pub fn merge_day_files(
    intertie_path: &Path,
    load_path: &Path,
    cfg: &MergeConfig,
) -> Result<DayMerge, MergeError> {
    let intertie_file = display_name(intertie_path);
    let load_file = display_name(load_path);
    let date = date_from_file_name(&intertie_file)?;

    let intertie = extract_intertie_file(intertie_path)?;
    let load = extract_load_file(load_path)?;
    merge_day(date, &intertie, &load, &intertie_file, &load_file, cfg)
}

pub fn merge_day(
    date: NaiveDate,
    intertie: &[IntertieHourRecord],
    load: &[LoadHourRecord],
    intertie_file: &str,
    load_file: &str,
    cfg: &MergeConfig,
) -> Result<DayMerge, MergeError> {
    let intertie_by_offset = index_by_offset(intertie, intertie_file, |row| &row.hour)?;
    let load_by_offset = index_by_offset(load, load_file, |row| &row.hour)?;

    let intertie_offsets: BTreeSet<u32> = intertie_by_offset.keys().copied().collect();
    let load_offsets: BTreeSet<u32> = load_by_offset.keys().copied().collect();
    let unmatched_hours: Vec<u32> = intertie_offsets
        .symmetric_difference(&load_offsets)
        .map(|offset| offset + 1)
        .collect();
    if intertie_offsets.is_disjoint(&load_offsets) {
        return Err(MergeError::NoMatchingHours {
            intertie_file: intertie_file.to_string(),
            load_file: load_file.to_string(),
        });
    }
    if !unmatched_hours.is_empty() {
        warn!(
            component = "daily_merge",
            event = "merge.join.unmatched_hours",
            date = %date,
            hours = ?unmatched_hours
        );
    }

    let mut coercion_failures = 0u64;
    let mut metric = |raw: &str| {
        let value = raw.trim().parse::<f64>().ok().filter(|value| value.is_finite());
        if value.is_none() {
            coercion_failures += 1;
        }
        value
    };

    let mut records = Vec::with_capacity(HOURS_PER_DAY as usize);
    let mut placeholder_offsets = Vec::new();
    let mut joined_hours = 0usize;
    for offset in 0..HOURS_PER_DAY {
        let date_time = hour_start(date, offset);
        let mut record = match (intertie_by_offset.get(&offset), load_by_offset.get(&offset)) {
            (Some(flow), Some(totals)) => {
                joined_hours += 1;
                IntertieLoadRecord {
                    import: metric(&flow.import),
                    export: metric(&flow.export),
                    total_energy: metric(&totals.total_energy),
                    total_loss: metric(&totals.total_loss),
                    total_load: metric(&totals.total_load),
                    date_time,
                }
            }
            _ => {
                placeholder_offsets.push(offset);
                IntertieLoadRecord::placeholder(date_time)
            }
        };
        if cfg.fill_missing_with_zero {
            record.fill_zero();
        }
        records.push(record);
    }

    if !placeholder_offsets.is_empty() {
        warn!(
            component = "daily_merge",
            event = "merge.day.placeholders",
            date = %date,
            offsets = ?placeholder_offsets
        );
    }

    let stats = DayMergeStats {
        date,
        intertie_hours: intertie_by_offset.len(),
        load_hours: load_by_offset.len(),
        joined_hours,
        unmatched_hours,
        placeholder_offsets,
        coercion_failures,
    };
    info!(
        component = "daily_merge",
        event = "merge.day.finish",
        date = %date,
        joined_hours = stats.joined_hours,
        placeholders = stats.placeholder_offsets.len(),
        coercion_failures = stats.coercion_failures
    );

    Ok(DayMerge {
        date,
        records,
        stats,
    })
}

/// Concatenates per-day tables in ascending date order.
pub fn concat_days(days: BTreeMap<NaiveDate, DayMerge>) -> Vec<IntertieLoadRecord> {
    days.into_values().flat_map(|day| day.records).collect()
}

pub fn write_window_table(
    path: &Path,
    records: &[IntertieLoadRecord],
) -> Result<OutputArtifact, MergeError> {
    Ok(write_csv_atomic(path, &WINDOW_HEADERS, records)?)
}

fn index_by_offset<'a, T>(
    rows: &'a [T],
    file: &str,
    hour_of: impl Fn(&T) -> &String,
) -> Result<BTreeMap<u32, &'a T>, MergeError> {
    let mut by_offset = BTreeMap::new();
    for row in rows {
        let raw = hour_of(row).trim();
        let hour: u32 = raw.parse().map_err(|_| MergeError::InvalidHour {
            file: file.to_string(),
            value: raw.to_string(),
        })?;
        if !(1..=HOURS_PER_DAY).contains(&hour) {
            return Err(MergeError::HourOutOfRange {
                file: file.to_string(),
                hour,
            });
        }
        if by_offset.insert(hour - 1, row).is_some() {
            return Err(MergeError::DuplicateHour {
                file: file.to_string(),
                hour,
            });
        }
    }
    Ok(by_offset)
}

fn hour_start(date: NaiveDate, offset: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::default()) + ChronoDuration::hours(i64::from(offset))
}
