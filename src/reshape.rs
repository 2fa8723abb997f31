//! Monthly generator output/capability report: wide per-hour rows in, one
//! record per generator-hour out, with scaled metrics.
//!
//! Input layout: a fixed preamble, then a header of
//! `Delivery Date, Generator, Fuel Type, Measurement, Hour 1 .. Hour 24`.
//! Each wide row holds one measurement for one generator-day. Rows are
//! unpivoted into (timestamp, generator, fuel type, measurement) cells and
//! re-widened so every measurement becomes its own column.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifacts::{serialize_date_time, write_csv_atomic, ArtifactError, OutputArtifact};
use crate::window::HOURS_PER_DAY;

pub const OUTPUT_PREAMBLE_ROWS: usize = 3;
pub const OUTPUT_COLUMN_COUNT: usize = 28;

pub const DELIVERY_DATE_COLUMN: &str = "Delivery Date";
pub const GENERATOR_COLUMN: &str = "Generator";
pub const FUEL_TYPE_COLUMN: &str = "Fuel Type";
pub const MEASUREMENT_COLUMN: &str = "Measurement";
pub const ID_COLUMNS: [&str; 4] = [
    DELIVERY_DATE_COLUMN,
    GENERATOR_COLUMN,
    FUEL_TYPE_COLUMN,
    MEASUREMENT_COLUMN,
];

const HOUR_COLUMN_PREFIX: &str = "Hour ";
const DELIVERY_DATE_FORMAT: &str = "%Y-%m-%d";

pub const OUTPUT_HEADERS: [&str; 11] = [
    "DateTime",
    "Generator",
    "FuelType",
    "AvailableCapacity",
    "Capability",
    "Forecast",
    "Output",
    "ScaledAvailableCapacity",
    "ScaledCapability",
    "ScaledForecast",
    "ScaledOutput",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Measurement {
    AvailableCapacity,
    Capability,
    Forecast,
    Output,
}

impl Measurement {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Available Capacity" => Some(Self::AvailableCapacity),
            "Capability" => Some(Self::Capability),
            "Forecast" => Some(Self::Forecast),
            "Output" => Some(Self::Output),
            _ => None,
        }
    }

    pub fn source_name(self) -> &'static str {
        match self {
            Self::AvailableCapacity => "Available Capacity",
            Self::Capability => "Capability",
            Self::Forecast => "Forecast",
            Self::Output => "Output",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasurementValues {
    pub available_capacity: Option<f64>,
    pub capability: Option<f64>,
    pub forecast: Option<f64>,
    pub output: Option<f64>,
}

impl MeasurementValues {
    fn from_slots(slots: &[Option<f64>; 4]) -> Self {
        Self {
            available_capacity: slots[Measurement::AvailableCapacity.index()],
            capability: slots[Measurement::Capability.index()],
            forecast: slots[Measurement::Forecast.index()],
            output: slots[Measurement::Output.index()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    #[serde(rename = "DateTime", serialize_with = "serialize_date_time")]
    pub date_time: NaiveDateTime,
    #[serde(rename = "Generator")]
    pub generator: String,
    #[serde(rename = "FuelType")]
    pub fuel_type: String,
    #[serde(rename = "AvailableCapacity")]
    pub available_capacity: Option<f64>,
    #[serde(rename = "Capability")]
    pub capability: Option<f64>,
    #[serde(rename = "Forecast")]
    pub forecast: Option<f64>,
    #[serde(rename = "Output")]
    pub output: f64,
    #[serde(rename = "ScaledAvailableCapacity")]
    pub scaled_available_capacity: Option<f64>,
    #[serde(rename = "ScaledCapability")]
    pub scaled_capability: Option<f64>,
    #[serde(rename = "ScaledForecast")]
    pub scaled_forecast: Option<f64>,
    #[serde(rename = "ScaledOutput")]
    pub scaled_output: Option<f64>,
}

impl OutputRecord {
    /// Builds the record with derived metrics; `None` when Output is missing.
    ///
    /// ScaledOutput prefers AvailableCapacity over Capability whenever both
    /// are present. A zero denominator leaves the ratio missing.
    pub fn from_measurements(
        date_time: NaiveDateTime,
        generator: String,
        fuel_type: String,
        values: MeasurementValues,
    ) -> Option<Self> {
        let output = values.output?;

        let mut scaled_output = values.capability.map(|capability| output / capability);
        if let Some(available) = values.available_capacity {
            scaled_output = Some(output / available);
        }
        let scaled_forecast = match (values.forecast, values.available_capacity) {
            (Some(forecast), Some(available)) => Some(forecast / available),
            _ => None,
        };

        Some(Self {
            date_time,
            generator,
            fuel_type,
            available_capacity: values.available_capacity,
            capability: values.capability,
            forecast: values.forecast,
            output,
            scaled_available_capacity: values.available_capacity.map(|_| 1.0),
            scaled_capability: values.capability.map(|_| 1.0),
            scaled_forecast: scaled_forecast.and_then(finite),
            scaled_output: scaled_output.and_then(finite),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReshapeStats {
    pub wide_rows: u64,
    pub blank_cells: u64,
    pub coercion_failures: u64,
    pub unknown_measurement_rows: u64,
    pub rows_without_output: u64,
    pub records: u64,
}

#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("unrecognized hour column '{0}'")]
    InvalidHourColumn(String),
    #[error("line {line}: invalid delivery date '{value}'")]
    InvalidDeliveryDate { line: u64, value: String },
    #[error("duplicate {measurement} value for {generator} ({fuel_type}) at {date_time}")]
    DuplicateMeasurement {
        date_time: NaiveDateTime,
        generator: String,
        fuel_type: String,
        measurement: &'static str,
    },
    #[error("failed to write output: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Zero-based hour offset for an `Hour N` column label, N in 1..=24.
pub fn parse_hour_label(label: &str) -> Option<u32> {
    let hour: u32 = label.strip_prefix(HOUR_COLUMN_PREFIX)?.trim().parse().ok()?;
    (1..=HOURS_PER_DAY).contains(&hour).then(|| hour - 1)
}

pub fn hour_column_name(hour: u32) -> String {
    format!("{HOUR_COLUMN_PREFIX}{hour}")
}

/// The 28 column names of the wide report, in file order.
pub fn canonical_output_columns() -> Vec<String> {
    ID_COLUMNS
        .iter()
        .map(|name| name.to_string())
        .chain((1..=HOURS_PER_DAY).map(hour_column_name))
        .collect()
}

/// Body of the report after its fixed preamble lines.
pub fn strip_preamble(source: &str, rows: usize) -> &str {
    let mut rest = source;
    for _ in 0..rows {
        match rest.find('\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return "",
        }
    }
    rest
}

pub(crate) fn wide_reader(source: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(strip_preamble(source, OUTPUT_PREAMBLE_ROWS).as_bytes())
}

struct Layout {
    delivery_date: usize,
    generator: usize,
    fuel_type: usize,
    measurement: usize,
    hours: Vec<(usize, u32)>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ReshapeError> {
        let position = |name: &'static str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or(ReshapeError::MissingColumn(name))
        };

        let mut hours = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if !header.starts_with(HOUR_COLUMN_PREFIX) {
                continue;
            }
            let offset = parse_hour_label(header)
                .ok_or_else(|| ReshapeError::InvalidHourColumn(header.to_string()))?;
            hours.push((idx, offset));
        }

        Ok(Self {
            delivery_date: position(DELIVERY_DATE_COLUMN)?,
            generator: position(GENERATOR_COLUMN)?,
            fuel_type: position(FUEL_TYPE_COLUMN)?,
            measurement: position(MEASUREMENT_COLUMN)?,
            hours,
        })
    }
}

type PivotKey = (NaiveDateTime, String, String);

#[derive(Default)]
struct PivotRow {
    values: [Option<f64>; 4],
    seen: [bool; 4],
}

pub fn reshape_output_csv(
    source: &str,
) -> Result<(Vec<OutputRecord>, ReshapeStats), ReshapeError> {
    let mut reader = wide_reader(source);
    let layout = Layout::from_headers(reader.headers()?)?;
    let mut stats = ReshapeStats::default();
    let mut pivot: BTreeMap<PivotKey, PivotRow> = BTreeMap::new();

    for record in reader.records() {
        let record = record?;
        stats.wide_rows += 1;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let measurement_raw = field(layout.measurement);
        let Some(measurement) = Measurement::parse(measurement_raw) else {
            stats.unknown_measurement_rows += 1;
            debug!(
                component = "reshape",
                event = "reshape.measurement.unknown",
                line,
                measurement = measurement_raw
            );
            continue;
        };

        let mut cells = Vec::with_capacity(layout.hours.len());
        for (idx, offset) in &layout.hours {
            let raw = field(*idx).trim();
            if raw.is_empty() {
                stats.blank_cells += 1;
                continue;
            }
            let value = raw.parse::<f64>().ok().filter(|value| value.is_finite());
            if value.is_none() {
                stats.coercion_failures += 1;
            }
            cells.push((*offset, value));
        }
        if cells.is_empty() {
            continue;
        }

        let date_raw = field(layout.delivery_date).trim();
        let date = NaiveDate::parse_from_str(date_raw, DELIVERY_DATE_FORMAT).map_err(|_| {
            ReshapeError::InvalidDeliveryDate {
                line,
                value: date_raw.to_string(),
            }
        })?;
        let generator = field(layout.generator);
        let fuel_type = field(layout.fuel_type);

        for (offset, value) in cells {
            let date_time = date.and_hms_opt(offset, 0, 0).ok_or_else(|| {
                ReshapeError::InvalidDeliveryDate {
                    line,
                    value: date_raw.to_string(),
                }
            })?;
            let key = (date_time, generator.to_string(), fuel_type.to_string());
            let row = pivot.entry(key).or_default();
            let slot = measurement.index();
            if row.seen[slot] {
                return Err(ReshapeError::DuplicateMeasurement {
                    date_time,
                    generator: generator.to_string(),
                    fuel_type: fuel_type.to_string(),
                    measurement: measurement.source_name(),
                });
            }
            row.seen[slot] = true;
            row.values[slot] = value;
        }
    }

    let mut records = Vec::with_capacity(pivot.len());
    for ((date_time, generator, fuel_type), row) in pivot {
        let values = MeasurementValues::from_slots(&row.values);
        match OutputRecord::from_measurements(date_time, generator, fuel_type, values) {
            Some(record) => records.push(record),
            None => stats.rows_without_output += 1,
        }
    }
    stats.records = records.len() as u64;

    if stats.coercion_failures > 0 {
        warn!(
            component = "reshape",
            event = "reshape.coercion_failures",
            coercion_failures = stats.coercion_failures
        );
    }
    if stats.unknown_measurement_rows > 0 {
        warn!(
            component = "reshape",
            event = "reshape.measurement.skipped",
            rows = stats.unknown_measurement_rows
        );
    }

    Ok((records, stats))
}

/// Reads the monthly report at `input`, writes the long table to `output`.
pub fn transform_output_file(
    input: &Path,
    output: &Path,
) -> Result<(OutputArtifact, ReshapeStats), ReshapeError> {
    info!(
        component = "reshape",
        event = "reshape.start",
        input = %input.display()
    );

    let source = fs::read_to_string(input)?;
    let (records, stats) = reshape_output_csv(&source)?;
    let artifact = write_csv_atomic(output, &OUTPUT_HEADERS, &records)?;

    info!(
        component = "reshape",
        event = "reshape.finish",
        wide_rows = stats.wide_rows,
        blank_cells = stats.blank_cells,
        coercion_failures = stats.coercion_failures,
        unknown_measurement_rows = stats.unknown_measurement_rows,
        rows_without_output = stats.rows_without_output,
        records = stats.records
    );

    Ok((artifact, stats))
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
