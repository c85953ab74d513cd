use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use clap::ValueEnum;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

use crate::error::{PipelineError, PipelineResult};

pub const EXPORT_TIMESTAMP_COLUMN: &str = "Ends dd/mm/YYYY HH:MM";
pub const EXPORT_POWER_COLUMN: &str = "Power MW";
pub const TABLE_SITE_COLUMN: &str = "SITE";
pub const TABLE_DATE_COLUMN: &str = "DATE";

const TIMESTAMP_FORMATS: &[&str] = &["%d/%m/%Y %H:%M", "%d/%m/%Y %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
const KWH_PER_MWH: f64 = 1000.0;

/// `HOUR 01` covers 00:00-01:00 and is labelled with its start.
pub const DEFAULT_HOUR_CONVENTION: HourConvention = HourConvention::Start;

/// A timestamped value in the reference zone, as read from a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// How export timestamps relate to the reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimestampZone {
    /// Timestamps are UTC and get shifted to the reference offset.
    Utc,
    /// Timestamps are already wall-clock time in the reference zone.
    Local,
}

/// Mapping of the `HOUR nn` columns of an hourly table to clock hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HourConvention {
    /// `HOUR 01` -> `00:00` ... `HOUR 24` -> `23:00`
    Start,
    /// `HOUR 01` -> `01:00` ... `HOUR 23` -> `23:00`, `HOUR 24` dropped
    End,
}

impl HourConvention {
    /// Clock hour for the 1-based column index, if the column is kept.
    pub fn clock_hour(self, index: u32) -> Option<u32> {
        if !(1..=24).contains(&index) {
            return None;
        }
        match self {
            HourConvention::Start => Some(index - 1),
            HourConvention::End if index == 24 => None,
            HourConvention::End => Some(index),
        }
    }
}

/// Parse a time-series export: banner line, then a `;` table with an
/// end-of-hour timestamp and instantaneous power in MW.
pub fn parse_export(
    source_name: &str,
    reader: impl Read,
    zone: TimestampZone,
    offset: FixedOffset,
) -> PipelineResult<Vec<RawReading>> {
    let mut reader = BufReader::new(reader);
    let mut banner = String::new();
    reader
        .read_line(&mut banner)
        .map_err(|e| PipelineError::malformed(source_name, format!("unreadable banner: {e}")))?;
    debug!("{}: skipping banner {:?}", source_name, banner.trim());

    let mut csv = table_reader(reader);
    let headers = read_headers(source_name, &mut csv)?;
    let ts_idx = column_index(source_name, &headers, EXPORT_TIMESTAMP_COLUMN)?;
    let power_idx = column_index(source_name, &headers, EXPORT_POWER_COLUMN)?;

    let mut readings = Vec::new();
    for record in csv.records() {
        let record = record.map_err(|e| PipelineError::malformed(source_name, e.to_string()))?;
        if is_blank(&record) {
            continue;
        }
        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            PipelineError::UnparseableTimestamp {
                source_name: source_name.to_string(),
                value: raw_ts.to_string(),
            }
        })?;
        let timestamp = match zone {
            TimestampZone::Utc => offset.from_utc_datetime(&timestamp).naive_local(),
            TimestampZone::Local => timestamp,
        };
        let value = parse_number(source_name, record.get(power_idx).unwrap_or_default())?;
        readings.push(RawReading { timestamp, value });
    }

    debug!("{}: parsed {} export readings", source_name, readings.len());
    Ok(readings)
}

/// Parse a daily hourly table: one row per site code, `HOUR 01`..`HOUR 24`
/// columns in kWh. Only rows of the latest `DATE` are kept; a table without
/// a date column is taken to describe `reference_date`. Values are returned
/// in MWh, grouped by site code.
pub fn parse_hourly_table(
    source_name: &str,
    reader: impl Read,
    convention: HourConvention,
    reference_date: NaiveDate,
) -> PipelineResult<BTreeMap<String, Vec<RawReading>>> {
    let mut csv = table_reader(reader);
    let headers = read_headers(source_name, &mut csv)?;
    let site_idx = column_index(source_name, &headers, TABLE_SITE_COLUMN)?;
    let date_idx = headers.iter().position(|h| h == TABLE_DATE_COLUMN);
    let hour_idx = (1..=24u32)
        .map(|i| column_index(source_name, &headers, &format!("HOUR {:02}", i)).map(|idx| (i, idx)))
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record.map_err(|e| PipelineError::malformed(source_name, e.to_string()))?;
        if is_blank(&record) {
            continue;
        }
        let site = record.get(site_idx).unwrap_or_default().to_string();
        if site.is_empty() {
            return Err(PipelineError::malformed(source_name, "row without site code"));
        }
        let date = match date_idx {
            Some(idx) => {
                let raw = record.get(idx).unwrap_or_default();
                parse_date(raw).ok_or_else(|| PipelineError::UnparseableTimestamp {
                    source_name: source_name.to_string(),
                    value: raw.to_string(),
                })?
            }
            None => reference_date,
        };
        rows.push((site, date, record));
    }

    let Some(latest) = rows.iter().map(|(_, date, _)| *date).max() else {
        return Ok(BTreeMap::new());
    };

    let mut units: BTreeMap<String, Vec<RawReading>> = BTreeMap::new();
    for (site, date, record) in rows.into_iter().filter(|(_, date, _)| *date == latest) {
        let readings = units.entry(site).or_default();
        for &(index, idx) in &hour_idx {
            let Some(hour) = convention.clock_hour(index) else {
                continue;
            };
            let value = parse_number(source_name, record.get(idx).unwrap_or_default())?;
            if let Some(timestamp) = date.and_hms_opt(hour, 0, 0) {
                readings.push(RawReading {
                    timestamp,
                    value: value.map(|kwh| kwh / KWH_PER_MWH),
                });
            }
        }
    }

    debug!(
        "{}: {} site code(s) on {}",
        source_name,
        units.len(),
        latest
    );
    Ok(units)
}

fn table_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

fn read_headers<R: Read>(
    source_name: &str,
    csv: &mut csv::Reader<R>,
) -> PipelineResult<StringRecord> {
    csv.headers()
        .cloned()
        .map_err(|e| PipelineError::malformed(source_name, format!("unreadable header: {e}")))
}

fn column_index(source_name: &str, headers: &StringRecord, column: &str) -> PipelineResult<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PipelineError::malformed(source_name, format!("missing column {column:?}")))
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Cell spellings that mean "no value".
const MISSING_MARKERS: &[&str] = &["nan", "na", "n/a", "null"];

/// Blank and missing-marker cells carry no value; anything else must be a
/// finite number, with either a dot or a comma as decimal separator.
fn parse_number(source_name: &str, raw: &str) -> PipelineResult<Option<f64>> {
    if raw.is_empty() || MISSING_MARKERS.iter().any(|m| raw.eq_ignore_ascii_case(m)) {
        return Ok(None);
    }
    let not_a_number = || PipelineError::malformed(source_name, format!("not a number: {raw:?}"));
    let value = raw.replace(',', ".").parse::<f64>().map_err(|_| not_a_number())?;
    if !value.is_finite() {
        return Err(not_a_number());
    }
    Ok(Some(value))
}
