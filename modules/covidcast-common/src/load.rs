//! Turn API responses (already fetched) into signal tables.
//!
//! The epidata API wraps rows as `{"result": 1, "epidata": [...], "message": "success"}`;
//! exported files are often the bare `epidata` array. Both are accepted.
//! Records are validated one by one so a bad row names its column.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CovidcastError, Result};
use crate::metadata::{MetaRow, Metadata};
use crate::types::{GeoType, Observation, SignalTable};

/// `result` code the API uses for a successful response.
const RESULT_SUCCESS: i64 = 1;

/// Unwrap the epidata envelope, or accept a bare array.
fn epidata_records(body: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(records) => Ok(records),
        Value::Object(mut envelope) => {
            let result = envelope.get("result").and_then(Value::as_i64);
            if let Some(code) = result {
                if code != RESULT_SUCCESS {
                    let message = envelope
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("no message");
                    return Err(CovidcastError::Parse(format!(
                        "API returned result {code}: {message}"
                    )));
                }
            }
            match envelope.remove("epidata") {
                Some(Value::Array(records)) => Ok(records),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(other) => Err(CovidcastError::Parse(format!(
                    "epidata must be an array, got {other}"
                ))),
            }
        }
        other => Err(CovidcastError::Parse(format!(
            "expected an epidata object or array, got {other}"
        ))),
    }
}

fn from_yyyymmdd(n: i64) -> Option<NaiveDate> {
    let (year, month, day) = (n / 10_000, (n / 100) % 100, n % 100);
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month as u32, day as u32)
}

/// Parse a date given as `"YYYY-MM-DD"`, `"YYYYMMDD"` or the integer `YYYYMMDD`.
pub fn parse_date(value: &Value, column: &str) -> Result<NaiveDate> {
    let bad = || CovidcastError::Schema(format!("{column} is not a date: {value}"));
    match value {
        Value::String(s) if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok().and_then(from_yyyymmdd).ok_or_else(bad)
        }
        Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| bad()),
        Value::Number(n) => n.as_i64().and_then(from_yyyymmdd).ok_or_else(bad),
        _ => Err(bad()),
    }
}

fn optional_date(record: &Map<String, Value>, column: &str) -> Result<Option<NaiveDate>> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_date(v, column).map(Some),
    }
}

fn optional_f64(record: &Map<String, Value>, column: &str) -> Result<Option<f64>> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| CovidcastError::Schema(format!("{column} is not numeric: {v}"))),
    }
}

fn optional_string(record: &Map<String, Value>, column: &str) -> Result<Option<String>> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v) => Err(CovidcastError::Schema(format!("{column} is not a string: {v}"))),
    }
}

fn required<'a>(record: &'a Map<String, Value>, column: &str, index: usize) -> Result<&'a Value> {
    record
        .get(column)
        .ok_or_else(|| CovidcastError::Schema(format!("record {index} has no {column} column")))
}

/// Validate one loosely typed record into an [`Observation`].
pub fn parse_record(record: &Value, index: usize) -> Result<Observation> {
    let record = record
        .as_object()
        .ok_or_else(|| CovidcastError::Schema(format!("record {index} is not an object")))?;

    let geo_value = match required(record, "geo_value", index)? {
        Value::String(s) => s.clone(),
        // County FIPS codes sometimes arrive as bare numbers; table_from_json
        // restores their leading zeros once the geo_type is known.
        Value::Number(n) => n.to_string(),
        other => {
            return Err(CovidcastError::Schema(format!(
                "record {index}: geo_value is not a string: {other}"
            )))
        }
    };
    let time_value = parse_date(required(record, "time_value", index)?, "time_value")?;

    let value = match required(record, "value", index)? {
        Value::Null => None,
        v => Some(v.as_f64().ok_or_else(|| {
            CovidcastError::Schema(format!("record {index}: value is not numeric: {v}"))
        })?),
    };

    let lag = match record.get("lag") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_i64().ok_or_else(|| {
            CovidcastError::Schema(format!("record {index}: lag is not an integer: {v}"))
        })?),
    };

    Ok(Observation {
        data_source: optional_string(record, "data_source")?,
        signal: optional_string(record, "signal")?,
        geo_value,
        time_value,
        value,
        issue: optional_date(record, "issue")?,
        stderr: optional_f64(record, "stderr")?,
        sample_size: optional_f64(record, "sample_size")?,
        lag,
    })
}

/// Parse every record of a response body.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>> {
    epidata_records(body)?
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(record, index))
        .collect()
}

/// Build a [`SignalTable`] from a response body.
///
/// The table's identity comes from the arguments when given, otherwise from
/// the first record's explicit `data_source`/`signal` columns. With a
/// `geo_type`, numeric county and MSA codes are zero-padded to five digits;
/// without one, geo values are kept as given.
pub fn table_from_json(
    body: &str,
    data_source: Option<&str>,
    signal: Option<&str>,
    geo_type: Option<GeoType>,
) -> Result<SignalTable> {
    let mut rows = parse_observations(body)?;
    if let Some(geo_type) = geo_type {
        for row in &mut rows {
            row.geo_value = geo_type.canonical_geo_value(&row.geo_value);
        }
    }

    let data_source = data_source
        .map(str::to_string)
        .or_else(|| rows.iter().find_map(|r| r.data_source.clone()))
        .ok_or_else(|| {
            CovidcastError::Schema("no data_source given and none found in records".to_string())
        })?;
    let signal = signal
        .map(str::to_string)
        .or_else(|| rows.iter().find_map(|r| r.signal.clone()))
        .ok_or_else(|| {
            CovidcastError::Schema("no signal given and none found in records".to_string())
        })?;

    debug!(
        data_source = data_source.as_str(),
        signal = signal.as_str(),
        rows = rows.len(),
        "Loaded signal table"
    );

    let table = SignalTable::new(data_source, signal, rows);
    Ok(match geo_type {
        Some(geo_type) => table.with_geo_type(geo_type),
        None => table,
    })
}

/// Parse a metadata response (`covidcast_meta` rows) into a [`Metadata`]
/// catalog with one row per (data_source, signal, geo_type).
pub fn metadata_from_json(body: &str) -> Result<Metadata> {
    let mut meta = Metadata::new();
    for (index, record) in epidata_records(body)?.into_iter().enumerate() {
        let row: MetaRow = serde_json::from_value(record).map_err(|e| {
            CovidcastError::Schema(format!("metadata record {index}: {e}"))
        })?;
        meta.merge_catalog_row(&row);
    }
    Ok(meta)
}
