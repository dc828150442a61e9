//! Materialized outputs: the wide and long layouts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use covidcast_common::{CovidcastError, Metadata, Result};
use serde::{Deserialize, Serialize};

use crate::key::SignalKey;

/// Key columns every wide table starts with.
pub const WIDE_KEY_COLUMNS: [&str; 2] = ["geo_value", "time_value"];

/// Columns of a long table, in output order.
pub const LONG_COLUMNS: [&str; 10] = [
    "data_source",
    "signal",
    "geo_value",
    "time_value",
    "dt",
    "value",
    "issue",
    "stderr",
    "sample_size",
    "lag",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub geo_value: String,
    pub time_value: NaiveDate,
    /// One cell per entry of [`WideTable::columns`].
    pub values: Vec<Option<f64>>,
}

/// One row per (geo_value, time_value), one value column per (signal, shift).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    /// Value column names, e.g. `value+0:fb-survey_smoothed_cli`.
    pub columns: Vec<String>,
    pub rows: Vec<WideRow>,
    pub meta: Metadata,
}

impl WideTable {
    /// Build a wide table, checking every row has one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<WideRow>, meta: Metadata) -> Result<Self> {
        let table = Self {
            columns,
            rows,
            meta,
        };
        table.validate()?;
        Ok(table)
    }

    /// Check every row has one cell per column. Tables deserialized from
    /// JSON skip [`WideTable::new`], so consumers call this themselves.
    pub fn validate(&self) -> Result<()> {
        match self.rows.iter().find(|r| r.values.len() != self.columns.len()) {
            Some(row) => Err(CovidcastError::Schema(format!(
                "row ({}, {}) has {} values for {} columns",
                row.geo_value,
                row.time_value,
                row.values.len(),
                self.columns.len()
            ))),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r.values.get(idx).copied().flatten()).collect())
    }

    /// The cell at (geo_value, time_value) in `column`. `None` if the row or
    /// column is absent or the value is missing.
    pub fn value(&self, geo_value: &str, time_value: NaiveDate, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .find(|r| r.geo_value == geo_value && r.time_value == time_value)
            .and_then(|r| r.values.get(idx).copied().flatten())
    }
}

/// One row per (data_source, signal, dt, geo_value, time_value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    pub data_source: String,
    pub signal: String,
    pub geo_value: String,
    pub time_value: NaiveDate,
    pub dt: i64,
    pub value: Option<f64>,
    #[serde(default)]
    pub issue: Option<NaiveDate>,
    #[serde(default)]
    pub stderr: Option<f64>,
    #[serde(default)]
    pub sample_size: Option<f64>,
    #[serde(default)]
    pub lag: Option<i64>,
}

impl LongRow {
    pub fn key(&self) -> SignalKey {
        SignalKey::new(self.data_source.clone(), self.signal.clone(), self.dt)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    pub rows: Vec<LongRow>,
    pub meta: Metadata,
}

impl LongTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A value column waiting to be joined: its name and its (geo, time, value) cells.
pub(crate) struct JoinColumn {
    pub name: String,
    pub cells: Vec<(String, NaiveDate, Option<f64>)>,
}

/// Full outer join of value columns on (geo_value, time_value).
///
/// The output index is the union of every column's keys, ordered by
/// (geo_value, time_value). A column with no cell at a key reads as missing
/// there. If a column holds the same key twice, the later cell wins.
pub(crate) fn outer_join(columns: Vec<JoinColumn>) -> (Vec<String>, Vec<WideRow>) {
    let width = columns.len();
    let mut index: BTreeMap<(String, NaiveDate), Vec<Option<f64>>> = BTreeMap::new();
    let mut names = Vec::with_capacity(width);

    for (i, column) in columns.into_iter().enumerate() {
        for (geo_value, time_value, value) in column.cells {
            index
                .entry((geo_value, time_value))
                .or_insert_with(|| vec![None; width])[i] = value;
        }
        names.push(column.name);
    }

    let rows = index
        .into_iter()
        .map(|((geo_value, time_value), values)| WideRow {
            geo_value,
            time_value,
            values,
        })
        .collect();
    (names, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    #[test]
    fn outer_join_unions_keys() {
        let a = JoinColumn {
            name: "a".into(),
            cells: vec![("pa".into(), day(1), Some(1.0)), ("pa".into(), day(2), Some(2.0))],
        };
        let b = JoinColumn {
            name: "b".into(),
            cells: vec![("pa".into(), day(2), Some(20.0)), ("ny".into(), day(1), None)],
        };

        let (names, rows) = outer_join(vec![a, b]);

        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].geo_value, "ny");
        assert_eq!(rows[0].values, vec![None, None]);
        assert_eq!(rows[1].values, vec![Some(1.0), None]);
        assert_eq!(rows[2].values, vec![Some(2.0), Some(20.0)]);
    }

    #[test]
    fn wide_table_rejects_ragged_rows() {
        let rows = vec![WideRow {
            geo_value: "pa".into(),
            time_value: day(1),
            values: vec![Some(1.0)],
        }];
        let err = WideTable::new(vec!["a".into(), "b".into()], rows, Metadata::new()).unwrap_err();
        assert!(matches!(err, CovidcastError::Schema(_)));
    }
}
