//! Per-(data_source, signal) metadata that travels alongside signal tables.
//!
//! Metadata is not a column of the table it describes. Every transform takes
//! it in and hands a (possibly merged) copy back out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CovidcastError, Result};
use crate::types::GeoType;

/// Columns every metadata row has, in display order.
pub const KEY_COLUMNS: [&str; 3] = ["data_source", "signal", "geo_type"];

/// Metadata for one (data_source, signal).
///
/// Scalar attributes other than `geo_type` (`mean_value`, `stdev_value`,
/// `num_locations`, ...) live in `fields`; rows need not agree on which
/// fields they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRow {
    pub data_source: String,
    pub signal: String,
    #[serde(default)]
    pub geo_type: Option<GeoType>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl MetaRow {
    pub fn new(data_source: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            signal: signal.into(),
            geo_type: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_geo_type(mut self, geo_type: GeoType) -> Self {
        self.geo_type = Some(geo_type);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn is_for(&self, data_source: &str, signal: &str) -> bool {
        self.data_source == data_source && self.signal == signal
    }

    /// Read any column by name. Absent fields read as `None` (null).
    pub fn get(&self, column: &str) -> Option<Value> {
        match column {
            "data_source" => Some(Value::String(self.data_source.clone())),
            "signal" => Some(Value::String(self.signal.clone())),
            "geo_type" => self.geo_type.map(|g| Value::String(g.as_str().to_string())),
            other => self.fields.get(other).filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Whether this row can describe a table at `geo_type`. A row without a
    /// geo_type describes every level.
    fn covers(&self, geo_type: GeoType) -> bool {
        self.geo_type.map_or(true, |g| g == geo_type)
    }

    /// Fill in whatever `other` knows that this row does not.
    fn absorb(&mut self, other: &MetaRow) {
        if self.geo_type.is_none() {
            self.geo_type = other.geo_type;
        }
        for (name, value) in &other.fields {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// A metadata side-table.
///
/// Tables attached to signals hold at most one row per (data_source, signal).
/// A catalog loaded from `covidcast_meta` holds one per geo_type as well;
/// [`Metadata::for_table`] picks the row that applies to a given table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub rows: Vec<MetaRow>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(row: MetaRow) -> Self {
        Self { rows: vec![row] }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, data_source: &str, signal: &str) -> Option<&MetaRow> {
        self.rows.iter().find(|r| r.is_for(data_source, signal))
    }

    /// Row for (data_source, signal), created empty if missing.
    pub fn upsert(&mut self, data_source: &str, signal: &str) -> &mut MetaRow {
        let idx = match self.rows.iter().position(|r| r.is_for(data_source, signal)) {
            Some(idx) => idx,
            None => {
                self.rows.push(MetaRow::new(data_source, signal));
                self.rows.len() - 1
            }
        };
        &mut self.rows[idx]
    }

    /// Add a row, merging it into an existing row with the same key.
    pub fn merge_row(&mut self, row: &MetaRow) {
        match self
            .rows
            .iter_mut()
            .find(|r| r.is_for(&row.data_source, &row.signal))
        {
            Some(existing) => existing.absorb(row),
            None => self.rows.push(row.clone()),
        }
    }

    /// Add a catalog row, merging only with a row of the same
    /// (data_source, signal, geo_type).
    pub fn merge_catalog_row(&mut self, row: &MetaRow) {
        match self.rows.iter_mut().find(|r| {
            r.is_for(&row.data_source, &row.signal) && r.geo_type == row.geo_type
        }) {
            Some(existing) => existing.absorb(row),
            None => self.rows.push(row.clone()),
        }
    }

    /// The catalog row describing (data_source, signal) at `geo_type`.
    ///
    /// An exact geo_type match wins over a row with no geo_type. Without a
    /// geo_type to go on, several candidate levels are ambiguous.
    pub fn for_table(
        &self,
        data_source: &str,
        signal: &str,
        geo_type: Option<GeoType>,
    ) -> Result<Option<&MetaRow>> {
        let candidates: Vec<&MetaRow> = self
            .rows
            .iter()
            .filter(|r| r.is_for(data_source, signal))
            .collect();

        match geo_type {
            Some(geo_type) => Ok(candidates
                .iter()
                .find(|r| r.geo_type == Some(geo_type))
                .or_else(|| candidates.iter().find(|r| r.covers(geo_type)))
                .copied()),
            None if candidates.len() <= 1 => Ok(candidates.first().copied()),
            None => {
                let levels: Vec<String> = candidates
                    .iter()
                    .map(|r| r.geo_type.map_or("unspecified", |g| g.as_str()).to_string())
                    .collect();
                Err(CovidcastError::Configuration(format!(
                    "{data_source}_{signal} has metadata for several geo types ({}); name one",
                    levels.join(", ")
                )))
            }
        }
    }

    /// Outer union of several metadata tables.
    ///
    /// One row per distinct (data_source, signal) in first-seen order. Rows
    /// with different field sets are kept side by side; a field one row
    /// lacks simply reads as null.
    pub fn union<'a>(parts: impl IntoIterator<Item = &'a Metadata>) -> Metadata {
        let mut merged = Metadata::new();
        for part in parts {
            for row in &part.rows {
                merged.merge_row(row);
            }
        }
        merged
    }

    /// Keep only rows for the given (data_source, signal) pairs.
    pub fn restricted_to<'a>(&self, keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Metadata {
        let keys: Vec<(&str, &str)> = keys.into_iter().collect();
        Metadata {
            rows: self
                .rows
                .iter()
                .filter(|r| keys.iter().any(|(ds, sig)| r.is_for(ds, sig)))
                .cloned()
                .collect(),
        }
    }

    /// Column names across all rows: key columns first, then every extra
    /// field in the order it first appears.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
        for row in &self.rows {
            for name in row.fields.keys() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn union_keeps_rows_with_different_fields() {
        let a = Metadata::single(MetaRow::new("foo", "foo").with_geo_type(GeoType::County));
        let b = Metadata::single(
            MetaRow::new("bar", "bar")
                .with_geo_type(GeoType::State)
                .with_field("num_locations", 51),
        );

        let merged = Metadata::union([&a, &b]);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.columns(),
            vec!["data_source", "signal", "geo_type", "num_locations"]
        );
        assert_eq!(merged.rows[0].get("num_locations"), None);
        assert_eq!(merged.rows[1].get("num_locations"), Some(json!(51)));
    }

    #[test]
    fn union_collapses_same_key_without_losing_fields() {
        let a = Metadata::single(MetaRow::new("foo", "foo").with_field("mean_value", 1.5));
        let b = Metadata::single(
            MetaRow::new("foo", "foo")
                .with_geo_type(GeoType::Msa)
                .with_field("mean_value", 9.0)
                .with_field("stdev_value", 0.5),
        );

        let merged = Metadata::union([&a, &b]);

        assert_eq!(merged.len(), 1);
        let row = &merged.rows[0];
        assert_eq!(row.geo_type, Some(GeoType::Msa));
        assert_eq!(row.get("mean_value"), Some(json!(1.5)));
        assert_eq!(row.get("stdev_value"), Some(json!(0.5)));
    }

    #[test]
    fn extra_fields_flatten_through_serde() {
        let row: MetaRow = serde_json::from_value(json!({
            "data_source": "jhu-csse",
            "signal": "confirmed_7dav_incidence_num",
            "geo_type": "county",
            "num_locations": 3142,
            "mean_value": 12.5
        }))
        .unwrap();

        assert_eq!(row.geo_type, Some(GeoType::County));
        assert_eq!(row.get("num_locations"), Some(json!(3142)));
        assert_eq!(row.get("geo_type"), Some(json!("county")));
    }

    fn catalog() -> Metadata {
        let mut meta = Metadata::new();
        for row in [
            MetaRow::new("jhu-csse", "confirmed_incidence_num")
                .with_geo_type(GeoType::County)
                .with_field("num_locations", 3142),
            MetaRow::new("jhu-csse", "confirmed_incidence_num")
                .with_geo_type(GeoType::State)
                .with_field("num_locations", 52),
            MetaRow::new("jhu-csse", "confirmed_incidence_num")
                .with_geo_type(GeoType::State)
                .with_field("max_issue", 20210301),
        ] {
            meta.merge_catalog_row(&row);
        }
        meta
    }

    #[test]
    fn catalog_rows_stay_apart_per_geo_type() {
        let meta = catalog();
        assert_eq!(meta.len(), 2);

        let state = meta
            .for_table("jhu-csse", "confirmed_incidence_num", Some(GeoType::State))
            .unwrap()
            .unwrap();
        assert_eq!(state.get("num_locations"), Some(json!(52)));
        assert_eq!(state.get("max_issue"), Some(json!(20210301)));

        let county = meta
            .for_table("jhu-csse", "confirmed_incidence_num", Some(GeoType::County))
            .unwrap()
            .unwrap();
        assert_eq!(county.get("num_locations"), Some(json!(3142)));

        assert!(meta
            .for_table("jhu-csse", "confirmed_incidence_num", Some(GeoType::Msa))
            .unwrap()
            .is_none());
    }

    #[test]
    fn catalog_lookup_without_geo_type_must_be_unambiguous() {
        assert!(matches!(
            catalog().for_table("jhu-csse", "confirmed_incidence_num", None),
            Err(CovidcastError::Configuration(_))
        ));

        let single =
            Metadata::single(MetaRow::new("fb-survey", "smoothed_cli").with_geo_type(GeoType::Hrr));
        let row = single.for_table("fb-survey", "smoothed_cli", None).unwrap().unwrap();
        assert_eq!(row.geo_type, Some(GeoType::Hrr));
    }

    #[test]
    fn unscoped_catalog_row_covers_any_geo_type() {
        let meta = Metadata::single(MetaRow::new("foo", "foo").with_field("mean_value", 1.0));
        let row = meta.for_table("foo", "foo", Some(GeoType::Dma)).unwrap().unwrap();
        assert_eq!(row.get("mean_value"), Some(json!(1.0)));
    }

    #[test]
    fn restricted_to_filters_by_key() {
        let meta = Metadata {
            rows: vec![MetaRow::new("a", "x"), MetaRow::new("b", "y")],
        };
        let only_b = meta.restricted_to([("b", "y")]);
        assert_eq!(only_b.len(), 1);
        assert!(only_b.rows[0].is_for("b", "y"));
    }
}
