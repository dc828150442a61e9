use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CovidcastError, Result};
use crate::metadata::{MetaRow, Metadata};

/// Geographic granularity of a signal's `geo_value`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoType {
    County,
    State,
    Hrr,
    Msa,
    Nation,
    Hhs,
    Dma,
}

impl GeoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoType::County => "county",
            GeoType::State => "state",
            GeoType::Hrr => "hrr",
            GeoType::Msa => "msa",
            GeoType::Nation => "nation",
            GeoType::Hhs => "hhs",
            GeoType::Dma => "dma",
        }
    }

    /// Restore leading zeros lost when a code was stored as a number.
    ///
    /// County FIPS and MSA CBSA codes are five digits; other levels are
    /// returned as given.
    pub fn canonical_geo_value(&self, geo_value: &str) -> String {
        let width: usize = match self {
            GeoType::County | GeoType::Msa => 5,
            _ => return geo_value.to_string(),
        };
        if geo_value.bytes().all(|b| b.is_ascii_digit()) && !geo_value.is_empty() {
            format!("{geo_value:0>width$}")
        } else {
            geo_value.to_string()
        }
    }
}

impl fmt::Display for GeoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoType {
    type Err = CovidcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "county" => Ok(GeoType::County),
            "state" => Ok(GeoType::State),
            "hrr" => Ok(GeoType::Hrr),
            "msa" => Ok(GeoType::Msa),
            "nation" => Ok(GeoType::Nation),
            "hhs" => Ok(GeoType::Hhs),
            "dma" => Ok(GeoType::Dma),
            other => Err(CovidcastError::Configuration(format!(
                "unknown geo_type {other:?}"
            ))),
        }
    }
}

/// Output layout for combined signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One row per (geo_value, time_value), one column per (signal, shift).
    #[default]
    Wide,
    /// One row per (signal, shift, geo_value, time_value).
    Long,
}

impl FromStr for Layout {
    type Err = CovidcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wide" => Ok(Layout::Wide),
            "long" => Ok(Layout::Long),
            other => Err(CovidcastError::Configuration(format!(
                "layout must be \"wide\" or \"long\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Wide => f.write_str("wide"),
            Layout::Long => f.write_str("long"),
        }
    }
}

/// A single observation of a signal at one location on one day.
///
/// `data_source` and `signal` are optional per row: tables fetched for one
/// signal usually omit them and rely on the owning [`SignalTable`]'s identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    pub geo_value: String,
    pub time_value: NaiveDate,
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

impl Observation {
    pub fn new(geo_value: impl Into<String>, time_value: NaiveDate, value: Option<f64>) -> Self {
        Self {
            data_source: None,
            signal: None,
            geo_value: geo_value.into(),
            time_value,
            value,
            issue: None,
            stderr: None,
            sample_size: None,
            lag: None,
        }
    }

    pub fn with_identity(mut self, data_source: impl Into<String>, signal: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self.signal = Some(signal.into());
        self
    }

    pub fn with_issue(mut self, issue: NaiveDate) -> Self {
        self.issue = Some(issue);
        self
    }

    pub fn with_stderr(mut self, stderr: f64) -> Self {
        self.stderr = Some(stderr);
        self
    }

    pub fn with_sample_size(mut self, sample_size: f64) -> Self {
        self.sample_size = Some(sample_size);
        self
    }

    pub fn with_lag(mut self, lag: i64) -> Self {
        self.lag = Some(lag);
        self
    }
}

/// A signal's observations paired with the metadata that describes them.
///
/// `data_source` and `signal` are the table's identity. Rows that carry their
/// own explicit `data_source`/`signal` take precedence over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTable {
    pub data_source: String,
    pub signal: String,
    pub rows: Vec<Observation>,
    pub meta: Metadata,
}

impl SignalTable {
    pub fn new(
        data_source: impl Into<String>,
        signal: impl Into<String>,
        rows: Vec<Observation>,
    ) -> Self {
        let data_source = data_source.into();
        let signal = signal.into();
        let meta = Metadata::single(MetaRow::new(data_source.clone(), signal.clone()));
        Self {
            data_source,
            signal,
            rows,
            meta,
        }
    }

    /// Set the `geo_type` recorded for this table's own (data_source, signal).
    pub fn with_geo_type(mut self, geo_type: GeoType) -> Self {
        let (source, signal) = (self.data_source.clone(), self.signal.clone());
        self.meta.upsert(&source, &signal).geo_type = Some(geo_type);
        self
    }

    /// Replace the attached metadata wholesale.
    pub fn with_meta(mut self, meta: Metadata) -> Self {
        self.meta = meta;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn geo_type(&self) -> Option<GeoType> {
        self.meta
            .find(&self.data_source, &self.signal)
            .and_then(|row| row.geo_type)
    }

    /// Source of a row: the explicit column when present, else the table's.
    pub fn source_of<'a>(&'a self, row: &'a Observation) -> &'a str {
        row.data_source.as_deref().unwrap_or(&self.data_source)
    }

    /// Signal of a row: the explicit column when present, else the table's.
    pub fn signal_of<'a>(&'a self, row: &'a Observation) -> &'a str {
        row.signal.as_deref().unwrap_or(&self.signal)
    }

    /// Check the table can be keyed on (geo_value, time_value).
    pub fn validate(&self) -> Result<()> {
        if self.data_source.is_empty() || self.signal.is_empty() {
            return Err(CovidcastError::Schema(
                "signal table needs a non-empty data_source and signal".to_string(),
            ));
        }
        if let Some(row) = self.rows.iter().find(|r| r.geo_value.is_empty()) {
            return Err(CovidcastError::Schema(format!(
                "{}_{}: empty geo_value at time_value {}",
                self.data_source, self.signal, row.time_value
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, d).unwrap()
    }

    #[test]
    fn explicit_identity_wins_over_table_identity() {
        let table = SignalTable::new(
            "jhu-csse",
            "confirmed_incidence_num",
            vec![
                Observation::new("06001", day(1), Some(1.0)),
                Observation::new("06001", day(2), Some(2.0)).with_identity("usa-facts", "deaths"),
            ],
        );

        assert_eq!(table.source_of(&table.rows[0]), "jhu-csse");
        assert_eq!(table.signal_of(&table.rows[0]), "confirmed_incidence_num");
        assert_eq!(table.source_of(&table.rows[1]), "usa-facts");
        assert_eq!(table.signal_of(&table.rows[1]), "deaths");
    }

    #[test]
    fn geo_type_lands_in_metadata() {
        let table = SignalTable::new("fb-survey", "smoothed_cli", vec![]).with_geo_type(GeoType::State);
        assert_eq!(table.geo_type(), Some(GeoType::State));
        assert_eq!(table.meta.len(), 1);
    }

    #[test]
    fn empty_geo_value_fails_validation() {
        let table = SignalTable::new("foo", "foo", vec![Observation::new("", day(1), Some(1.0))]);
        assert!(matches!(table.validate(), Err(CovidcastError::Schema(_))));
    }

    #[test]
    fn county_codes_regain_leading_zeros() {
        assert_eq!(GeoType::County.canonical_geo_value("6001"), "06001");
        assert_eq!(GeoType::County.canonical_geo_value("42003"), "42003");
        assert_eq!(GeoType::Msa.canonical_geo_value("1010"), "01010");
        assert_eq!(GeoType::Hrr.canonical_geo_value("7"), "7");
        assert_eq!(GeoType::State.canonical_geo_value("pa"), "pa");
    }

    #[test]
    fn geo_type_and_layout_parse_case_insensitively() {
        assert_eq!("County".parse::<GeoType>().unwrap(), GeoType::County);
        assert_eq!("LONG".parse::<Layout>().unwrap(), Layout::Long);
        assert!("tall".parse::<Layout>().is_err());
        assert_eq!(Layout::default(), Layout::Wide);
    }
}
