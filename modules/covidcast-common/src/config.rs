use std::env;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::{CovidcastError, Result};
use crate::types::Layout;

/// Serialization used when writing tables out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = CovidcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(CovidcastError::Configuration(format!(
                "output format must be \"csv\" or \"json\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Defaults loaded from environment variables. Command-line flags override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub layout: Layout,
    pub output_format: OutputFormat,
    /// Shifts applied to every input when none are given explicitly.
    pub default_shifts: Vec<i64>,
}

impl Config {
    /// Load configuration from `COVIDCAST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let layout = match lookup("COVIDCAST_LAYOUT") {
            Some(v) => v.parse()?,
            None => Layout::default(),
        };
        let output_format = match lookup("COVIDCAST_OUTPUT_FORMAT") {
            Some(v) => v.parse()?,
            None => OutputFormat::default(),
        };
        let default_shifts = match lookup("COVIDCAST_SHIFTS") {
            Some(v) => parse_shift_list(&v)?,
            None => Vec::new(),
        };
        Ok(Self {
            layout,
            output_format,
            default_shifts,
        })
    }

    pub fn log_summary(&self) {
        info!(
            layout = %self.layout,
            output_format = %self.output_format,
            default_shifts = ?self.default_shifts,
            "Config loaded"
        );
    }
}

/// Parse a comma-separated shift list such as `"-1,0,2"`.
pub fn parse_shift_list(s: &str) -> Result<Vec<i64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                CovidcastError::Configuration(format!("shift {part:?} is not an integer"))
            })
        })
        .collect()
}
