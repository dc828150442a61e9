//! Command implementations behind the `covidcast` binary.
//!
//! Kept out of `main.rs` so they can be driven directly from tests.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use covidcast_common::config::parse_shift_list;
use covidcast_common::load::{metadata_from_json, table_from_json};
use covidcast_common::{Config, CovidcastError, GeoType, Layout, Metadata, OutputFormat, SignalTable};
use covidcast_signals::write::{write_json, write_long_csv, write_wide_csv};
use covidcast_signals::{aggregate_signals, to_long, to_wide, Aggregate, LongTable, Shifts, WideTable};

/// An input file, optionally with the identity of the signal it holds:
/// `path`, `path=source:signal` or `path=source:signal:geo_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub path: PathBuf,
    pub data_source: Option<String>,
    pub signal: Option<String>,
    pub geo_type: Option<GeoType>,
}

impl FromStr for InputSpec {
    type Err = CovidcastError;

    fn from_str(s: &str) -> covidcast_common::Result<Self> {
        let Some((path, identity)) = s.rsplit_once('=') else {
            return Ok(Self {
                path: PathBuf::from(s),
                data_source: None,
                signal: None,
                geo_type: None,
            });
        };

        let parts: Vec<&str> = identity.split(':').collect();
        let (data_source, signal, geo_type) = match parts.as_slice() {
            [source, signal] => (*source, *signal, None),
            [source, signal, geo_type] => (*source, *signal, Some(geo_type.parse()?)),
            _ => {
                return Err(CovidcastError::Configuration(format!(
                    "input {s:?}: expected path=source:signal[:geo_type]"
                )))
            }
        };
        if data_source.is_empty() || signal.is_empty() {
            return Err(CovidcastError::Configuration(format!(
                "input {s:?}: source and signal must be non-empty"
            )));
        }

        Ok(Self {
            path: PathBuf::from(path),
            data_source: Some(data_source.to_string()),
            signal: Some(signal.to_string()),
            geo_type,
        })
    }
}

/// Options for `covidcast aggregate`, already merged with [`Config`].
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub inputs: Vec<InputSpec>,
    pub meta: Option<PathBuf>,
    pub shifts: Shifts,
    pub as_of: Option<NaiveDate>,
    pub layout: Layout,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

impl AggregateOptions {
    /// Merge command-line values over configured defaults.
    ///
    /// One `--shift` list applies to every input; several are matched to
    /// inputs one by one.
    pub fn resolve(
        config: &Config,
        inputs: Vec<InputSpec>,
        meta: Option<PathBuf>,
        shift_args: &[String],
        as_of: Option<NaiveDate>,
        layout: Option<Layout>,
        format: Option<OutputFormat>,
        output: Option<PathBuf>,
    ) -> covidcast_common::Result<Self> {
        let mut lists = shift_args
            .iter()
            .map(|s| parse_shift_list(s))
            .collect::<covidcast_common::Result<Vec<_>>>()?;

        let shifts = match lists.len() {
            0 if config.default_shifts.is_empty() => Shifts::None,
            0 => Shifts::Uniform(config.default_shifts.clone()),
            1 => Shifts::Uniform(lists.remove(0)),
            _ => Shifts::PerSignal(lists),
        };

        Ok(Self {
            inputs,
            meta,
            shifts,
            as_of,
            layout: layout.unwrap_or(config.layout),
            format: format.unwrap_or(config.output_format),
            output,
        })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_input(spec: &InputSpec, shared_meta: Option<&Metadata>, as_of: Option<NaiveDate>) -> Result<SignalTable> {
    let body = read(&spec.path)?;
    let mut table = table_from_json(
        &body,
        spec.data_source.as_deref(),
        spec.signal.as_deref(),
        spec.geo_type,
    )
    .with_context(|| format!("loading {}", spec.path.display()))?;

    if let Some(catalog) = shared_meta {
        let row = catalog
            .for_table(&table.data_source, &table.signal, table.geo_type())
            .with_context(|| format!("loading {}", spec.path.display()))?;
        if let Some(row) = row {
            table.meta.merge_row(row);
        }
    }
    if let Some(as_of) = as_of {
        table = table.as_of(as_of);
    }

    info!(
        path = %spec.path.display(),
        data_source = table.data_source.as_str(),
        signal = table.signal.as_str(),
        rows = table.rows.len(),
        "Loaded input"
    );
    Ok(table)
}

fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    let out: Box<dyn Write> = match output {
        Some(path) => Box::new(
            fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    Ok(out)
}

fn write_wide(table: &WideTable, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let out = open_output(output)?;
    match format {
        OutputFormat::Csv => write_wide_csv(table, out)?,
        OutputFormat::Json => write_json(table, out)?,
    }
    Ok(())
}

fn write_long(table: &LongTable, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let out = open_output(output)?;
    match format {
        OutputFormat::Csv => write_long_csv(table, out)?,
        OutputFormat::Json => write_json(table, out)?,
    }
    Ok(())
}

/// Load every input, aggregate, and write the result.
pub fn run_aggregate(options: &AggregateOptions) -> Result<Aggregate> {
    anyhow::ensure!(!options.inputs.is_empty(), "at least one --input is required");

    let shared_meta = match &options.meta {
        Some(path) => Some(
            metadata_from_json(&read(path)?)
                .with_context(|| format!("loading metadata {}", path.display()))?,
        ),
        None => None,
    };

    let tables = options
        .inputs
        .iter()
        .map(|spec| load_input(spec, shared_meta.as_ref(), options.as_of))
        .collect::<Result<Vec<_>>>()?;

    let result = aggregate_signals(&tables, &options.shifts, options.layout)?;

    let output = options.output.as_deref();
    match &result {
        Aggregate::Wide(table) => write_wide(table, options.format, output)?,
        Aggregate::Long(table) => write_long(table, options.format, output)?,
    }
    Ok(result)
}

/// Convert a table written by `aggregate --format json` into the other layout.
pub fn run_pivot(
    input: &Path,
    to: Layout,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<Aggregate> {
    let body = read(input)?;
    let result = match to {
        Layout::Long => {
            let wide: WideTable = serde_json::from_str(&body)
                .with_context(|| format!("{} is not a wide table", input.display()))?;
            let long = to_long(&wide)?;
            write_long(&long, format, output)?;
            Aggregate::Long(long)
        }
        Layout::Wide => {
            let long: LongTable = serde_json::from_str(&body)
                .with_context(|| format!("{} is not a long table", input.display()))?;
            let wide = to_wide(&long)?;
            write_wide(&wide, format, output)?;
            Aggregate::Wide(wide)
        }
    };
    info!(input = %input.display(), to = %to, "Pivot complete");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_spec_forms() {
        let bare: InputSpec = "data/cases.json".parse().unwrap();
        assert_eq!(bare.path, PathBuf::from("data/cases.json"));
        assert!(bare.data_source.is_none());

        let full: InputSpec = "cases.json=jhu-csse:confirmed_incidence_num:county"
            .parse()
            .unwrap();
        assert_eq!(full.data_source.as_deref(), Some("jhu-csse"));
        assert_eq!(full.signal.as_deref(), Some("confirmed_incidence_num"));
        assert_eq!(full.geo_type, Some(GeoType::County));

        assert!("cases.json=jhu-csse".parse::<InputSpec>().is_err());
        assert!("cases.json=a:b:planet".parse::<InputSpec>().is_err());
    }

    #[test]
    fn shift_flags_resolve_to_shapes() {
        let config = Config::default();
        let resolve = |args: &[&str]| {
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            AggregateOptions::resolve(&config, vec![], None, &args, None, None, None, None)
                .unwrap()
                .shifts
        };

        assert_eq!(resolve(&[]), Shifts::None);
        assert_eq!(resolve(&["-1,0"]), Shifts::Uniform(vec![-1, 0]));
        assert_eq!(
            resolve(&["0", "-2,2"]),
            Shifts::PerSignal(vec![vec![0], vec![-2, 2]])
        );
    }

    #[test]
    fn configured_shifts_are_the_fallback() {
        let config = Config {
            default_shifts: vec![-7],
            ..Config::default()
        };
        let options =
            AggregateOptions::resolve(&config, vec![], None, &[], None, None, None, None).unwrap();
        assert_eq!(options.shifts, Shifts::Uniform(vec![-7]));
        assert_eq!(options.layout, Layout::Wide);
    }
}
