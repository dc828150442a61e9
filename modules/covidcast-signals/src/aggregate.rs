//! Combine several signals, each under one or more time shifts, into a single
//! wide or long table.

use covidcast_common::{
    latest_issues, CovidcastError, Layout, Metadata, Observation, Result, SignalTable,
};
use tracing::{debug, info};

use crate::key::SignalKey;
use crate::shift::shift_values;
use crate::table::{outer_join, JoinColumn, LongRow, LongTable, WideTable};

/// One input to [`aggregate`]: a table and the shifts to apply to it.
/// An empty shift list means "unshifted", i.e. `[0]`.
#[derive(Debug, Clone)]
pub struct SignalShifts<'a> {
    pub table: &'a SignalTable,
    pub shifts: Vec<i64>,
}

impl<'a> SignalShifts<'a> {
    pub fn new(table: &'a SignalTable, shifts: Vec<i64>) -> Self {
        Self { table, shifts }
    }

    pub fn unshifted(table: &'a SignalTable) -> Self {
        Self::new(table, vec![0])
    }

    fn effective_shifts(&self) -> &[i64] {
        if self.shifts.is_empty() {
            &[0]
        } else {
            &self.shifts
        }
    }
}

/// How shifts are specified for a list of signals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Shifts {
    /// Every signal unshifted.
    #[default]
    None,
    /// The same shifts for every signal.
    Uniform(Vec<i64>),
    /// One shift list per signal, in signal order.
    PerSignal(Vec<Vec<i64>>),
}

impl Shifts {
    /// Pair each table with its shifts.
    pub fn pair<'a>(&self, signals: &'a [SignalTable]) -> Result<Vec<SignalShifts<'a>>> {
        match self {
            Shifts::None => Ok(signals.iter().map(SignalShifts::unshifted).collect()),
            Shifts::Uniform(shifts) => Ok(signals
                .iter()
                .map(|t| SignalShifts::new(t, shifts.clone()))
                .collect()),
            Shifts::PerSignal(per_signal) => {
                if per_signal.len() != signals.len() {
                    return Err(CovidcastError::Configuration(format!(
                        "got {} shift lists for {} signals",
                        per_signal.len(),
                        signals.len()
                    )));
                }
                Ok(signals
                    .iter()
                    .zip(per_signal)
                    .map(|(t, shifts)| SignalShifts::new(t, shifts.clone()))
                    .collect())
            }
        }
    }
}

/// Result of an aggregation, in the layout that was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Wide(WideTable),
    Long(LongTable),
}

impl Aggregate {
    pub fn layout(&self) -> Layout {
        match self {
            Aggregate::Wide(_) => Layout::Wide,
            Aggregate::Long(_) => Layout::Long,
        }
    }

    pub fn meta(&self) -> &Metadata {
        match self {
            Aggregate::Wide(table) => &table.meta,
            Aggregate::Long(table) => &table.meta,
        }
    }

    pub fn into_wide(self) -> Option<WideTable> {
        match self {
            Aggregate::Wide(table) => Some(table),
            Aggregate::Long(_) => None,
        }
    }

    pub fn into_long(self) -> Option<LongTable> {
        match self {
            Aggregate::Long(table) => Some(table),
            Aggregate::Wide(_) => None,
        }
    }
}

/// Rows of one input that share a (data_source, signal), reduced to the
/// latest issue per (geo_value, time_value).
struct Series {
    data_source: String,
    signal: String,
    rows: Vec<Observation>,
}

/// Split a table by row identity. Explicit `data_source`/`signal` cells win
/// over the table's own identity. An empty table still yields one (empty)
/// series so it keeps its column and metadata row.
fn split_series(table: &SignalTable) -> Vec<Series> {
    let mut groups: Vec<(String, String, Vec<Observation>)> = Vec::new();
    for row in &table.rows {
        let (source, signal) = (table.source_of(row), table.signal_of(row));
        match groups
            .iter_mut()
            .find(|(ds, sig, _)| ds == source && sig == signal)
        {
            Some((_, _, rows)) => rows.push(row.clone()),
            None => groups.push((source.to_string(), signal.to_string(), vec![row.clone()])),
        }
    }
    if groups.is_empty() {
        groups.push((table.data_source.clone(), table.signal.clone(), Vec::new()));
    }

    groups
        .into_iter()
        .map(|(data_source, signal, rows)| Series {
            data_source,
            signal,
            rows: latest_issues(&rows),
        })
        .collect()
}

/// Metadata for the result: the union of every input's metadata, limited to
/// the (data_source, signal) pairs that actually contributed.
fn combined_meta(inputs: &[SignalShifts<'_>], contributed: &[(String, String)]) -> Metadata {
    let union = Metadata::union(inputs.iter().map(|input| &input.table.meta));
    let mut meta = union.restricted_to(contributed.iter().map(|(ds, sig)| (ds.as_str(), sig.as_str())));
    for (ds, sig) in contributed {
        meta.upsert(ds, sig);
    }
    // Keep first-contribution order rather than the union's.
    meta.rows.sort_by_key(|row| {
        contributed
            .iter()
            .position(|(ds, sig)| row.is_for(ds, sig))
            .unwrap_or(usize::MAX)
    });
    meta
}

/// Combine signals under their shifts into one table.
///
/// Every input is first reduced to its latest issue per (geo_value,
/// time_value). Each (signal, shift) then becomes one value column (wide,
/// full outer join on geo_value/time_value) or one block of rows (long, in
/// signal-then-shift order, tagged with `dt`). Repeating a (data_source,
/// signal, dt) is allowed and yields repeated columns or rows.
pub fn aggregate(inputs: &[SignalShifts<'_>], layout: Layout) -> Result<Aggregate> {
    for input in inputs {
        input.table.validate()?;
    }

    let mut contributed: Vec<(String, String)> = Vec::new();
    let mut join_columns: Vec<JoinColumn> = Vec::new();
    let mut long_rows: Vec<LongRow> = Vec::new();

    for input in inputs {
        for series in split_series(input.table) {
            if !contributed
                .iter()
                .any(|(ds, sig)| *ds == series.data_source && *sig == series.signal)
            {
                contributed.push((series.data_source.clone(), series.signal.clone()));
            }

            for &dt in input.effective_shifts() {
                let key = SignalKey::new(series.data_source.clone(), series.signal.clone(), dt);
                let shifted = shift_values(&series.rows, dt);
                debug!(column = %key, rows = series.rows.len(), "Shifted signal");

                match layout {
                    Layout::Wide => join_columns.push(JoinColumn {
                        name: key.column_name(),
                        cells: series
                            .rows
                            .iter()
                            .zip(shifted)
                            .map(|(row, value)| (row.geo_value.clone(), row.time_value, value))
                            .collect(),
                    }),
                    Layout::Long => {
                        long_rows.extend(series.rows.iter().zip(shifted).map(|(row, value)| {
                            LongRow {
                                data_source: key.data_source.clone(),
                                signal: key.signal.clone(),
                                geo_value: row.geo_value.clone(),
                                time_value: row.time_value,
                                dt,
                                value,
                                issue: row.issue,
                                stderr: row.stderr,
                                sample_size: row.sample_size,
                                lag: row.lag,
                            }
                        }))
                    }
                }
            }
        }
    }

    let meta = combined_meta(inputs, &contributed);

    let result = match layout {
        Layout::Wide => {
            let (columns, rows) = outer_join(join_columns);
            Aggregate::Wide(WideTable::new(columns, rows, meta)?)
        }
        Layout::Long => Aggregate::Long(LongTable {
            rows: long_rows,
            meta,
        }),
    };

    match &result {
        Aggregate::Wide(table) => info!(
            layout = "wide",
            inputs = inputs.len(),
            rows = table.rows.len(),
            columns = table.columns.len(),
            "Aggregated signals"
        ),
        Aggregate::Long(table) => info!(
            layout = "long",
            inputs = inputs.len(),
            rows = table.rows.len(),
            "Aggregated signals"
        ),
    }

    Ok(result)
}

/// [`aggregate`] over a list of tables with their [`Shifts`].
pub fn aggregate_signals(
    signals: &[SignalTable],
    shifts: &Shifts,
    layout: Layout,
) -> Result<Aggregate> {
    aggregate(&shifts.pair(signals)?, layout)
}

/// [`aggregate`] for a single table.
pub fn aggregate_signal(signal: &SignalTable, shifts: &[i64], layout: Layout) -> Result<Aggregate> {
    aggregate(&[SignalShifts::new(signal, shifts.to_vec())], layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 8, d).unwrap()
    }

    fn table(source: &str, signal: &str, rows: Vec<Observation>) -> SignalTable {
        SignalTable::new(source, signal, rows)
    }

    #[test]
    fn per_signal_shift_count_must_match() {
        let signals = vec![table("foo", "foo", vec![]), table("bar", "bar", vec![])];
        let shifts = Shifts::PerSignal(vec![vec![0]]);

        let err = aggregate_signals(&signals, &shifts, Layout::Wide).unwrap_err();

        assert!(matches!(err, CovidcastError::Configuration(_)));
    }

    #[test]
    fn empty_shift_list_means_unshifted() {
        let t = table("foo", "foo", vec![Observation::new("pa", day(1), Some(1.0))]);
        let wide = aggregate_signal(&t, &[], Layout::Wide).unwrap().into_wide().unwrap();
        assert_eq!(wide.columns, vec!["value+0:foo_foo"]);
    }

    #[test]
    fn explicit_row_identity_splits_a_table() {
        let t = table(
            "foo",
            "foo",
            vec![
                Observation::new("pa", day(1), Some(1.0)),
                Observation::new("pa", day(1), Some(9.0)).with_identity("bar", "baz"),
            ],
        );

        let wide = aggregate_signal(&t, &[0], Layout::Wide).unwrap().into_wide().unwrap();

        assert_eq!(wide.columns, vec!["value+0:foo_foo", "value+0:bar_baz"]);
        assert_eq!(wide.rows[0].values, vec![Some(1.0), Some(9.0)]);
        assert_eq!(wide.meta.len(), 2);
    }

    #[test]
    fn empty_table_keeps_its_column_and_metadata() {
        let t = table("foo", "foo", vec![]);
        let wide = aggregate_signal(&t, &[0, 1], Layout::Wide).unwrap().into_wide().unwrap();
        assert_eq!(wide.columns, vec!["value+0:foo_foo", "value+1:foo_foo"]);
        assert!(wide.is_empty());
        assert!(wide.meta.find("foo", "foo").is_some());
    }

    #[test]
    fn invalid_table_is_a_schema_error() {
        let t = table("foo", "foo", vec![Observation::new("", day(1), Some(1.0))]);
        let err = aggregate_signal(&t, &[0], Layout::Long).unwrap_err();
        assert!(matches!(err, CovidcastError::Schema(_)));
    }
}
