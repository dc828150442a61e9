//! Convert between the wide and long layouts without re-aggregating.
//!
//! The wide layout has no room for `issue`, `stderr`, `sample_size` or `lag`,
//! so long → wide → long drops them. Row and column order may also differ
//! after a round trip; the set of (data_source, signal, dt, geo_value,
//! time_value, value) facts does not.

use covidcast_common::Result;
use tracing::debug;

use crate::key::SignalKey;
use crate::table::{outer_join, JoinColumn, LongRow, LongTable, WideTable};

/// Unpivot a wide table: one long row per (row, value column).
///
/// Missing cells are emitted as rows with a missing value. Fails with a
/// format error naming the first column that is not a valid signal column.
pub fn to_long(wide: &WideTable) -> Result<LongTable> {
    wide.validate()?;
    let keys = wide
        .columns
        .iter()
        .map(|column| SignalKey::parse(column, &wide.meta))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(keys.len() * wide.rows.len());
    for (idx, key) in keys.iter().enumerate() {
        rows.extend(wide.rows.iter().map(|row| LongRow {
            data_source: key.data_source.clone(),
            signal: key.signal.clone(),
            geo_value: row.geo_value.clone(),
            time_value: row.time_value,
            dt: key.dt,
            value: row.values[idx],
            issue: None,
            stderr: None,
            sample_size: None,
            lag: None,
        }));
    }

    debug!(columns = keys.len(), rows = rows.len(), "Pivoted wide to long");
    Ok(LongTable {
        rows,
        meta: wide.meta.clone(),
    })
}

/// Pivot a long table: one value column per (data_source, signal, dt), in
/// first-seen order, full outer joined on (geo_value, time_value).
pub fn to_wide(long: &LongTable) -> Result<WideTable> {
    let mut groups: Vec<(SignalKey, JoinColumn)> = Vec::new();
    for row in &long.rows {
        let key = row.key();
        let cell = (row.geo_value.clone(), row.time_value, row.value);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, column)) => column.cells.push(cell),
            None => {
                let name = key.column_name();
                groups.push((
                    key,
                    JoinColumn {
                        name,
                        cells: vec![cell],
                    },
                ))
            }
        }
    }

    let (columns, rows) = outer_join(groups.into_iter().map(|(_, column)| column).collect());
    debug!(columns = columns.len(), rows = rows.len(), "Pivoted long to wide");
    WideTable::new(columns, rows, long.meta.clone())
}
