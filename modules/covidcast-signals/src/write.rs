//! CSV and JSON output for aggregated tables.
//!
//! CSV leaves missing cells empty and writes dates as `YYYY-MM-DD`. JSON is
//! the serde form of the table, metadata included, and can be read back for
//! pivoting.

use std::io::Write;

use chrono::NaiveDate;
use covidcast_common::Result;
use serde::Serialize;

use crate::table::{LongTable, WideTable, LONG_COLUMNS, WIDE_KEY_COLUMNS};

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub fn write_wide_csv<W: Write>(table: &WideTable, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let header = WIDE_KEY_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(table.columns.iter().cloned());
    out.write_record(header)?;

    for row in &table.rows {
        let record = [row.geo_value.clone(), date(row.time_value)]
            .into_iter()
            .chain(row.values.iter().map(|v| cell(*v)));
        out.write_record(record)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_long_csv<W: Write>(table: &LongTable, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(LONG_COLUMNS)?;

    for row in &table.rows {
        out.write_record([
            row.data_source.clone(),
            row.signal.clone(),
            row.geo_value.clone(),
            date(row.time_value),
            row.dt.to_string(),
            cell(row.value),
            cell(row.issue.map(date)),
            cell(row.stderr),
            cell(row.sample_size),
            cell(row.lag),
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize, W: Write>(table: &T, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use covidcast_common::{CovidcastError, Metadata};

    use crate::table::{LongRow, WideRow};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 10, d).unwrap()
    }

    #[test]
    fn wide_csv_leaves_missing_cells_empty() {
        let table = WideTable::new(
            vec!["value+0:foo_foo".into(), "value-1:foo_foo".into()],
            vec![WideRow {
                geo_value: "42003".into(),
                time_value: day(5),
                values: vec![Some(2.5), None],
            }],
            Metadata::new(),
        )
        .unwrap();

        let mut buf = Vec::new();
        write_wide_csv(&table, &mut buf).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "geo_value,time_value,value+0:foo_foo,value-1:foo_foo\n42003,2020-10-05,2.5,\n"
        );
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failures_surface_as_io_errors() {
        let table = WideTable::new(vec!["value+0:foo_foo".into()], vec![], Metadata::new()).unwrap();
        match write_wide_csv(&table, FullDisk) {
            Err(CovidcastError::Io(message)) => assert!(message.contains("disk full")),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn long_csv_has_fixed_header() {
        let table = LongTable {
            rows: vec![LongRow {
                data_source: "foo".into(),
                signal: "bar".into(),
                geo_value: "pa".into(),
                time_value: day(1),
                dt: -2,
                value: Some(1.0),
                issue: Some(day(3)),
                stderr: None,
                sample_size: None,
                lag: Some(2),
            }],
            meta: Metadata::new(),
        };

        let mut buf = Vec::new();
        write_long_csv(&table, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("data_source,signal,geo_value,time_value,dt,value,issue,stderr,sample_size,lag")
        );
        assert_eq!(lines.next(), Some("foo,bar,pa,2020-10-01,-2,1,2020-10-03,,,2"));
    }
}
