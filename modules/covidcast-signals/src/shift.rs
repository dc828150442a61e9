//! Per-location time shifting.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use covidcast_common::Observation;

/// Date `dt` days after `date`, if representable.
fn offset(date: NaiveDate, dt: i64) -> Option<NaiveDate> {
    let days = Days::new(dt.unsigned_abs());
    if dt >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    }
}

/// Shift each location's series by `dt` days.
///
/// The value emitted for a row dated T is that location's value dated
/// T + dt: a negative `dt` lags the series (earlier values show up later),
/// a positive one leads it. Where no value exists at T + dt the result is
/// `None`; the row itself is kept. Lookups never cross `geo_value`s.
///
/// `rows` must hold at most one record per (geo_value, time_value). The
/// result is aligned with `rows`.
pub fn shift_values(rows: &[Observation], dt: i64) -> Vec<Option<f64>> {
    if dt == 0 {
        return rows.iter().map(|r| r.value).collect();
    }

    let by_key: HashMap<(&str, NaiveDate), Option<f64>> = rows
        .iter()
        .map(|r| ((r.geo_value.as_str(), r.time_value), r.value))
        .collect();

    rows.iter()
        .map(|r| {
            offset(r.time_value, dt)
                .and_then(|source| by_key.get(&(r.geo_value.as_str(), source)).copied())
                .flatten()
        })
        .collect()
}
