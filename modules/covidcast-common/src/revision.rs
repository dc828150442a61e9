//! Issue-aware views over a signal table.
//!
//! A table fetched across several issues may hold more than one record per
//! (geo_value, time_value). These helpers collapse or filter those revisions.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{Observation, SignalTable};

/// Keep one record per (geo_value, time_value): the one with the highest issue.
///
/// Records without an issue rank below any issued record. Among equal issues
/// the later record wins. Output is ordered by (geo_value, time_value).
pub fn latest_issues(rows: &[Observation]) -> Vec<Observation> {
    let mut latest: BTreeMap<(&str, NaiveDate), &Observation> = BTreeMap::new();
    for row in rows {
        latest
            .entry((row.geo_value.as_str(), row.time_value))
            .and_modify(|kept| {
                if row.issue >= kept.issue {
                    *kept = row;
                }
            })
            .or_insert(row);
    }
    latest.into_values().cloned().collect()
}

impl SignalTable {
    /// The table reduced to its latest issue per (geo_value, time_value).
    pub fn latest(&self) -> SignalTable {
        SignalTable {
            rows: latest_issues(&self.rows),
            ..self.clone()
        }
    }

    /// The table as it was known on `as_of`: issues after that date are
    /// dropped, then the latest remaining issue is kept. Records without an
    /// issue are treated as always known.
    pub fn as_of(&self, as_of: NaiveDate) -> SignalTable {
        let known: Vec<Observation> = self
            .rows
            .iter()
            .filter(|r| r.issue.map_or(true, |issue| issue <= as_of))
            .cloned()
            .collect();
        SignalTable {
            rows: latest_issues(&known),
            ..self.clone()
        }
    }

    /// Fill `lag` from `issue - time_value` wherever it is missing.
    pub fn with_lag_backfilled(mut self) -> SignalTable {
        for row in &mut self.rows {
            if row.lag.is_none() {
                row.lag = row.issue.map(|issue| (issue - row.time_value).num_days());
            }
        }
        self
    }
}
