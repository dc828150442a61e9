//! The (data_source, signal, dt) identity of a combined signal and its
//! column-name encoding.
//!
//! Wide tables name each value column `value<sign><|dt|>:<data_source>_<signal>`,
//! e.g. `value-1:foo_foo` or `value+2:usa-facts_confirmed_incidence_num`.
//! Downstream tooling keys on these names, so the format is exact.

use std::fmt;

use covidcast_common::{CovidcastError, Metadata, Result};
use serde::{Deserialize, Serialize};

const PREFIX: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
    pub data_source: String,
    pub signal: String,
    pub dt: i64,
}

impl SignalKey {
    pub fn new(data_source: impl Into<String>, signal: impl Into<String>, dt: i64) -> Self {
        Self {
            data_source: data_source.into(),
            signal: signal.into(),
            dt,
        }
    }

    pub fn column_name(&self) -> String {
        self.to_string()
    }

    /// Parse a wide column name back into its key.
    ///
    /// `<data_source>_<signal>` is ambiguous when either half contains `_`.
    /// A metadata row whose pair spells the suffix exactly wins; otherwise the
    /// split happens at the first `_`, since API source names never contain one.
    pub fn parse(column: &str, meta: &Metadata) -> Result<SignalKey> {
        let malformed = |reason: &str| CovidcastError::Format {
            column: column.to_string(),
            reason: reason.to_string(),
        };

        let rest = column
            .strip_prefix(PREFIX)
            .ok_or_else(|| malformed("expected a \"value\" prefix"))?;
        let (negative, rest) = match rest.as_bytes().first() {
            Some(b'+') => (false, &rest[1..]),
            Some(b'-') => (true, &rest[1..]),
            _ => return Err(malformed("expected '+' or '-' after \"value\"")),
        };
        let (digits, name) = rest
            .split_once(':')
            .ok_or_else(|| malformed("expected ':' after the shift"))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("shift must be a non-negative integer"));
        }
        let magnitude: u64 = digits
            .parse()
            .map_err(|_| malformed("shift is out of range"))?;
        let dt = if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        }
        .ok_or_else(|| malformed("shift is out of range"))?;

        if let Some(row) = meta
            .rows
            .iter()
            .find(|r| name == format!("{}_{}", r.data_source, r.signal))
        {
            return Ok(SignalKey::new(row.data_source.clone(), row.signal.clone(), dt));
        }

        match name.split_once('_') {
            Some((source, signal)) if !source.is_empty() && !signal.is_empty() => {
                Ok(SignalKey::new(source, signal, dt))
            }
            _ => Err(malformed("expected <data_source>_<signal> after ':'")),
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.dt >= 0 { '+' } else { '-' };
        write!(
            f,
            "{PREFIX}{sign}{}:{}_{}",
            self.dt.unsigned_abs(),
            self.data_source,
            self.signal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covidcast_common::MetaRow;

    #[test]
    fn names_follow_the_column_grammar() {
        assert_eq!(SignalKey::new("foo", "foo", -1).column_name(), "value-1:foo_foo");
        assert_eq!(SignalKey::new("foo", "foo", 0).column_name(), "value+0:foo_foo");
        assert_eq!(
            SignalKey::new("usa-facts", "confirmed_incidence_num", 2).column_name(),
            "value+2:usa-facts_confirmed_incidence_num"
        );
    }

    #[test]
    fn parse_inverts_column_name() {
        let key = SignalKey::new("jhu-csse", "confirmed_7dav_incidence_num", -14);
        let parsed = SignalKey::parse(&key.column_name(), &Metadata::new()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn extreme_shifts_survive_the_name() {
        for dt in [i64::MIN, i64::MAX] {
            let key = SignalKey::new("foo", "foo", dt);
            assert_eq!(SignalKey::parse(&key.column_name(), &Metadata::new()).unwrap(), key);
        }
    }

    #[test]
    fn metadata_resolves_underscored_sources() {
        let meta = Metadata::single(MetaRow::new("my_source", "cases"));
        let parsed = SignalKey::parse("value+1:my_source_cases", &meta).unwrap();
        assert_eq!(parsed, SignalKey::new("my_source", "cases", 1));

        let guessed = SignalKey::parse("value+1:my_source_cases", &Metadata::new()).unwrap();
        assert_eq!(guessed, SignalKey::new("my", "source_cases", 1));
    }

    #[test]
    fn malformed_names_report_the_column() {
        for bad in [
            "geo_value",
            "value",
            "value1:foo_foo",
            "value+:foo_foo",
            "value+x:foo_foo",
            "value+1foo_foo",
            "value+1:foofoo",
            "value+1:_foo",
            "value+99999999999999999999:foo_foo",
            "value+9223372036854775808:foo_foo",
            "value-9223372036854775809:foo_foo",
        ] {
            match SignalKey::parse(bad, &Metadata::new()) {
                Err(CovidcastError::Format { column, .. }) => assert_eq!(column, bad),
                other => panic!("{bad:?} should be a format error, got {other:?}"),
            }
        }
    }
}
