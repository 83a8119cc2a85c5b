//! Date/time validation for scenario and satellite epochs.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

static ISO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[T ](\d{2}:\d{2}:\d{2})(?:\.\d{3})?Z?)?$")
        .unwrap_or_else(|_| unreachable!())
});

/// Whether `value` is an accepted epoch string.
///
/// Accepted forms are `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DDTHH:MM:SS[.sss][Z]`. The date and time must also exist on the
/// calendar, so `2025-02-30` is rejected.
#[must_use]
pub fn validate_datetime(value: &str) -> bool {
    let Some(caps) = ISO_PATTERN.captures(value.trim()) else {
        return false;
    };

    let Some(date) = caps.get(1) else {
        return false;
    };

    match caps.get(2) {
        Some(time) => NaiveDateTime::parse_from_str(
            &format!("{} {}", date.as_str(), time.as_str()),
            "%Y-%m-%d %H:%M:%S",
        )
        .is_ok(),
        None => NaiveDate::parse_from_str(date.as_str(), "%Y-%m-%d").is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_forms() {
        for value in [
            "2025-01-01",
            "2025-01-01 12:30:00",
            "2021-05-01T00:00:00",
            "2021-05-01T00:00:00Z",
            "2021-05-01T00:00:00.000Z",
        ] {
            assert!(validate_datetime(value), "expected {value} to be accepted");
        }
    }

    #[test]
    fn rejects_malformed_values() {
        for value in ["", "2025/01/01", "tomorrow", "2025-1-1", "2021-05-01T00:00"] {
            assert!(!validate_datetime(value), "expected {value} to be rejected");
        }
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(!validate_datetime("2025-02-30"));
        assert!(!validate_datetime("2025-01-01T25:00:00Z"));
    }
}
