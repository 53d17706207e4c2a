//! Duration spec parser: `<int><unit>` → `chrono::Duration`.
//!
//! Accepted units (spec.md §6): minutes, hours, days, weeks, months (30
//! days), years (365 days). A bare pure function, no I/O — same shape as
//! the teacher's `parser::looks_like_binary_patch` helpers.

use crate::errors::{Error, TriageResult};
use chrono::Duration;

/// Parses a duration spec such as `"2h"`, `"7d"`, `"1mo"`, `"90mins"`.
///
/// Returns [`Error::Validation`] for an empty string, a non-integer
/// magnitude, or an unrecognized unit.
pub fn parse_duration_spec(spec: &str) -> TriageResult<Duration> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(Error::Validation("empty duration spec".to_string()));
    }

    let split_at = spec
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::Validation(format!("duration spec has no unit: {spec}")))?;
    let (num_part, unit_part) = spec.split_at(split_at);

    let magnitude: i64 = num_part
        .parse()
        .map_err(|_| Error::Validation(format!("invalid duration magnitude: {spec}")))?;

    let duration = match unit_part {
        "m" | "min" | "mins" => Duration::minutes(magnitude),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::hours(magnitude),
        "d" | "day" | "days" => Duration::days(magnitude),
        "w" | "wk" | "wks" | "week" | "weeks" => Duration::weeks(magnitude),
        "mo" | "month" | "months" => Duration::days(magnitude * 30),
        "y" | "yr" | "yrs" | "year" | "years" => Duration::days(magnitude * 365),
        other => {
            return Err(Error::Validation(format!(
                "unrecognized duration unit '{other}' in '{spec}'"
            )));
        }
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_and_hours() {
        assert_eq!(parse_duration_spec("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_duration_spec("2hr").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration_spec("2hrs").unwrap(), Duration::hours(2));
    }

    #[test]
    fn parses_days_weeks_months_years() {
        assert_eq!(parse_duration_spec("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_duration_spec("2w").unwrap(), Duration::weeks(2));
        assert_eq!(parse_duration_spec("1mo").unwrap(), Duration::days(30));
        assert_eq!(parse_duration_spec("1y").unwrap(), Duration::days(365));
    }

    #[test]
    fn rejects_empty_and_unknown_unit() {
        assert!(parse_duration_spec("").is_err());
        assert!(parse_duration_spec("5x").is_err());
        assert!(parse_duration_spec("d5").is_err());
    }
}
