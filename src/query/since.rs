//! `Nh|Nd|Nw|Nm` duration parsing for `--since`, per §4.6.

use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{FirewatchError, Result};

/// Parse `since` syntax relative to `now`, anchoring months via calendar
/// subtraction (so `1m` from March 31 lands on the correct day count for
/// February) while using a flat 30-day month for threshold comparisons
/// elsewhere (e.g. the staleness threshold in aggregation).
pub fn parse_since(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let (n, unit) = split_amount(input)?;

    match unit {
        'h' => Ok(now - Duration::hours(n as i64)),
        'd' => Ok(now - Duration::days(n as i64)),
        'w' => Ok(now - Duration::weeks(n as i64)),
        'm' => now
            .checked_sub_months(Months::new(n))
            .ok_or_else(|| FirewatchError::Validation(format!("since value out of range: {input}"))),
        _ => unreachable!("split_amount only returns validated units"),
    }
}

fn split_amount(input: &str) -> Result<(u32, char)> {
    let invalid = || FirewatchError::Validation(format!("invalid since value: {input:?} (expected Nh|Nd|Nw|Nm)"));

    let unit = input.chars().last().ok_or_else(invalid)?;
    if !matches!(unit, 'h' | 'd' | 'w' | 'm') {
        return Err(invalid());
    }
    let digits = &input[..input.len() - unit.len_utf8()];
    if digits.is_empty() {
        return Err(invalid());
    }
    let n: u32 = digits.parse().map_err(|_| invalid())?;
    if n == 0 {
        return Err(invalid());
    }
    Ok((n, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> DateTime<Utc> {
        "2026-07-27T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn parses_hours() {
        let result = parse_since("2h", anchor()).unwrap();
        assert_eq!(result, anchor() - Duration::hours(2));
    }

    #[test]
    fn parses_days() {
        let result = parse_since("3d", anchor()).unwrap();
        assert_eq!(result, anchor() - Duration::days(3));
    }

    #[test]
    fn parses_weeks() {
        let result = parse_since("1w", anchor()).unwrap();
        assert_eq!(result, anchor() - Duration::weeks(1));
    }

    #[test]
    fn parses_calendar_months() {
        let result = parse_since("1m", anchor()).unwrap();
        assert_eq!(result.format("%Y-%m-%d").to_string(), "2026-06-27");
    }

    #[test]
    fn rejects_zero() {
        assert!(parse_since("0d", anchor()).is_err());
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(parse_since("5", anchor()).is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_since("5y", anchor()).is_err());
    }

    #[test]
    fn rejects_non_numeric_amount() {
        assert!(parse_since("xh", anchor()).is_err());
    }
}
