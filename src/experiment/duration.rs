//! Human-readable signed durations for metric windows
//!
//! Accepts the strings analysts write in metric configs: `"0 days"`,
//! `"-1 hours"`, `"14 days"`, `"1d 12h"`, `"90min"`, `"1 days 02:00:00"`.
//! A leading sign applies to the whole duration.

use chrono::TimeDelta;

use crate::{Error, Result};

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;

fn unit_millis(unit: &str) -> Option<i64> {
    let millis = match unit {
        "w" | "wk" | "wks" | "week" | "weeks" => MILLIS_PER_WEEK,
        "d" | "day" | "days" => MILLIS_PER_DAY,
        "h" | "hr" | "hrs" | "hour" | "hours" => MILLIS_PER_HOUR,
        "m" | "min" | "mins" | "minute" | "minutes" => MILLIS_PER_MINUTE,
        "s" | "sec" | "secs" | "second" | "seconds" => MILLIS_PER_SECOND,
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => 1,
        _ => return None,
    };
    Some(millis)
}

/// Parse a signed duration string into a [`TimeDelta`].
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`] when the string is empty, a number has
/// no unit, a unit is unknown, or a clock component is out of range.
///
/// # Example
///
/// ```
/// use chrono::TimeDelta;
/// use trueno_ab::experiment::parse_duration;
///
/// # fn main() -> trueno_ab::Result<()> {
/// assert_eq!(parse_duration("14 days")?, TimeDelta::days(14));
/// assert_eq!(parse_duration("-1 hours")?, TimeDelta::hours(-1));
/// assert_eq!(parse_duration("1 days 02:00:00")?, TimeDelta::hours(26));
/// # Ok(())
/// # }
/// ```
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn parse_duration(input: &str) -> Result<TimeDelta> {
    let invalid = |reason: &str| Error::InvalidDuration(format!("{input:?}: {reason}"));

    let text = input.trim().to_ascii_lowercase();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text.strip_prefix('+').unwrap_or(&text).trim_start()),
    };
    if body.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total_ms = 0.0_f64;
    let mut rest = body;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid("expected a number"));
        }
        let (number, tail) = rest.split_at(number_len);

        // HH:MM[:SS] clock component
        if let Some(clock) = tail.strip_prefix(':') {
            let token_len = clock.find(char::is_whitespace).unwrap_or(clock.len());
            let (token, after) = clock.split_at(token_len);
            total_ms += parse_clock(number, token).ok_or_else(|| invalid("malformed clock"))?;
            rest = after;
            continue;
        }

        let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;
        let tail = tail.trim_start();
        let unit_len = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        if unit_len == 0 {
            return Err(invalid("missing unit"));
        }
        let (unit, after) = tail.split_at(unit_len);
        let factor = unit_millis(unit).ok_or_else(|| invalid(&format!("unknown unit '{unit}'")))?;
        total_ms += value * factor as f64;
        rest = after;
    }

    if !total_ms.is_finite() || total_ms.abs() >= i64::MAX as f64 {
        return Err(invalid("out of range"));
    }
    let millis = total_ms.round() as i64;
    let delta = TimeDelta::try_milliseconds(millis).ok_or_else(|| invalid("out of range"))?;
    Ok(if negative { -delta } else { delta })
}

#[allow(clippy::cast_precision_loss)]
fn parse_clock(hours: &str, rest: &str) -> Option<f64> {
    let hours: u32 = hours.parse().ok()?;
    let mut parts = rest.split(':');
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: f64 = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(
        f64::from(hours) * MILLIS_PER_HOUR as f64
            + f64::from(minutes) * MILLIS_PER_MINUTE as f64
            + seconds * MILLIS_PER_SECOND as f64,
    )
}

/// Render a [`TimeDelta`] in the largest unit that represents it exactly.
///
/// The output is accepted by [`parse_duration`].
#[must_use]
pub fn format_duration(delta: TimeDelta) -> String {
    let millis = delta.num_milliseconds();
    let (amount, unit) = [
        (MILLIS_PER_DAY, "days"),
        (MILLIS_PER_HOUR, "hours"),
        (MILLIS_PER_MINUTE, "minutes"),
        (MILLIS_PER_SECOND, "seconds"),
    ]
    .iter()
    .find(|(size, _)| millis % size == 0)
    .map_or((millis, "milliseconds"), |&(size, unit)| (millis / size, unit));
    format!("{amount} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_units() {
        assert_eq!(parse_duration("0 days").unwrap(), TimeDelta::zero());
        assert_eq!(parse_duration("14 days").unwrap(), TimeDelta::days(14));
        assert_eq!(parse_duration("1 day").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_duration("2 weeks").unwrap(), TimeDelta::days(14));
        assert_eq!(parse_duration("30 minutes").unwrap(), TimeDelta::minutes(30));
        assert_eq!(parse_duration("45s").unwrap(), TimeDelta::seconds(45));
        assert_eq!(parse_duration("250 ms").unwrap(), TimeDelta::milliseconds(250));
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(parse_duration("-1 hours").unwrap(), TimeDelta::hours(-1));
        assert_eq!(parse_duration(" - 2 days ").unwrap(), TimeDelta::days(-2));
        assert_eq!(parse_duration("+3h").unwrap(), TimeDelta::hours(3));
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(parse_duration("1d 12h").unwrap(), TimeDelta::hours(36));
        assert_eq!(parse_duration("1 day, 30 min").unwrap(), TimeDelta::minutes(1470));
        assert_eq!(parse_duration("1.5 hours").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("90min").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("7 DAYS").unwrap(), TimeDelta::days(7));
    }

    #[test]
    fn test_parse_clock_component() {
        assert_eq!(parse_duration("1 days 02:00:00").unwrap(), TimeDelta::hours(26));
        assert_eq!(parse_duration("00:30").unwrap(), TimeDelta::minutes(30));
        assert_eq!(parse_duration("-0 days 06:00:00").unwrap(), TimeDelta::hours(-6));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "   ", "-", "days", "5", "5 fortnights", "1:99", "1:00:00:00", "abc 3 days"] {
            let err = parse_duration(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidDuration(_)),
                "expected InvalidDuration for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_format_duration_round_trips() {
        for text in ["7 days", "-1 hours", "90 minutes", "0 days", "1500 milliseconds"] {
            let delta = parse_duration(text).unwrap();
            assert_eq!(parse_duration(&format_duration(delta)).unwrap(), delta);
        }
        assert_eq!(format_duration(TimeDelta::days(14)), "14 days");
        assert_eq!(format_duration(TimeDelta::hours(-1)), "-1 hours");
    }
}
