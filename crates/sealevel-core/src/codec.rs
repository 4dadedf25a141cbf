//! Conversion between serial day numbers and calendar instants.
//!
//! Serial day numbers follow the MATLAB `datenum` convention: day 1 is
//! 0000-01-01 in the proleptic Gregorian calendar and the fractional part is the
//! time of day. Calendar instants are timezone-naive because the source data
//! carries no zone.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

/// Days between serial day 0 and chrono's day 0 of the common era.
pub const SERIAL_DAYS_OFFSET: i64 = 366;
/// Serial day number of 1970-01-01T00:00:00.
pub const SERIAL_UNIX_EPOCH: f64 = 719_529.0;

const MILLIS_PER_DAY: i64 = 86_400_000;
const MIN_YEAR: i32 = 1700;
const MAX_YEAR: i32 = 2300;

static CALENDAR_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("serial epoch {0} is not finite")]
    NonFinite(f64),
    #[error("serial epoch {0} is negative")]
    Negative(f64),
    #[error("serial epoch {value} is outside the supported range [{min}, {max})")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("'{0}' is not an ISO-8601 calendar timestamp")]
    Unparseable(String),
}

fn serial_for_date(date: NaiveDate) -> f64 {
    (i64::from(date.num_days_from_ce()) + SERIAL_DAYS_OFFSET) as f64
}

/// Half-open range of serial epochs the codec accepts: 1700-01-01 up to 2300-01-01.
pub fn serial_bounds() -> (f64, f64) {
    let min = NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1).map_or(0.0, serial_for_date);
    let max = NaiveDate::from_ymd_opt(MAX_YEAR, 1, 1).map_or(f64::MAX, serial_for_date);
    (min, max)
}

pub fn validate_serial(serial: f64) -> Result<f64, CodecError> {
    if !serial.is_finite() {
        return Err(CodecError::NonFinite(serial));
    }
    if serial < 0.0 {
        return Err(CodecError::Negative(serial));
    }
    let (min, max) = serial_bounds();
    if serial < min || serial >= max {
        return Err(CodecError::OutOfRange {
            value: serial,
            min,
            max,
        });
    }
    Ok(serial)
}

/// Decodes a serial day number into a calendar instant at millisecond resolution.
///
/// A fractional day that rounds up to a full day rolls into the next date.
pub fn serial_to_calendar(serial: f64) -> Result<NaiveDateTime, CodecError> {
    validate_serial(serial)?;

    let whole = serial.floor();
    let mut days = whole as i64;
    let mut millis = ((serial - whole) * MILLIS_PER_DAY as f64).round() as i64;
    if millis >= MILLIS_PER_DAY {
        days += 1;
        millis -= MILLIS_PER_DAY;
    }

    // The carry can land exactly on the exclusive upper bound.
    let (min, max) = serial_bounds();
    let out_of_range = || CodecError::OutOfRange {
        value: serial,
        min,
        max,
    };
    if days as f64 >= max {
        return Err(out_of_range());
    }

    let date = i32::try_from(days - SERIAL_DAYS_OFFSET)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(out_of_range)?;

    Ok(date.and_time(NaiveTime::MIN) + Duration::milliseconds(millis))
}

pub fn calendar_to_serial(instant: NaiveDateTime) -> Result<f64, CodecError> {
    let time = instant.time();
    let seconds = f64::from(time.num_seconds_from_midnight())
        + f64::from(time.nanosecond().min(999_999_999)) / 1e9;
    let serial = serial_for_date(instant.date()) + seconds / 86_400.0;
    validate_serial(serial)
}

/// ISO-8601 without offset; fractional seconds appear only when non-zero.
pub fn format_calendar(instant: &NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn parse_calendar(value: &str) -> Result<NaiveDateTime, CodecError> {
    let trimmed = value.trim();
    for fmt in CALENDAR_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| CodecError::Unparseable(trimmed.to_string()))
}

pub fn serial_to_iso(serial: f64) -> Result<String, CodecError> {
    serial_to_calendar(serial).map(|dt| format_calendar(&dt))
}

pub fn iso_to_serial(value: &str) -> Result<f64, CodecError> {
    calendar_to_serial(parse_calendar(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_anchor() {
        let dt = serial_to_calendar(SERIAL_UNIX_EPOCH).unwrap();
        assert_eq!(format_calendar(&dt), "1970-01-01T00:00:00");
        assert_eq!(calendar_to_serial(dt).unwrap(), SERIAL_UNIX_EPOCH);
    }

    #[test]
    fn fraction_rounding_rolls_into_next_day() {
        let dt = serial_to_calendar(738_000.999_999_999_9).unwrap();
        assert_eq!(format_calendar(&dt), "2020-07-29T00:00:00");
    }

    #[test]
    fn bounds_cover_multiple_centuries() {
        let (min, max) = serial_bounds();
        assert_eq!(format_calendar(&serial_to_calendar(min).unwrap()), "1700-01-01T00:00:00");
        assert!(serial_to_calendar(max).is_err());
        assert!(serial_to_calendar(max - 1.0).is_ok());
    }
}
