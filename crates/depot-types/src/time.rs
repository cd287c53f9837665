use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::TypeError;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Current UTC time, used when a submission carries no timestamp.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Parse a release timestamp.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS[.f]`, the same with a space separator, or
/// RFC 3339 with an offset (normalised to UTC).
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, TypeError> {
    let input = input.trim();
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(parsed);
        }
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.naive_utc())
        .map_err(|e| TypeError::InvalidTimestamp(format!("{input:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_iso_without_offset() {
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00").unwrap(),
            ymd_hms(2024, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn parses_space_separated() {
        assert_eq!(
            parse_timestamp("2024-01-02 03:04:05").unwrap(),
            ymd_hms(2024, 1, 2, 3, 4, 5)
        );
    }

    #[test]
    fn parses_fractional_seconds() {
        let parsed = parse_timestamp("2024-01-02T03:04:05.250").unwrap();
        assert_eq!(parsed.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rfc3339_is_normalised_to_utc() {
        assert_eq!(
            parse_timestamp("2024-01-01T02:00:00+02:00").unwrap(),
            ymd_hms(2024, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(TypeError::InvalidTimestamp(_))
        ));
    }
}
