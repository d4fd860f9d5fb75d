//! Time utilities: the engine reasons in the user's local wall-clock time.
//!
//! Collaborators store naive local timestamps; conversion to and from UTC
//! happens only at the edges (clock reads, ICS export).

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Wire/CLI format for local timestamps.
pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Project a UTC instant onto the wall clock of `tz`.
pub fn to_local(now: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    now.with_timezone(&tz).naive_local()
}

/// Parse a local timestamp like "2026-02-20 23:59".
pub fn parse_local(local: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(local.trim(), LOCAL_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))
}

/// Resolve a local timestamp in an IANA tz like "America/Chicago" to UTC.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    let local_dt = tz
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Round up to the next 15-minute boundary. Sub-minute precision is dropped,
/// never rounded down.
pub fn ceil_to_quarter_hour(dt: NaiveDateTime) -> NaiveDateTime {
    let whole = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt);
    let whole = if whole < dt {
        whole + Duration::minutes(1)
    } else {
        whole
    };

    match whole.minute() % 15 {
        0 => whole,
        r => whole + Duration::minutes(i64::from(15 - r)),
    }
}

/// Shorten `s` to `keep` characters plus "..." when it is longer than `limit`
/// characters. Counts chars, not bytes.
pub fn truncate_chars(s: &str, limit: usize, keep: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_chicago_local_to_utc() {
        // Feb is CST (UTC-6)
        let tz = parse_timezone("America/Chicago").unwrap();
        let local = parse_local("2026-02-20 23:59").unwrap();
        let utc = local_to_utc(local, tz).unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-21T05:59:00+00:00");
    }

    #[test]
    fn test_to_local_roundtrip() {
        let tz = parse_timezone("Asia/Ho_Chi_Minh").unwrap();
        let utc = Utc.with_ymd_and_hms(2026, 2, 20, 1, 30, 0).unwrap();
        assert_eq!(to_local(utc, tz), at(8, 30, 0));
    }

    #[test]
    fn test_invalid_timezone_is_error() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_ceil_to_quarter_hour() {
        assert_eq!(ceil_to_quarter_hour(at(9, 0, 0)), at(9, 0, 0));
        assert_eq!(ceil_to_quarter_hour(at(9, 1, 0)), at(9, 15, 0));
        assert_eq!(ceil_to_quarter_hour(at(9, 44, 59)), at(9, 45, 0));
        // 09:45:10 must not round back to 09:45:00
        assert_eq!(ceil_to_quarter_hour(at(9, 45, 10)), at(10, 0, 0));
        assert_eq!(ceil_to_quarter_hour(at(23, 50, 0)), at(23, 50, 0) + Duration::minutes(10));
    }

    #[test]
    fn test_truncate_chars_is_utf8_safe() {
        assert_eq!(truncate_chars("short", 15, 12), "short");
        assert_eq!(truncate_chars("Học tiếng Anh buổi sáng", 15, 12), "Học tiếng An...");
    }
}
