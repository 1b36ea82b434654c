use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Parses the date shapes stored records carry: RFC 3339 timestamps, naive
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` (read as UTC) and bare `YYYY-MM-DD`
/// (midnight UTC). Anything else, including the empty string, is `None`.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(start_of_day)
}

pub fn parse_day(s: &str) -> Option<NaiveDate> {
    parse_instant(s).map(|dt| dt.date_naive())
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Fractional days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MS_PER_DAY
}

/// `YYYY-MM-DD` for the UTC calendar day of `now`.
pub fn today_iso(now: DateTime<Utc>) -> String {
    now.date_naive().format("%Y-%m-%d").to_string()
}

/// Whole days elapsed since `s`, rounded down. `None` when unparseable.
pub fn days_ago(s: &str, now: DateTime<Utc>) -> Option<i64> {
    parse_instant(s).map(|then| days_between(then, now).floor() as i64)
}

/// Human-friendly `Jan 15, 2025`, or `-` for missing/unparseable input.
pub fn format_date(s: Option<&str>) -> String {
    match s.and_then(parse_instant) {
        Some(dt) => dt.format("%b %-d, %Y").to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_instant_accepts_stored_shapes() {
        assert_eq!(parse_instant("2025-01-15"), Some(at("2025-01-15T00:00:00Z")));
        assert_eq!(
            parse_instant("2025-01-15T12:30:00.000Z"),
            Some(at("2025-01-15T12:30:00Z"))
        );
        assert_eq!(
            parse_instant("2025-01-15T12:30:00"),
            Some(at("2025-01-15T12:30:00Z"))
        );
        assert_eq!(parse_instant("2025-01-15T12:30"), Some(at("2025-01-15T12:30:00Z")));
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("   "), None);
        assert_eq!(parse_instant("next tuesday"), None);
        assert_eq!(parse_instant("2025-13-40"), None);
    }

    #[test]
    fn test_days_between_is_fractional_and_signed() {
        let a = at("2025-01-01T00:00:00Z");
        let b = at("2025-01-04T12:00:00Z");
        assert_eq!(days_between(a, b), 3.5);
        assert_eq!(days_between(b, a), -3.5);
    }

    #[test]
    fn test_days_ago() {
        let now = at("2025-01-10T08:00:00Z");
        assert_eq!(days_ago("2025-01-10", now), Some(0));
        assert_eq!(days_ago("2025-01-09", now), Some(1));
        assert_eq!(days_ago("", now), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(Some("2025-01-05")), "Jan 5, 2025");
        assert_eq!(format_date(None), "-");
        assert_eq!(format_date(Some("")), "-");
    }

    #[test]
    fn test_today_iso_uses_utc_day() {
        assert_eq!(today_iso(at("2025-06-30T23:59:59Z")), "2025-06-30");
    }
}
