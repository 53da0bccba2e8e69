//! Date and time utilities

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 UTC timestamp
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Format a duration in seconds as `M:SS`; unknown or zero becomes `?:??`
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s > 0.0 => {
            let minutes = (s / 60.0).floor() as i64;
            let secs = (s % 60.0).floor() as i64;
            format!("{}:{:02}", minutes, secs)
        }
        _ => "?:??".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(210.0)), "3:30");
        assert_eq!(format_duration(Some(59.9)), "0:59");
        assert_eq!(format_duration(Some(3601.0)), "60:01");
        assert_eq!(format_duration(Some(0.0)), "?:??");
        assert_eq!(format_duration(None), "?:??");
    }

    #[test]
    fn test_now_timestamp_is_utc_iso() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
