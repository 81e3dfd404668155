//! Time-input parsing for tool arguments
//!
//! Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, bare dates, `"now"`, and relative
//! forms like `"7 days ago"`.

use chrono::{DateTime, Duration, Utc};

/// Parse a time argument into a UTC timestamp
pub fn parse_time_input(time_str: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = time_str.trim();

    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    // Relative forms: "1 hour ago", "30 minutes ago", "7 days ago"
    if trimmed.ends_with("ago") {
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() >= 2 {
            if let Ok(num) = parts[0].parse::<i64>() {
                let now = Utc::now();
                return match parts[1] {
                    "minute" | "minutes" => Ok(now - Duration::minutes(num)),
                    "hour" | "hours" => Ok(now - Duration::hours(num)),
                    "day" | "days" => Ok(now - Duration::days(num)),
                    "week" | "weeks" => Ok(now - Duration::weeks(num)),
                    _ => Err(format!("Unsupported time unit in: {}", time_str)),
                };
            }
        }
    }

    Err(format!("Unable to parse time string: {}", time_str))
}
