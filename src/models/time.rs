use chrono::{NaiveTime, Timelike};

pub const DEFAULT_DURATION_HOURS: f64 = 1.0;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * 60;
/// No lesson runs longer than a day; anything above is corrupted input.
pub const MAX_DURATION_HOURS: f64 = 24.0;

/// Durations at or below this many minutes are treated as corrupted input.
const MIN_VALID_MINUTES: i64 = 2;

/// Parse a wall-clock time given as `HH:MM`, `H:MM`, `HH:MM:SS` or a
/// decimal-hour string such as `"9.5"`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if !s.contains(':') {
        return s.parse::<f64>().ok().and_then(from_decimal_hours);
    }

    let mut parts = s.split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().get(..2)?.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// `9.5` becomes `09:30`. Values outside `[0, 24)` are rejected.
pub fn from_decimal_hours(hours: f64) -> Option<NaiveTime> {
    if !hours.is_finite() || !(0.0..24.0).contains(&hours) {
        return None;
    }
    let total = (hours * 60.0).round() as u32;
    if total >= MINUTES_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(total / 60, total % 60, 0)
}

pub fn to_decimal_hours(time: NaiveTime) -> f64 {
    minutes_of_day(time) as f64 / 60.0
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Finite, positive and at most a day.
pub fn is_valid_duration(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0 && hours <= MAX_DURATION_HOURS
}

/// Duration in whole minutes; missing or invalid hours fall back to the 60
/// minute default so an interval is never zero-width or unbounded.
pub fn duration_minutes(hours: Option<f64>) -> u32 {
    match hours {
        Some(h) if is_valid_duration(h) => {
            let minutes = (h * 60.0).round() as u32;
            if minutes == 0 {
                DEFAULT_DURATION_MINUTES
            } else {
                minutes
            }
        }
        _ => DEFAULT_DURATION_MINUTES,
    }
}

/// Start plus duration, wrapping past midnight.
pub fn compute_end_time(start: NaiveTime, duration_hours: f64) -> NaiveTime {
    let minutes = duration_minutes(Some(duration_hours));
    let total = minutes_of_day(start).saturating_add(minutes) % MINUTES_PER_DAY;

    NaiveTime::from_hms_opt(total / 60, total % 60, 0).unwrap_or(start)
}

/// Hours between two wall-clock times. An end before the start is read as
/// crossing midnight; a span of two minutes or less is corrupted and becomes
/// one hour.
pub fn derive_duration(start: NaiveTime, end: NaiveTime) -> f64 {
    let mut diff = minutes_of_day(end) as i64 - minutes_of_day(start) as i64;
    if diff < 0 {
        diff += MINUTES_PER_DAY as i64;
    }
    if diff <= MIN_VALID_MINUTES {
        return DEFAULT_DURATION_HOURS;
    }
    diff as f64 / 60.0
}

/// Serde adapter writing `HH:MM` and reading either a time string or a
/// decimal-hour number.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let parsed = match &value {
            serde_json::Value::String(s) => super::parse_time(s),
            serde_json::Value::Number(n) => n.as_f64().and_then(super::from_decimal_hours),
            _ => None,
        };
        parsed.ok_or_else(|| de::Error::custom(format!("invalid time: {value}")))
    }
}
