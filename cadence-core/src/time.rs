//! Time utilities: instant/duration parsing and timezone conversion.
//!
//! All slot arithmetic happens in UTC. Timezones only enter when a user supplies
//! a local time-of-day or when something is rendered for display.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CoreError, CoreResult};

/// Days per Gregorian year, used for the `M` and `y` duration units.
pub const DAYS_PER_YEAR: f64 = 365.2425;

/// Sentinel for "never happened" timestamps (last ping, mute).
pub fn never() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn parse_timezone(tz: &str) -> CoreResult<Tz> {
    tz.parse::<Tz>()
        .map_err(|_| CoreError::invalid(format!("unknown timezone: {tz}")))
}

/// Parse an ISO-8601 instant. An explicit offset is mandatory; `Z` is accepted.
pub fn parse_instant(text: &str) -> CoreResult<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"));
    if naive.is_ok() {
        return Err(CoreError::invalid(format!(
            "time zone information is missing: {text}"
        )));
    }
    Err(CoreError::invalid(format!("invalid instant: {text}")))
}

/// Parse a bare time of day like "22:00" or "07:30:15". Offsets are rejected.
pub fn parse_time_of_day(text: &str) -> CoreResult<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| CoreError::invalid(format!("invalid time of day: {text}")))
}

/// Convert a local time-of-day in `tz` to the matching UTC time-of-day,
/// using the offset in effect on today's local date.
pub fn local_time_to_utc(time: NaiveTime, tz: Tz, now: DateTime<Utc>) -> CoreResult<NaiveTime> {
    let date = now.with_timezone(&tz).date_naive();
    let local = tz
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| CoreError::invalid(format!("local time {time} does not exist in {tz}")))?;
    Ok(local.with_timezone(&Utc).time())
}

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+[mhdwMy])+$").expect("valid duration regex"));
static DURATION_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([mhdwMy])").expect("valid duration part regex"));

/// Parse compact durations such as "45m", "1h30m" or "2w".
///
/// Units: `m` minute, `h` hour, `d` day, `w` week, `M` month, `y` year.
pub fn parse_duration_spec(spec: &str) -> CoreResult<Duration> {
    let spec = spec.trim();
    if !DURATION_RE.is_match(spec) {
        return Err(CoreError::invalid(format!("invalid duration: {spec}")));
    }

    let mut total_secs: i64 = 0;
    for caps in DURATION_PART_RE.captures_iter(spec) {
        let value: i64 = caps[1]
            .parse()
            .map_err(|_| CoreError::invalid(format!("duration out of range: {spec}")))?;
        let unit_secs = match &caps[2] {
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            "w" => 7 * 86_400,
            "M" => (DAYS_PER_YEAR / 12.0 * 86_400.0) as i64,
            "y" => (DAYS_PER_YEAR * 86_400.0) as i64,
            _ => unreachable!("unit excluded by pattern"),
        };
        total_secs = value
            .checked_mul(unit_secs)
            .and_then(|s| total_secs.checked_add(s))
            .ok_or_else(|| CoreError::invalid(format!("duration out of range: {spec}")))?;
    }

    Duration::try_seconds(total_secs)
        .ok_or_else(|| CoreError::invalid(format!("duration out of range: {spec}")))
}
