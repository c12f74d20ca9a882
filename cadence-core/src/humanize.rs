//! Human-readable renderings of durations, doses and the daily schedule.

use chrono::{DateTime, Duration, Offset, Timelike, Utc};

use crate::dose::Dose;
use crate::schedule::ScheduleConfig;
use crate::time::DAYS_PER_YEAR;

/// En space, used to set off parenthesised details.
pub const EN_SPACE: char = '\u{2002}';

/// Render a duration as "5 minutes", "3 hours", "2 weeks", ...
///
/// With `relative`, appends " ago" for positive deltas and " from now" for
/// negative ones, and collapses anything under a minute to "now". With
/// `hours_only`, hours are the largest unit.
pub fn natural_delta(delta: Duration, relative: bool, hours_only: bool) -> String {
    let seconds = total_seconds(delta);
    let past = seconds >= 0.0;
    let minutes = seconds.abs() / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;
    let weeks = days / 7.0;
    let years = days / DAYS_PER_YEAR;
    let months = years * 12.0;

    if relative && minutes < 1.0 {
        return "now".to_string();
    }
    let suffix = match (relative, past) {
        (false, _) => "",
        (true, true) => " ago",
        (true, false) => " from now",
    };

    let minutes = minutes.round_ties_even();
    if minutes < 60.0 {
        return counted(minutes, "minute", suffix);
    }
    let hours = hours.round_ties_even();
    if hours < 24.0 || hours_only {
        return counted(hours, "hour", suffix);
    }
    let days = days.round_ties_even();
    if days < 7.0 {
        return counted(days, "day", suffix);
    }
    if months < 1.0 {
        return counted(weeks.round_ties_even(), "week", suffix);
    }
    let months = months.round_ties_even();
    if months < 12.0 {
        return counted(months, "month", suffix);
    }
    counted(years.round_ties_even(), "year", suffix)
}

fn counted(value: f64, unit: &str, suffix: &str) -> String {
    let value = value as i64;
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural}{suffix}")
}

fn total_seconds(delta: Duration) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

/// Drop the leading zero of an "HH:MM" string ("07:30" -> "7:30", "00:15" -> "0:15").
pub fn fix_time_str(time_str: &str) -> String {
    if let Some(rest) = time_str.strip_prefix("00") {
        return format!("0{rest}");
    }
    time_str.trim_start_matches('0').to_string()
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "2 hours ago at 9:15 (3 hours late, 2/3)".
///
/// The lateness part only appears with `late_flag` and when the dose missed
/// its center by more than the correction limit. The cycle part appears when a
/// dose is more than half a period off its center.
pub fn pretty_dose(dose: &Dose, now: DateTime<Utc>, late_flag: bool) -> String {
    let config = &dose.config;
    let mut extra = Vec::new();

    if late_flag && dose.late.abs() > config.correction_limit() {
        let direction = if dose.late > Duration::zero() { "late" } else { "early" };
        extra.push(format!("{} {direction}", natural_delta(dose.late, false, true)));
    }
    if config.cycles_per_day() != 1 && dose.late.abs() > config.half_period() {
        extra.push(format!("{}/{}", dose.cycle + 1, config.cycles_per_day()));
    }
    let extra = if extra.is_empty() {
        String::new()
    } else {
        format!("{EN_SPACE}({})", extra.join(", "))
    };

    let local = dose.timestamp.with_timezone(&config.timezone());
    let time_str = fix_time_str(&local.format("%H:%M").to_string());
    format!(
        "{} at {time_str}{extra}",
        natural_delta(now - dose.timestamp, true, true)
    )
}

/// Every cycle's time of day in the display timezone, earliest index first,
/// followed by the zone abbreviation. Uses the zone's offset at `now`.
pub fn render_schedule(config: &ScheduleConfig, now: DateTime<Utc>) -> String {
    const DAY_SECS: f64 = 86_400.0;

    let local_now = now.with_timezone(&config.timezone());
    let offset = local_now.offset().fix().local_minus_utc() as f64;
    let anchor_secs = config.anchor_utc().num_seconds_from_midnight() as f64;
    let anchor_local = (anchor_secs + offset).rem_euclid(DAY_SECS);
    let period_secs = DAY_SECS / config.cycles_per_day() as f64;

    let times: Vec<String> = (0..config.cycles_per_day())
        .rev()
        .map(|cycle| {
            let mut secs = anchor_local - cycle as f64 * period_secs;
            if secs < 0.0 {
                secs += DAY_SECS;
            }
            let hour = (secs / 3_600.0).floor() as u32;
            let minute = ((secs - hour as f64 * 3_600.0) / 60.0).floor() as u32;
            fix_time_str(&format!("{hour:02}:{minute:02}"))
        })
        .collect();

    format!("{}{EN_SPACE}({})", times.join(", "), local_now.format("%Z"))
}
