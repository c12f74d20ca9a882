//! Cadence of a single reminder: how many cycles per day, where the day's last
//! cycle sits, and how much drift a single dose may absorb.

use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;

use crate::error::{CoreError, CoreResult};

/// Largest drift a single dose may absorb, in seconds (one day).
pub const MAX_CORRECTION_SECS: i64 = 86_400;

/// Longest allowed gap between two notifications, in seconds (365 days).
pub const MAX_PING_INTERVAL_SECS: i64 = 365 * 86_400;

/// Immutable-per-evaluation description of a reminder's cadence.
///
/// Fields are private: the only way in is [`ScheduleConfig::new`], which
/// enforces `cycles_per_day >= 1` and windows within `0..=MAX_*_SECS`. The engine
/// relies on that and does not re-check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    cycles_per_day: u32,
    anchor_utc: NaiveTime,
    correction_limit: Duration,
    ping_interval: Duration,
    timezone: Tz,
}

impl ScheduleConfig {
    pub fn new(
        cycles_per_day: u32,
        anchor_utc: NaiveTime,
        correction_limit: Duration,
        ping_interval: Duration,
        timezone: Tz,
    ) -> CoreResult<Self> {
        if cycles_per_day == 0 {
            return Err(CoreError::invalid("cycles per day must be at least 1"));
        }
        if cycles_per_day > 86_400 {
            return Err(CoreError::invalid("cycles per day must not exceed one per second"));
        }
        if correction_limit < Duration::zero() {
            return Err(CoreError::invalid("correction amount must not be negative"));
        }
        if correction_limit > Duration::seconds(MAX_CORRECTION_SECS) {
            return Err(CoreError::invalid("correction amount must not exceed one day"));
        }
        if ping_interval < Duration::zero() {
            return Err(CoreError::invalid("ping interval must not be negative"));
        }
        if ping_interval > Duration::seconds(MAX_PING_INTERVAL_SECS) {
            return Err(CoreError::invalid("ping interval must not exceed one year"));
        }
        Ok(Self {
            cycles_per_day,
            anchor_utc,
            correction_limit,
            ping_interval,
            timezone,
        })
    }

    pub fn cycles_per_day(&self) -> u32 {
        self.cycles_per_day
    }

    /// UTC time-of-day of the last cycle of each calendar day.
    pub fn anchor_utc(&self) -> NaiveTime {
        self.anchor_utc
    }

    pub fn correction_limit(&self) -> Duration {
        self.correction_limit
    }

    /// Minimum gap between two notifications for the same reminder.
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Display-only timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// `24h / cycles_per_day`.
    pub fn period(&self) -> Duration {
        Duration::days(1) / self.cycles_per_day as i32
    }

    pub fn half_period(&self) -> Duration {
        self.period() / 2
    }
}
