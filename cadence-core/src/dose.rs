//! Doses: recorded acknowledgements and the projection of the next one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::resolve_cycle;
use crate::schedule::ScheduleConfig;

/// One persisted acknowledgement. Append-only; only the newest may be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseRecord {
    /// When it was actually acknowledged.
    pub timestamp: DateTime<Utc>,
    /// The cycle slot it satisfies.
    pub center: DateTime<Utc>,
}

/// A computed occurrence (actual or projected). Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dose {
    pub config: ScheduleConfig,
    pub timestamp: DateTime<Utc>,
    pub center: DateTime<Utc>,
    /// `timestamp - center`; positive when late.
    pub late: Duration,
    pub cycle: u32,
    pub closest_center: DateTime<Utc>,
}

impl Dose {
    /// Cycle and closest center are re-derived from `center` every time.
    pub fn new(config: ScheduleConfig, timestamp: DateTime<Utc>, center: DateTime<Utc>) -> Self {
        let slot = resolve_cycle(&config, center);
        Self {
            config,
            timestamp,
            center,
            late: timestamp - center,
            cycle: slot.index,
            closest_center: slot.center,
        }
    }

    pub fn from_record(config: ScheduleConfig, record: &DoseRecord) -> Self {
        Self::new(config, record.timestamp, record.center)
    }

    pub fn to_record(&self) -> DoseRecord {
        DoseRecord {
            timestamp: self.timestamp,
            center: self.center,
        }
    }

    /// Next expected dose, with the previous dose's drift pulled back by at
    /// most the correction limit.
    ///
    /// The result is never earlier than both the naive projection and `now`,
    /// so a schedule that is checked rarely cannot slide into the past.
    pub fn target(&self, now: DateTime<Utc>) -> Dose {
        let period = self.config.period();
        let limit = self.config.correction_limit();

        let next_center = self.closest_center + period;
        let desired_next_time = self.timestamp + period;
        let correction = (self.closest_center - self.timestamp).clamp(-limit, limit);
        let next_time = (desired_next_time + correction).max(desired_next_time.min(now));

        Dose::new(self.config, next_time, next_center)
    }

    /// Resolve a "done now" report to the center it satisfies.
    ///
    /// Starts from the naive next slot and moves whole periods toward `now`
    /// until the center is within one correction window of it, so a report is
    /// never attributed to a slot many cycles away.
    pub fn taken(&self, now: DateTime<Utc>) -> Dose {
        let period = self.config.period();
        let limit = self.config.correction_limit();
        let mut next_center = self.closest_center + period;

        if next_center > now {
            let steps = periods_strictly_within(next_center - (now + limit), period);
            next_center -= scale(period, steps);
        } else {
            let steps = periods_strictly_within((now - limit) - next_center, period);
            next_center += scale(period, steps);
        }

        Dose::new(self.config, now, next_center)
    }
}

/// Number of whole steps `j >= 1` with `j * period < gap`.
///
/// Closed form of "keep stepping while the next candidate is still beyond the
/// window", which keeps corrupted far-away centers from looping for ages.
fn periods_strictly_within(gap: Duration, period: Duration) -> i64 {
    let gap = gap
        .num_nanoseconds()
        .unwrap_or(if gap < Duration::zero() { i64::MIN } else { i64::MAX });
    let period = period.num_nanoseconds().unwrap_or(i64::MAX).max(1);
    if gap <= 0 { 0 } else { (gap - 1) / period }
}

fn scale(period: Duration, steps: i64) -> Duration {
    let nanos = period.num_nanoseconds().unwrap_or(i64::MAX);
    Duration::nanoseconds(nanos.saturating_mul(steps))
}
