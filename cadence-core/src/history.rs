//! Derive presentation state from the recent dose history.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::dose::{Dose, DoseRecord};
use crate::schedule::ScheduleConfig;

/// How many records the aggregator looks at.
pub const HISTORY_TAIL: usize = 4;

/// Mutable per-reminder state consulted (not computed) by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderState {
    pub last_ping: DateTime<Utc>,
    pub mute_until: DateTime<Utc>,
    pub alternating_flag: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DueFlags {
    pub due: bool,
    pub muted: bool,
    pub ping_due: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Gaps between consecutive recorded doses, oldest to newest.
    pub gaps: Vec<Duration>,
    pub last: Dose,
    pub target: Dose,
    pub flags: DueFlags,
}

/// Consecutive-timestamp differences across a newest-first window,
/// returned oldest to newest.
pub fn gaps(tail_newest_first: &[DoseRecord]) -> Vec<Duration> {
    tail_newest_first
        .windows(2)
        .rev()
        .map(|pair| pair[0].timestamp - pair[1].timestamp)
        .collect()
}

/// The newest recorded dose, or a bootstrap dose when nothing was recorded.
pub fn last_dose(config: ScheduleConfig, tail_newest_first: &[DoseRecord], now: DateTime<Utc>) -> Dose {
    match tail_newest_first.first() {
        Some(record) => Dose::from_record(config, record),
        None => bootstrap_dose(config, now),
    }
}

/// Pretend the reminder was taken exactly on the latest slot before `now`.
///
/// Known approximation: until a real record exists the bootstrap keeps moving
/// with `now`, so it reports zero drift and the first target is always the
/// following slot.
pub fn bootstrap_dose(config: ScheduleConfig, now: DateTime<Utc>) -> Dose {
    let period = config.period();
    let mut timestamp = Utc.from_utc_datetime(&now.date_naive().and_time(config.anchor_utc()));
    // The anchor is on now's date, so each walk takes at most one day of periods.
    while timestamp < now {
        timestamp += period;
    }
    while timestamp >= now {
        timestamp -= period;
    }
    Dose::new(config, timestamp, timestamp)
}

pub fn classify(target: &Dose, state: &ReminderState, ping_interval: Duration, now: DateTime<Utc>) -> DueFlags {
    let due = now >= target.timestamp;
    let muted = now < state.mute_until;
    let ping_due = due
        && !muted
        && state
            .last_ping
            .checked_add_signed(ping_interval)
            .is_some_and(|next_ping| now >= next_ping);
    DueFlags { due, muted, ping_due }
}

pub fn assess(
    config: ScheduleConfig,
    state: &ReminderState,
    tail_newest_first: &[DoseRecord],
    now: DateTime<Utc>,
) -> Assessment {
    let tail = &tail_newest_first[..tail_newest_first.len().min(HISTORY_TAIL)];
    let last = last_dose(config, tail, now);
    let target = last.target(now);
    let flags = classify(&target, state, config.ping_interval(), now);
    Assessment {
        gaps: gaps(tail),
        last,
        target,
        flags,
    }
}
