//! Map an instant to the nearest cycle center.
//!
//! The search starts at the anchor of the instant's UTC calendar date (which is
//! the last cycle of that day) and walks one period at a time toward the
//! instant. It is directional: on an exact tie the first candidate reached
//! wins, so an instant half a period after a center resolves to that center,
//! and one half a period before a center resolves to the later one.

use chrono::{DateTime, TimeZone, Utc};

use crate::schedule::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSlot {
    /// `0..cycles_per_day`; the cycle ending at the anchor has the highest index.
    pub index: u32,
    pub center: DateTime<Utc>,
}

pub fn resolve_cycle(config: &ScheduleConfig, timestamp: DateTime<Utc>) -> CycleSlot {
    let cycles = config.cycles_per_day();
    let period = config.period();
    let half = config.half_period();

    let mut center = Utc.from_utc_datetime(&timestamp.date_naive().and_time(config.anchor_utc()));
    let mut index = cycles - 1;

    // The starting candidate lies on the same calendar day, so it is less than
    // `cycles` periods away.
    for _ in 0..=cycles {
        if (timestamp - center).abs() <= half {
            return CycleSlot { index, center };
        }
        if timestamp > center {
            center += period;
            index = (index + 1) % cycles;
        } else {
            center -= period;
            index = (index + cycles - 1) % cycles;
        }
    }

    unreachable!("cycle search for {timestamp} did not converge within {cycles} steps")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime};
    use chrono_tz::Tz;

    fn cfg(cycles: u32) -> ScheduleConfig {
        ScheduleConfig::new(
            cycles,
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            Duration::hours(1),
            Duration::minutes(30),
            Tz::UTC,
        )
        .unwrap()
    }

    fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_anchor_is_highest_index() {
        let slot = resolve_cycle(&cfg(3), utc(1, 21, 50));
        assert_eq!(slot, CycleSlot { index: 2, center: utc(1, 22, 0) });
    }

    #[test]
    fn test_indices_increase_through_the_day() {
        let c = cfg(3);
        assert_eq!(resolve_cycle(&c, utc(1, 6, 10)), CycleSlot { index: 0, center: utc(1, 6, 0) });
        assert_eq!(resolve_cycle(&c, utc(1, 14, 0)), CycleSlot { index: 1, center: utc(1, 14, 0) });
        // After the anchor the walk crosses into the next day and wraps to 0.
        assert_eq!(resolve_cycle(&c, utc(1, 23, 59)), CycleSlot { index: 2, center: utc(1, 22, 0) });
        assert_eq!(resolve_cycle(&c, utc(2, 5, 0)), CycleSlot { index: 0, center: utc(2, 6, 0) });
    }

    #[test]
    fn test_before_midnight_wraps_forward() {
        // 02:30 on day 2 is 4.5h after 22:00 day 1 and 3.5h before 06:00 day 2.
        let slot = resolve_cycle(&cfg(3), utc(2, 2, 30));
        assert_eq!(slot, CycleSlot { index: 0, center: utc(2, 6, 0) });
    }

    #[test]
    fn test_ties_are_directional() {
        let c = cfg(3);
        // Exactly 4h after 14:00 and 4h before 22:00: walking backward from 22:00
        // reaches 22:00 first, which is already within half a period.
        assert_eq!(resolve_cycle(&c, utc(1, 18, 0)).center, utc(1, 22, 0));
        // 02:00 is a tie between 22:00 (day 1) and 06:00 (day 2); the walk
        // starts at 22:00 day 2 and goes backward, reaching 06:00 first.
        assert_eq!(resolve_cycle(&c, utc(2, 2, 0)).center, utc(2, 6, 0));
    }

    #[test]
    fn test_single_cycle_per_day() {
        let c = cfg(1);
        let slot = resolve_cycle(&c, utc(2, 9, 0));
        assert_eq!(slot, CycleSlot { index: 0, center: utc(1, 22, 0) });
        let slot = resolve_cycle(&c, utc(2, 11, 0));
        assert_eq!(slot, CycleSlot { index: 0, center: utc(2, 22, 0) });
    }
}
