//! cadence-core: dose scheduling and drift correction for cyclical reminders.
//!
//! Everything here is a pure function of its arguments: no clock, no storage.

pub mod cycle;
pub mod dose;
pub mod error;
pub mod history;
pub mod humanize;
pub mod ping;
pub mod reminder;
pub mod schedule;
pub mod time;

pub use cycle::{CycleSlot, resolve_cycle};
pub use dose::{Dose, DoseRecord};
pub use error::{CoreError, CoreResult};
pub use history::{Assessment, DueFlags, HISTORY_TAIL, ReminderState, assess, bootstrap_dose, gaps, last_dose};
pub use humanize::{natural_delta, pretty_dose, render_schedule};
pub use ping::{PingFilter, PingReport, TargetView};
pub use reminder::{Reminder, ReminderKey, ReminderPatch, TtsMode};
pub use schedule::{MAX_CORRECTION_SECS, MAX_PING_INTERVAL_SECS, ScheduleConfig};
