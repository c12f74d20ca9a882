//! Ping status: everything a notifier needs to decide and render a reminder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dose::{Dose, DoseRecord};
use crate::error::CoreResult;
use crate::history::{DueFlags, assess};
use crate::humanize::{EN_SPACE, capitalize, natural_delta, pretty_dose, render_schedule};
use crate::reminder::{Reminder, TtsMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetView {
    pub timestamp: DateTime<Utc>,
    pub center: DateTime<Utc>,
    pub cycle: u32,
}

impl From<&Dose> for TargetView {
    fn from(dose: &Dose) -> Self {
        Self {
            timestamp: dose.timestamp,
            center: dose.center,
            cycle: dose.cycle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    pub reminder: Reminder,
    pub target: TargetView,
    pub message: String,
    pub tts_message: bool,
    pub tts_custom: Option<String>,
    pub when: String,
    pub last: String,
    pub gaps: String,
    pub schedule: String,
    pub muted: Option<String>,
    pub flag_due: bool,
    pub flag_muted: bool,
    pub flag_ping: bool,
}

impl PingReport {
    /// `tail` is the newest-first history window.
    pub fn build(reminder: &Reminder, tail: &[DoseRecord], now: DateTime<Utc>) -> CoreResult<Self> {
        let config = reminder.schedule()?;
        let state = reminder.state();
        let assessment = assess(config, &state, tail, now);

        let mut message = reminder.ping_message.clone();
        if let Some(label) = reminder.alternating_label() {
            message = format!("{message}{EN_SPACE}({label})");
        }
        let (tts_message, tts_custom) = match reminder.tts {
            TtsMode::NoTts => (false, None),
            TtsMode::PingAndNumber => (true, None),
            TtsMode::NameOnly => (false, Some(message.clone())),
            TtsMode::CustomText => (
                false,
                Some(
                    reminder
                        .tts_custom
                        .clone()
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| message.clone()),
                ),
            ),
        };
        let message = format!("[{}] {message}", reminder.id.key);

        // Shown newest gap first.
        let gaps = assessment
            .gaps
            .iter()
            .rev()
            .map(|gap| natural_delta(*gap, false, true))
            .collect::<Vec<_>>()
            .join(", ");

        let muted = assessment.flags.muted.then(|| {
            format!(
                "Muted for another {}.",
                natural_delta(now - state.mute_until, false, false)
            )
        });

        let DueFlags { due, muted: flag_muted, ping_due } = assessment.flags;
        Ok(Self {
            reminder: reminder.clone(),
            target: TargetView::from(&assessment.target),
            message,
            tts_message,
            tts_custom,
            when: capitalize(&pretty_dose(&assessment.target, now, false)),
            last: pretty_dose(&assessment.last, now, true),
            gaps,
            schedule: render_schedule(&config, now),
            muted,
            flag_due: due,
            flag_muted,
            flag_ping: ping_due,
        })
    }

    pub fn flags(&self) -> DueFlags {
        DueFlags {
            due: self.flag_due,
            muted: self.flag_muted,
            ping_due: self.flag_ping,
        }
    }
}

/// Which reports a status query keeps. Each enabled filter drops reports that
/// are not due, are muted, or are not ping-due respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingFilter {
    pub due: bool,
    pub muted: bool,
    pub ping_due: bool,
}

impl Default for PingFilter {
    fn default() -> Self {
        Self {
            due: true,
            muted: true,
            ping_due: true,
        }
    }
}

impl PingFilter {
    pub fn none() -> Self {
        Self {
            due: false,
            muted: false,
            ping_due: false,
        }
    }

    pub fn admits(&self, flags: DueFlags) -> bool {
        if self.due && !flags.due {
            return false;
        }
        if self.muted && flags.muted {
            return false;
        }
        if self.ping_due && !flags.ping_due {
            return false;
        }
        true
    }
}
