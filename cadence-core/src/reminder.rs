//! The persisted reminder: identity, cadence, state and display settings.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::history::ReminderState;
use crate::schedule::ScheduleConfig;
use crate::time::{local_time_to_utc, never, parse_instant, parse_time_of_day, parse_timezone};

/// Owning group, owning member, and the member's reminder number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReminderKey {
    pub guild: u64,
    pub member: u64,
    pub key: u32,
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[guild={}|member={}|key={}]", self.guild, self.member, self.key)
    }
}

/// How a ping should be read aloud by clients that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TtsMode {
    #[default]
    NoTts = 1,
    PingAndNumber = 2,
    NameOnly = 3,
    CustomText = 4,
}

impl TryFrom<u8> for TtsMode {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::NoTts),
            2 => Ok(Self::PingAndNumber),
            3 => Ok(Self::NameOnly),
            4 => Ok(Self::CustomText),
            other => Err(CoreError::invalid(format!("unknown tts mode: {other}"))),
        }
    }
}

impl From<TtsMode> for u8 {
    fn from(mode: TtsMode) -> Self {
        mode as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(flatten)]
    pub id: ReminderKey,
    pub channel: u64,
    pub timezone: String,
    pub cycles_per_day: u32,
    pub correction_secs: i64,
    pub ping_interval_secs: i64,
    pub anchor_utc: NaiveTime,
    pub show_alternating: Option<String>,
    pub ping_message: String,
    pub tts: TtsMode,
    pub tts_custom: Option<String>,
    pub response_message: String,
    pub response_emotes: Option<String>,
    pub color_hex: String,
    pub last_ping_utc: DateTime<Utc>,
    pub mute_until_utc: DateTime<Utc>,
    pub alternating_flag: bool,
    pub active: bool,
}

impl Reminder {
    pub fn new(id: ReminderKey, channel: u64, timezone: impl Into<String>) -> Self {
        Self {
            id,
            channel,
            timezone: timezone.into(),
            cycles_per_day: 3,
            correction_secs: 3_600,
            ping_interval_secs: 1_800,
            anchor_utc: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            show_alternating: None,
            ping_message: "Reminder text".to_string(),
            tts: TtsMode::NoTts,
            tts_custom: None,
            response_message: "Nice".to_string(),
            response_emotes: None,
            color_hex: "#eb349e".to_string(),
            last_ping_utc: never(),
            mute_until_utc: never(),
            alternating_flag: false,
            active: true,
        }
    }

    /// Create a reminder from a patch; `channel` and `timezone` are required.
    pub fn create(id: ReminderKey, patch: &ReminderPatch, now: DateTime<Utc>) -> CoreResult<Self> {
        let channel = patch
            .channel
            .ok_or_else(|| CoreError::invalid("required reminder attribute \"channel\" is missing"))?;
        let timezone = patch
            .timezone
            .as_deref()
            .ok_or_else(|| CoreError::invalid("required reminder attribute \"timezone\" is missing"))?;
        let mut reminder = Self::new(id, channel, timezone);
        patch.apply(&mut reminder, now)?;
        Ok(reminder)
    }

    pub fn schedule(&self) -> CoreResult<ScheduleConfig> {
        let correction = Duration::try_seconds(self.correction_secs)
            .ok_or_else(|| CoreError::invalid("correction amount out of range"))?;
        let ping_interval = Duration::try_seconds(self.ping_interval_secs)
            .ok_or_else(|| CoreError::invalid("ping interval out of range"))?;
        ScheduleConfig::new(
            self.cycles_per_day,
            self.anchor_utc,
            correction,
            ping_interval,
            parse_timezone(&self.timezone)?,
        )
    }

    pub fn state(&self) -> ReminderState {
        ReminderState {
            last_ping: self.last_ping_utc,
            mute_until: self.mute_until_utc,
            alternating_flag: self.alternating_flag,
            active: self.active,
        }
    }

    /// Reaction emote for a recorded dose, cycling through the configured list.
    pub fn emote_for_cycle(&self, cycle: u32) -> Option<i64> {
        let emotes: Vec<i64> = self
            .response_emotes
            .as_deref()?
            .split(',')
            .filter_map(|e| e.trim().parse().ok())
            .collect();
        if emotes.is_empty() {
            return None;
        }
        Some(emotes[cycle as usize % emotes.len()])
    }

    /// The alternating label currently shown, if alternation is enabled.
    pub fn alternating_label(&self) -> Option<&str> {
        self.show_alternating
            .as_deref()?
            .split(',')
            .nth(usize::from(self.alternating_flag))
            .map(str::trim)
    }

    pub fn uses_alternating(&self) -> bool {
        self.show_alternating.is_some()
    }
}

/// Partial update. Absent fields are left alone; nullable text fields
/// distinguish "absent" from an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderPatch {
    pub channel: Option<u64>,
    pub timezone: Option<String>,
    pub cycles_per_day: Option<i64>,
    pub correction_secs: Option<i64>,
    pub ping_interval_secs: Option<i64>,
    /// Local time of day of the last cycle, in the reminder's timezone.
    pub anchor_time: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub show_alternating: Option<Option<String>>,
    pub ping_message: Option<String>,
    pub tts: Option<u8>,
    #[serde(default, deserialize_with = "nullable")]
    pub tts_custom: Option<Option<String>>,
    pub response_message: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub response_emotes: Option<Option<String>>,
    pub color_hex: Option<String>,
    pub last_ping_utc: Option<String>,
    pub mute_until_utc: Option<String>,
    pub alternating_flag: Option<bool>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ReminderPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate and apply. Either every field is applied or none is.
    pub fn apply(&self, reminder: &mut Reminder, now: DateTime<Utc>) -> CoreResult<()> {
        let mut next = reminder.clone();

        if let Some(channel) = self.channel {
            next.channel = channel;
        }
        if let Some(tz) = &self.timezone {
            next.timezone = parse_timezone(tz)?.name().to_string();
        }
        if let Some(cycles) = self.cycles_per_day {
            next.cycles_per_day = u32::try_from(cycles)
                .ok()
                .filter(|c| *c >= 1)
                .ok_or_else(|| CoreError::invalid(format!("cycles per day must be at least 1, got {cycles}")))?;
        }
        if let Some(secs) = self.correction_secs {
            next.correction_secs = non_negative_secs("correction amount", secs)?;
        }
        if let Some(secs) = self.ping_interval_secs {
            next.ping_interval_secs = non_negative_secs("ping interval", secs)?;
        }
        if let Some(value) = &self.show_alternating {
            if let Some(text) = value {
                if text.split(',').count() < 2 {
                    return Err(CoreError::invalid(
                        "alternating text needs two comma-separated labels",
                    ));
                }
            }
            next.show_alternating = value.clone();
        }
        if let Some(message) = &self.ping_message {
            next.ping_message = message.clone();
        }
        if let Some(tts) = self.tts {
            next.tts = TtsMode::try_from(tts)?;
        }
        if let Some(value) = &self.tts_custom {
            next.tts_custom = value.clone();
        }
        if let Some(message) = &self.response_message {
            next.response_message = message.clone();
        }
        if let Some(value) = &self.response_emotes {
            if let Some(text) = value {
                validate_emotes(text)?;
            }
            next.response_emotes = value.clone();
        }
        if let Some(color) = &self.color_hex {
            validate_color(color)?;
            next.color_hex = color.clone();
        }
        if let Some(text) = &self.last_ping_utc {
            next.last_ping_utc = parse_instant(text)?;
        }
        if let Some(text) = &self.mute_until_utc {
            next.mute_until_utc = parse_instant(text)?;
        }
        if let Some(flag) = self.alternating_flag {
            next.alternating_flag = flag;
        }
        // Last: the conversion depends on the (possibly updated) timezone.
        if let Some(text) = &self.anchor_time {
            let local = parse_time_of_day(text)?;
            next.anchor_utc = local_time_to_utc(local, parse_timezone(&next.timezone)?, now)?;
        }

        next.schedule()?;
        *reminder = next;
        Ok(())
    }
}

fn non_negative_secs(what: &str, secs: i64) -> CoreResult<i64> {
    if secs < 0 {
        return Err(CoreError::invalid(format!("{what} must not be negative, got {secs}s")));
    }
    Ok(secs)
}

fn validate_emotes(text: &str) -> CoreResult<()> {
    for part in text.split(',') {
        part.trim()
            .parse::<i64>()
            .map_err(|_| CoreError::invalid(format!("invalid emote id: {part:?}")))?;
    }
    Ok(())
}

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

fn validate_color(color: &str) -> CoreResult<()> {
    if !COLOR_RE.is_match(color) {
        return Err(CoreError::invalid(format!("invalid color: {color} (expected #rrggbb)")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn id() -> ReminderKey {
        ReminderKey { guild: 1, member: 2, key: 1 }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_requires_channel_and_timezone() {
        let err = Reminder::create(id(), &ReminderPatch::default(), now()).unwrap_err();
        assert!(err.to_string().contains("channel"));

        let patch = ReminderPatch { channel: Some(7), ..Default::default() };
        let err = Reminder::create(id(), &patch, now()).unwrap_err();
        assert!(err.to_string().contains("timezone"));

        let patch = ReminderPatch {
            channel: Some(7),
            timezone: Some("Europe/Berlin".into()),
            ..Default::default()
        };
        let r = Reminder::create(id(), &patch, now()).unwrap();
        assert_eq!(r.cycles_per_day, 3);
        assert_eq!(r.schedule().unwrap().period(), Duration::hours(8));
    }

    #[test]
    fn test_patch_from_json_rejects_unknown_and_keeps_nulls() {
        let patch: ReminderPatch =
            serde_json::from_str(r#"{"show_alternating": null, "cycles_per_day": 2}"#).unwrap();
        assert_eq!(patch.show_alternating, Some(None));
        assert_eq!(patch.tts_custom, None);
        assert_eq!(patch.cycles_per_day, Some(2));

        assert!(serde_json::from_str::<ReminderPatch>(r##"{"colour": "#ffffff"}"##).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected_not_clamped() {
        let mut r = Reminder::new(id(), 7, "UTC");
        let before = r.clone();
        for patch in [
            ReminderPatch { cycles_per_day: Some(0), ..Default::default() },
            ReminderPatch { cycles_per_day: Some(-3), ..Default::default() },
            ReminderPatch { correction_secs: Some(-1), ..Default::default() },
            ReminderPatch { correction_secs: Some(9_000_000_000_000_000), ..Default::default() },
            ReminderPatch { ping_interval_secs: Some(9_000_000_000_000_000), ..Default::default() },
            ReminderPatch { correction_secs: Some(86_401), ..Default::default() },
            ReminderPatch { timezone: Some("Nowhere/Land".into()), ..Default::default() },
            ReminderPatch { tts: Some(9), ..Default::default() },
            ReminderPatch { color_hex: Some("pink".into()), ..Default::default() },
            ReminderPatch { response_emotes: Some(Some("1,x".into())), ..Default::default() },
            ReminderPatch { mute_until_utc: Some("2024-01-01T00:00:00".into()), ..Default::default() },
            ReminderPatch { show_alternating: Some(Some("only-one".into())), ..Default::default() },
        ] {
            let err = patch.apply(&mut r, now()).unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)), "{patch:?}");
        }
        assert_eq!(r, before);
    }

    #[test]
    fn test_failed_patch_applies_nothing() {
        let mut r = Reminder::new(id(), 7, "UTC");
        let patch = ReminderPatch {
            ping_message: Some("Water".into()),
            cycles_per_day: Some(0),
            ..Default::default()
        };
        assert!(patch.apply(&mut r, now()).is_err());
        assert_eq!(r.ping_message, "Reminder text");
    }

    #[test]
    fn test_anchor_time_is_local_to_the_new_timezone() {
        let mut r = Reminder::new(id(), 7, "UTC");
        let patch = ReminderPatch {
            timezone: Some("America/Chicago".into()),
            anchor_time: Some("21:30".into()),
            ..Default::default()
        };
        patch.apply(&mut r, now()).unwrap();
        assert_eq!(r.anchor_utc, NaiveTime::from_hms_opt(3, 30, 0).unwrap());
    }

    #[test]
    fn test_emotes_and_alternating_labels() {
        let mut r = Reminder::new(id(), 7, "UTC");
        assert_eq!(r.emote_for_cycle(1), None);
        r.response_emotes = Some("10,20,30".into());
        assert_eq!(r.emote_for_cycle(0), Some(10));
        assert_eq!(r.emote_for_cycle(4), Some(20));

        assert_eq!(r.alternating_label(), None);
        r.show_alternating = Some("left, right".into());
        assert_eq!(r.alternating_label(), Some("left"));
        r.alternating_flag = true;
        assert_eq!(r.alternating_label(), Some("right"));
    }

    #[test]
    fn test_tts_mode_serializes_as_number() {
        assert_eq!(serde_json::to_string(&TtsMode::NameOnly).unwrap(), "3");
        assert_eq!(serde_json::from_str::<TtsMode>("4").unwrap(), TtsMode::CustomText);
        assert!(serde_json::from_str::<TtsMode>("0").is_err());
    }
}
