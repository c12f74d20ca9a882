use anyhow::{Context, Result, bail};
use cadence_core::ReminderPatch;
use cadence_core::time::parse_duration_spec;
use chrono::Utc;
use clap::{Args, Subcommand};

use crate::{IdArgs, QueryArgs, Service, print_json};

#[derive(Subcommand, Debug)]
pub enum ReminderCommand {
    /// List active reminders matching the given identity parts
    List {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Create a reminder, or update the given fields of an existing one
    Set {
        #[command(flatten)]
        id: IdArgs,

        #[command(flatten)]
        fields: SetArgs,
    },

    /// Delete a reminder and its dose history
    Delete {
        #[command(flatten)]
        id: IdArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// Raw JSON patch; applied first, flags below override it
    #[arg(long)]
    json: Option<String>,

    #[arg(long)]
    channel: Option<u64>,

    /// IANA timezone, e.g. Europe/Berlin
    #[arg(long)]
    timezone: Option<String>,

    #[arg(long)]
    cycles: Option<i64>,

    /// Maximum drift correction per cycle, e.g. 20m
    #[arg(long)]
    correction: Option<String>,

    /// Minimum spacing between notifications, e.g. 1h
    #[arg(long)]
    ping_interval: Option<String>,

    /// Local time of the last cycle of the day, HH:MM
    #[arg(long)]
    anchor: Option<String>,

    /// Label shown on every other cycle
    #[arg(long, conflicts_with = "no_alternating")]
    alternating: Option<String>,

    #[arg(long)]
    no_alternating: bool,

    #[arg(long)]
    message: Option<String>,

    /// 1 off, 2 ping and number, 3 name only, 4 custom text
    #[arg(long)]
    tts: Option<u8>,

    #[arg(long)]
    tts_custom: Option<String>,

    #[arg(long)]
    response: Option<String>,

    /// Comma separated emote ids, one per cycle
    #[arg(long, conflicts_with = "no_emotes")]
    emotes: Option<String>,

    #[arg(long)]
    no_emotes: bool,

    /// #rrggbb
    #[arg(long)]
    color: Option<String>,

    /// Suppress notifications for this long, e.g. 2h
    #[arg(long, conflicts_with = "unmute")]
    mute_for: Option<String>,

    #[arg(long)]
    unmute: bool,
}

pub fn run(svc: &Service, cmd: ReminderCommand) -> Result<()> {
    match cmd {
        ReminderCommand::List { query } => {
            let reminders = svc.get_reminders(&query.query())?;
            print_json(&reminders)
        }
        ReminderCommand::Set { id, fields } => {
            let now = Utc::now();
            let patch = build_patch(&fields, now)?;
            if patch.is_empty() {
                bail!("nothing to set (pass at least one field)");
            }
            let reminder = svc.put_reminder(id.key(), &patch, now)?;
            print_json(&reminder)
        }
        ReminderCommand::Delete { id } => {
            svc.delete_reminder(id.key())?;
            print_json(&serde_json::json!({ "deleted": id.key() }))
        }
    }
}

fn build_patch(args: &SetArgs, now: chrono::DateTime<Utc>) -> Result<ReminderPatch> {
    let mut patch = match &args.json {
        Some(raw) => serde_json::from_str::<ReminderPatch>(raw).context("parse --json patch")?,
        None => ReminderPatch::default(),
    };

    if args.channel.is_some() {
        patch.channel = args.channel;
    }
    if args.timezone.is_some() {
        patch.timezone = args.timezone.clone();
    }
    if args.cycles.is_some() {
        patch.cycles_per_day = args.cycles;
    }
    if let Some(spec) = &args.correction {
        patch.correction_secs = Some(seconds(spec)?);
    }
    if let Some(spec) = &args.ping_interval {
        patch.ping_interval_secs = Some(seconds(spec)?);
    }
    if args.anchor.is_some() {
        patch.anchor_time = args.anchor.clone();
    }
    if let Some(label) = &args.alternating {
        patch.show_alternating = Some(Some(label.clone()));
    }
    if args.no_alternating {
        patch.show_alternating = Some(None);
    }
    if args.message.is_some() {
        patch.ping_message = args.message.clone();
    }
    if args.tts.is_some() {
        patch.tts = args.tts;
    }
    if let Some(text) = &args.tts_custom {
        patch.tts_custom = Some(Some(text.clone()));
    }
    if args.response.is_some() {
        patch.response_message = args.response.clone();
    }
    if let Some(list) = &args.emotes {
        patch.response_emotes = Some(Some(list.clone()));
    }
    if args.no_emotes {
        patch.response_emotes = Some(None);
    }
    if args.color.is_some() {
        patch.color_hex = args.color.clone();
    }
    if let Some(spec) = &args.mute_for {
        let until = now
            .checked_add_signed(parse_duration_spec(spec)?)
            .with_context(|| format!("--mute-for {spec} reaches past the latest supported date"))?;
        patch.mute_until_utc = Some(until.to_rfc3339());
    }
    if args.unmute {
        patch.mute_until_utc = Some(now.to_rfc3339());
    }

    Ok(patch)
}

fn seconds(spec: &str) -> Result<i64> {
    Ok(parse_duration_spec(spec)?.num_seconds())
}
