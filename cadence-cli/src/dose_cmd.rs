use anyhow::{Context, Result};
use cadence_core::time::{parse_duration_spec, parse_instant};
use chrono::{DateTime, Utc};
use clap::Subcommand;

use crate::{IdArgs, Service, print_json};

#[derive(Subcommand, Debug)]
pub enum DoseCommand {
    /// Record a dose (now, unless --at or --ago is given)
    Take {
        #[command(flatten)]
        id: IdArgs,

        /// Instant with an explicit offset, e.g. 2024-05-01T08:15:00+02:00
        #[arg(long, conflicts_with = "ago")]
        at: Option<String>,

        /// How long ago, e.g. 25m or 1h5m
        #[arg(long)]
        ago: Option<String>,
    },

    /// Remove the most recently recorded dose
    Undo {
        #[command(flatten)]
        id: IdArgs,
    },
}

pub fn run(svc: &Service, cmd: DoseCommand) -> Result<()> {
    match cmd {
        DoseCommand::Take { id, at, ago } => {
            let now = Utc::now();
            let at = resolve_at(at.as_deref(), ago.as_deref(), now)?;
            let ack = svc.report_taken(id.key(), at, now)?;
            print_json(&ack)
        }
        DoseCommand::Undo { id } => {
            let undone = svc.undo_taken(id.key())?;
            print_json(&serde_json::json!({ "undone": undone }))
        }
    }
}

fn resolve_at(at: Option<&str>, ago: Option<&str>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    if let Some(text) = at {
        return Ok(Some(parse_instant(text)?));
    }
    if let Some(spec) = ago {
        let at = now
            .checked_sub_signed(parse_duration_spec(spec)?)
            .with_context(|| format!("--ago {spec} reaches before the earliest supported date"))?;
        return Ok(Some(at));
    }
    Ok(None)
}
