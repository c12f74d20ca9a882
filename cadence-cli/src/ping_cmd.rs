use anyhow::Result;
use cadence_core::{PingFilter, PingReport};
use chrono::Utc;
use clap::Subcommand;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::WatchSection;
use crate::{IdArgs, QueryArgs, Service, print_json};

#[derive(Subcommand, Debug)]
pub enum PingCommand {
    /// Show reports for reminders that are due, unmuted and past their ping interval
    Status {
        #[command(flatten)]
        query: QueryArgs,

        /// Also show reminders that are not due yet
        #[arg(long)]
        include_not_due: bool,

        /// Also show muted reminders
        #[arg(long)]
        include_muted: bool,

        /// Also show reminders pinged within their interval
        #[arg(long)]
        include_recently_pinged: bool,

        /// Show every matching reminder
        #[arg(long)]
        all: bool,
    },

    /// Record that a notification went out now
    Mark {
        #[command(flatten)]
        id: IdArgs,
    },

    /// Poll for ping-due reminders, print each as a JSON line and mark it pinged
    Watch {
        #[command(flatten)]
        query: QueryArgs,

        /// Poll interval in seconds (overrides [watch] interval_secs)
        #[arg(long)]
        interval: Option<u64>,

        /// Run a single poll and exit
        #[arg(long)]
        once: bool,
    },
}

pub async fn run(svc: &Service, cmd: PingCommand, watch_cfg: &WatchSection) -> Result<()> {
    match cmd {
        PingCommand::Status {
            query,
            include_not_due,
            include_muted,
            include_recently_pinged,
            all,
        } => {
            let filter = status_filter(all, include_not_due, include_muted, include_recently_pinged);
            let reports = svc.ping_status(&query.query(), filter, Utc::now())?;
            print_json(&reports)
        }
        PingCommand::Mark { id } => {
            svc.mark_pinged(id.key(), Utc::now())?;
            print_json(&serde_json::json!({ "pinged": id.key() }))
        }
        PingCommand::Watch { query, interval, once } => {
            let secs = interval.unwrap_or(watch_cfg.interval_secs).max(1);
            watch(svc, query, Duration::from_secs(secs), once).await
        }
    }
}

fn status_filter(all: bool, not_due: bool, muted: bool, recently_pinged: bool) -> PingFilter {
    if all {
        return PingFilter::none();
    }
    PingFilter {
        due: !not_due,
        muted: !muted,
        ping_due: !recently_pinged,
    }
}

async fn watch(svc: &Service, query: QueryArgs, every: Duration, once: bool) -> Result<()> {
    let query = query.query();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(interval_secs = every.as_secs(), "watching for due reminders");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("stopping watch");
                return Ok(());
            }
        }

        match poll_once(svc, &query) {
            Ok(n) if n > 0 => info!(sent = n, "ping round complete"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "ping round failed"),
        }

        if once {
            return Ok(());
        }
    }
}

fn poll_once(svc: &Service, query: &cadence_service::ReminderQuery) -> Result<usize> {
    let now = Utc::now();
    let reports = svc.ping_status(query, PingFilter::default(), now)?;
    let mut sent = 0;
    for report in &reports {
        emit(report)?;
        match svc.mark_pinged(report.reminder.id, now) {
            Ok(()) => sent += 1,
            Err(e) => warn!(reminder = %report.reminder.id, error = %e, "could not mark pinged"),
        }
    }
    Ok(sent)
}

fn emit(report: &PingReport) -> Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
