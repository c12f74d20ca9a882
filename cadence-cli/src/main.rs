use anyhow::Result;
use cadence_core::ReminderKey;
use cadence_service::{JsonFileStore, ReminderQuery, ReminderService};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

mod config;
mod dose_cmd;
mod logging;
mod ping_cmd;
mod reminder_cmd;
mod state;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CADENCE_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "cadence", version = VERSION, about = "Cyclical dose reminders with drift correction")]
struct Cli {
    /// Reminder store file (overrides [store] path in config.toml)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log level (overrides [log] level in config.toml)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, update, list and delete reminders
    Reminder {
        #[command(subcommand)]
        command: reminder_cmd::ReminderCommand,
    },

    /// Report or undo a dose
    Dose {
        #[command(subcommand)]
        command: dose_cmd::DoseCommand,
    },

    /// Inspect due reminders and record notifications
    Ping {
        #[command(subcommand)]
        command: ping_cmd::PingCommand,
    },

    /// Manage ~/.cadence/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,
    /// Print the effective configuration
    Show,
}

/// Full identity of one reminder.
#[derive(Args, Debug, Clone, Copy)]
pub struct IdArgs {
    #[arg(long)]
    pub guild: u64,
    #[arg(long)]
    pub member: u64,
    #[arg(long, default_value_t = 0)]
    pub key: u32,
}

impl IdArgs {
    pub fn key(&self) -> ReminderKey {
        ReminderKey {
            guild: self.guild,
            member: self.member,
            key: self.key,
        }
    }
}

/// Partial identity; omitted parts match anything.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct QueryArgs {
    #[arg(long)]
    pub guild: Option<u64>,
    #[arg(long)]
    pub member: Option<u64>,
    #[arg(long)]
    pub key: Option<u32>,
}

impl QueryArgs {
    pub fn query(&self) -> ReminderQuery {
        ReminderQuery {
            guild: self.guild,
            member: self.member,
            key: self.key,
        }
    }
}

pub type Service = ReminderService<JsonFileStore>;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log.level.clone());
    let format = cfg
        .log
        .format
        .parse::<logging::LogFormat>()
        .map_err(anyhow::Error::msg)?;
    logging::init_logging(&level, format)?;

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },

        Command::Reminder { command } => {
            let svc = open_service(&cfg, cli.store.as_deref())?;
            reminder_cmd::run(&svc, command)?;
        }

        Command::Dose { command } => {
            let svc = open_service(&cfg, cli.store.as_deref())?;
            dose_cmd::run(&svc, command)?;
        }

        Command::Ping { command } => {
            let svc = open_service(&cfg, cli.store.as_deref())?;
            ping_cmd::run(&svc, command, &cfg.watch).await?;
        }
    }

    Ok(())
}

fn open_service(cfg: &config::Config, store: Option<&std::path::Path>) -> Result<Service> {
    let path = cfg.store_path(store)?;
    tracing::debug!(store = %path.display(), "opening reminder store");
    Ok(ReminderService::new(JsonFileStore::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_store_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cadence", "dose", "take", "--guild", "1", "--member", "2", "--store", "/tmp/r.json",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/r.json")));
    }

    #[test]
    fn test_at_and_ago_conflict() {
        let res = Cli::try_parse_from([
            "cadence", "dose", "take", "--guild", "1", "--member", "2", "--at",
            "2024-01-01T00:00:00Z", "--ago", "1h",
        ]);
        assert!(res.is_err());
    }
}
