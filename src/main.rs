use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use remindme::config::Config;
use remindme::domains::reminder::{Reminder, ReminderStatus};
use remindme::error::Result;
use remindme::interfaces::clock::{Clock, SystemClock};
use remindme::interfaces::reminders::ReminderRepository;
use remindme::reminders::ReminderStore;
use remindme::timing;

#[derive(Parser, Debug)]
#[command(name = "remindme")]
#[command(about = "Inspect and manage the reminder store")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("REMINDME_GIT_SHA"), ")"))]
struct Cli {
    #[arg(long, env = "REMINDME_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the database path from the config file.
    #[arg(long, env = "REMINDME_DB")]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored reminders.
    List {
        #[arg(long, default_value = "pending")]
        status: ReminderStatus,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Show reminders that a dispatch pass would publish now.
    Due {
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Delete a reminder by source note id.
    Remove { source_id: String },
    /// Resolve a time expression without touching the store.
    Parse {
        text: String,
        /// Reference time in epoch milliseconds; defaults to now.
        #[arg(long)]
        reference_ms: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    remindme::logging::init_tracing("remindme_cli");
    let cli = Cli::parse();

    if let Command::Parse { text, reference_ms } = &cli.command {
        let reference = reference_ms.unwrap_or_else(|| SystemClock.now_ms());
        let resolved = timing::resolve_ms(text, reference);
        print_json(&json!({
            "text": text,
            "reference_ms": reference,
            "remind_at": resolved,
            "delay": resolved.map(|at| timing::describe_delay(at - reference)),
        }))?;
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    let store = ReminderStore::new(config.db_path()).await?;

    match cli.command {
        Command::List { status, limit } => {
            let rows = store.list(status, limit).await?;
            print_json(&json!({ "count": rows.len(), "reminders": rows_json(&rows) }))?;
        }
        Command::Due { limit } => {
            let now = SystemClock.now_ms();
            let rows = store.due_reminders(now, limit).await?;
            print_json(&json!({ "now": now, "count": rows.len(), "reminders": rows_json(&rows) }))?;
        }
        Command::Remove { source_id } => {
            let removed = store.remove(&source_id).await?;
            print_json(&json!({ "source_id": source_id, "removed": removed }))?;
        }
        Command::Parse { .. } => {}
    }
    Ok(())
}

fn rows_json(rows: &[Reminder]) -> Vec<serde_json::Value> {
    rows.iter()
        .map(|row| {
            json!({
                "source_id": row.source_id,
                "remind_at": row.remind_at,
                "published_id": row.published_id,
                "created_at": row.created_at,
                "target_routes": row.target_routes,
                "attempts": row.attempts,
                "retry_after": row.retry_after,
                "last_error": row.last_error,
                "abandoned_at": row.abandoned_at,
            })
        })
        .collect()
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
