//! Sandbox command-line entry point.
//!
//! # Responsibility
//! - Expose diff, publish and undo against one SQLite database file.
//! - Print results and emitted notifications as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use sandbox_core::{
    init_logging_from_config, open_db, EngineConfig, MemoryNotificationSink, SandboxContext,
    SandboxItem, SandboxService, SqliteGraphStore, SqliteSchemaRepository,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sandbox")]
#[command(about = "Review, publish or discard workspace changes")]
struct Cli {
    /// SQLite database file; created and migrated when missing
    #[arg(long, global = true, default_value = "sandbox.db")]
    db: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List pending workspace changes
    Diff {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        user: String,
    },

    /// Publish items from the workspace to the public graph
    Publish {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        user: String,
        /// JSON array of items; `-` reads stdin
        #[arg(long)]
        items: PathBuf,
    },

    /// Discard workspace changes
    Undo {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        user: String,
        /// JSON array of items; `-` reads stdin
        #[arg(long)]
        items: PathBuf,
    },
}

#[derive(Serialize)]
struct BatchOutput<T: Serialize> {
    result: T,
    notifications: Vec<sandbox_core::Notification>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    init_logging_from_config(&config.logging)?;

    let conn = open_db(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;
    let store = SqliteGraphStore::try_new(&conn)?;
    let schema = SqliteSchemaRepository::try_new(&conn)?;
    let mut service = SandboxService::new(store, schema).with_config(config);
    let sink = Arc::new(MemoryNotificationSink::new("cli"));
    service.register_sink(sink.clone())?;

    match cli.command {
        Command::Diff { workspace, user } => {
            let ctx = SandboxContext::new(workspace, user)?;
            let items = service.diff(&ctx)?;
            print_json(&items)
        }
        Command::Publish {
            workspace,
            user,
            items,
        } => {
            let ctx = SandboxContext::new(workspace, user)?;
            let items = read_items(&items)?;
            info!("event=cli_publish module=cli status=start items={}", items.len());
            let result = service.publish(items, &ctx)?;
            print_json(&BatchOutput {
                result,
                notifications: sink.drain(),
            })
        }
        Command::Undo {
            workspace,
            user,
            items,
        } => {
            let ctx = SandboxContext::new(workspace, user)?;
            let items = read_items(&items)?;
            info!("event=cli_undo module=cli status=start items={}", items.len());
            let result = service.undo(items, &ctx)?;
            print_json(&BatchOutput {
                result,
                notifications: sink.drain(),
            })
        }
    }
}

fn read_items(path: &Path) -> Result<Vec<SandboxItem>> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading items from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&text).context("items must be a JSON array of sandbox items")
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
