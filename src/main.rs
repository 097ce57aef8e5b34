// src/main.rs

//! studsync CLI: one-shot or periodic portal synchronization.
//!
//! Credentials are taken from the `STUDIP_USER` / `STUDIP_PASSWORD`
//! environment; interactive prompting is the caller's concern.

use std::env;
use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::TryRecvError;

use studsync::error::{AppError, Result};
use studsync::models::{ChangeEvent, Config};
use studsync::storage::SnapshotFile;
use studsync::utils::log as console;
use studsync::StudIp;

#[derive(Parser, Debug)]
#[command(
    name = "studsync",
    version,
    about = "Synchronizes a Stud.IP course portal into a local snapshot"
)]
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    /// Where the last published snapshot is persisted between runs
    #[arg(long, default_value = "data/snapshot.json")]
    state: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl-and-reconcile cycle
    Sync,
    /// Sync repeatedly at a fixed interval
    Watch {
        #[arg(long, default_value_t = 900)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(error) = run().await {
        log::error!("{error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(Path::new(&cli.config));
    let studip = StudIp::new(config)?;

    let user_name = env::var("STUDIP_USER")
        .map_err(|_| AppError::config("STUDIP_USER is not set"))?;
    let password = env::var("STUDIP_PASSWORD")
        .map_err(|_| AppError::config("STUDIP_PASSWORD is not set"))?;

    console::header("studsync");
    studip.login(&user_name, &password).await?;

    let state = SnapshotFile::new(&cli.state);
    if let Some(snapshot) = state.load().await? {
        console::sub_item(&format!(
            "restored previous snapshot with {} entities",
            snapshot.len()
        ));
        studip.restore(snapshot).await;
    }

    match cli.command {
        Command::Sync => sync_once(&studip, &state).await,
        Command::Watch { interval_secs } => {
            loop {
                if let Err(error) = sync_once(&studip, &state).await {
                    log::error!("sync failed: {error}");
                }
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            }
        }
    }
}

async fn sync_once(studip: &StudIp, state: &SnapshotFile) -> Result<()> {
    let mut events = studip.subscribe_changes();
    let outcome = studip.refresh().await?;

    loop {
        match events.try_recv() {
            Ok(event) => console::sub_item(&describe(&event)),
            Err(TryRecvError::Lagged(missed)) => {
                console::sub_item(&format!("({missed} earlier changes omitted from this report)"));
            }
            Err(_) => break,
        }
    }

    console::summary(
        "Sync",
        &[
            ("courses", outcome.courses.to_string()),
            ("entities", outcome.entities.to_string()),
            ("changes", outcome.events.to_string()),
            ("partial", outcome.partial.to_string()),
        ],
    );

    state.save(&studip.snapshot()).await?;
    console::success("snapshot persisted");
    Ok(())
}

fn describe(event: &ChangeEvent) -> String {
    match event {
        ChangeEvent::Added { id, entity } => format!("+ {} ({id})", entity.name()),
        ChangeEvent::Updated { id, new, .. } => format!("~ {} ({id})", new.name()),
        ChangeEvent::Removed { id, entity } => format!("- {} ({id})", entity.name()),
    }
}
