/// Soul Queue CLI - build a playback queue against a catalog service
mod controller;
mod ids;
mod settings;

use anyhow::Context;
use clap::{Parser, Subcommand};
use controller::LoggingController;
use settings::Settings;
use soul_catalog::HttpCatalogClient;
use soul_queue::{
    BuildOptions, PlaylistOrder, QueueEvent, QueueOrchestrator, QueueSnapshot, TrackId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "queue-cli")]
#[command(about = "Build a Soul Player queue from a list of track ids", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./config.toml when present)
    #[arg(short, long, global = true, env = "SOUL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a track within a list and wait for the queue to load
    Play {
        /// Track to start with
        #[arg(short, long)]
        target: i64,
        /// File with track ids (whitespace or comma separated)
        #[arg(short, long)]
        ids_file: PathBuf,
        /// Tracks around the target loaded first
        #[arg(long)]
        window: Option<usize>,
        /// Background batch size
        #[arg(long)]
        chunk: Option<usize>,
        /// Catalog calls in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the fingerprint of a list
    Fingerprint {
        /// File with track ids
        #[arg(short, long)]
        ids_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soul_queue=info,soul_catalog=info,queue_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            target,
            ids_file,
            window,
            chunk,
            concurrency,
        } => {
            let settings = Settings::load(cli.config.as_deref())?;
            let mut options = BuildOptions::from(&settings.queue);
            if let Some(window) = window {
                options.window_size = window;
            }
            if let Some(chunk) = chunk {
                options.background_chunk_size = chunk;
            }
            if let Some(concurrency) = concurrency {
                options.concurrency = concurrency;
            }
            play(settings, TrackId(target), &ids_file, options).await?;
        }
        Commands::Fingerprint { ids_file } => {
            let ids = ids::read_ids(&ids_file)?;
            let order = PlaylistOrder::new(&ids);
            let fingerprint = order.fingerprint();
            println!(
                "tracks={} first={} last={} hash={}",
                fingerprint.len,
                fingerprint.first.map_or_else(|| "-".to_string(), |id| id.to_string()),
                fingerprint.last.map_or_else(|| "-".to_string(), |id| id.to_string()),
                fingerprint.hash
            );
        }
    }

    Ok(())
}

async fn play(
    settings: Settings,
    target: TrackId,
    ids_file: &std::path::Path,
    options: BuildOptions,
) -> anyhow::Result<()> {
    let ids = ids::read_ids(ids_file)?;
    info!(tracks = ids.len(), track_id = %target, "Loaded track list");

    let catalog = HttpCatalogClient::new(settings.catalog.clone())
        .context("Failed to create catalog client")?;
    let queue = QueueOrchestrator::new(
        Arc::new(catalog),
        Box::new(LoggingController::default()),
        settings.queue.clone(),
    );

    let events = tokio::spawn(log_events(queue.subscribe()));

    let mut handle = queue.play_target(target, &ids, options).await?;
    let index = handle.playable().await?;
    info!(index, "Target playing");
    handle.settled().await?;

    print_snapshot(&queue.snapshot());
    if queue.breaker().is_open() {
        warn!("Background loading paused by risk control; queue is partial");
    }

    events.abort();
    Ok(())
}

async fn log_events(mut rx: broadcast::Receiver<QueueEvent>) {
    loop {
        match rx.recv().await {
            Ok(QueueEvent::RiskControlTripped { message, .. }) => warn!("{}", message),
            Ok(QueueEvent::Error { message }) => warn!("{}", message),
            Ok(QueueEvent::PhaseCompleted { session, phase }) => {
                info!(session = %session, ?phase, "Phase complete");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_snapshot(snapshot: &QueueSnapshot) {
    let placeholders = snapshot.entries.iter().filter(|e| e.is_placeholder()).count();
    for (index, entry) in snapshot.entries.iter().enumerate() {
        let marker = if index == snapshot.current_index { ">" } else { " " };
        let artists = entry
            .metadata
            .as_ref()
            .map(|meta| meta.artist_line())
            .unwrap_or_default();
        println!(
            "{} {:>5}  {:<12} {} {}",
            marker,
            index,
            entry.track_id.to_string(),
            entry.display_title(),
            artists
        );
    }
    println!(
        "{} tracks queued, {} without metadata",
        snapshot.len(),
        placeholders
    );
}
