//! reelsmax - command line entry point

use clap::{Parser, Subcommand};
use reelsmax::{platforms, Config, LogSurface, Monitor, RelaySurface, ReplaySource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reelsmax", version, about = "Pause short videos while the AI is idle")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the known AI providers
    Profiles,

    /// Show the provider profile used for an origin
    Resolve { origin: String },

    /// List the short-video platforms
    Platforms,

    /// Run the monitor over recorded HTML snapshots, one per tick
    Replay {
        /// Origin of the chat page the snapshots were taken from
        #[arg(long)]
        origin: String,

        #[arg(required = true)]
        snapshots: Vec<PathBuf>,

        /// Also emit native messaging frames on stdout
        #[arg(long)]
        native: bool,

        /// Override the poll interval
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::read(path)?,
        None => Config::load(),
    };

    // Logs go to stderr, stdout may carry native messaging frames
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Profiles => {
            let registry = config.heuristic_registry();
            for profile in registry.profiles() {
                println!("{:<20} {}", profile.origin_match, profile.name);
            }
            println!("default: {}", registry.default_profile().name);
        }
        Command::Resolve { origin } => {
            let registry = config.heuristic_registry();
            let profile = registry.resolve(&origin);
            println!("{} ({})", profile.name, profile.origin_match);
            for rule in &profile.rules {
                println!("  rule      {}", rule.as_str());
            }
            for rule in &profile.fallback_rules {
                println!("  fallback  {}", rule.as_str());
            }
        }
        Command::Platforms => {
            for platform in platforms::PLATFORMS {
                let marker = if platform.key == config.playback.default_platform {
                    "*"
                } else {
                    " "
                };
                println!("{} {:<10} {:<20} {}", marker, platform.key, platform.label, platform.url);
            }
        }
        Command::Replay {
            origin,
            snapshots,
            native,
            interval_ms,
        } => {
            if !config.general.enabled {
                info!("Monitoring is disabled in configuration, exiting");
                return Ok(());
            }
            if let Some(ms) = interval_ms {
                config.timing.poll_interval_ms = ms;
            }

            let mut pages = Vec::with_capacity(snapshots.len());
            for path in &snapshots {
                pages.push(tokio::fs::read_to_string(path).await?);
            }
            info!("Loaded {} snapshots", pages.len());

            let source = ReplaySource::new(pages);
            let drained = source.drained();

            let mut monitor = Monitor::from_config(&config, &origin, source);
            let platform = platforms::find_or_default(&config.playback.default_platform);
            monitor
                .controller_mut()
                .attach(Arc::new(LogSurface::new(format!("log:{}", platform.key))));
            if native {
                monitor.controller_mut().attach(Arc::new(RelaySurface::new(
                    "native:sidepanel",
                    tokio::io::stdout(),
                )));
            }

            let handle = monitor.spawn();

            let mut status = handle.status();
            tokio::spawn(async move {
                while status.changed().await.is_ok() {
                    let label = status.borrow_and_update().label();
                    info!("Status: {}", label);
                }
            });

            tokio::select! {
                _ = drained.notified() => info!("All snapshots replayed"),
                _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
            }

            let report = handle.stop().await?;
            info!(
                "{}: {} ticks, {} edges, {} surfaces, ended {:?}",
                report.provider, report.ticks, report.edges, report.surfaces, report.phase
            );
        }
    }

    Ok(())
}
