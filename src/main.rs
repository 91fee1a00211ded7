mod bridge;
mod config;
mod lifecycle;
mod platform;
mod sampling;
mod speed;
mod web;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::bridge::SpeedBus;
use crate::config::AppConfig;
use crate::lifecycle::{Directive, LifecycleCoordinator, LifecycleSignal};
use crate::platform::{ReplayProvider, StaticPermissions, Track};
use crate::sampling::{SamplingEngine, SignalState};

const STATUS_POLL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "speedo-track")]
#[command(about = "GPS speed tracking engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file
    Validate { config: String },
    /// Replay a recorded track through the sampling engine
    Replay {
        config: String,
        /// Track file, overrides `replay.track` from the config
        #[arg(long)]
        track: Option<PathBuf>,
        /// Print readings as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP host
    Serve { config: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Replay {
            config,
            track,
            json,
        } => replay(&config, track, json).await,
        Commands::Serve { config } => serve(&config).await,
    }
}

fn load_config(path: &str) -> Option<AppConfig> {
    match AppConfig::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading config {}: {}", path, e);
            None
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let sampling = &config.sampling;
    println!("Config is valid");
    println!(
        "  sampling: every {}ms (fastest {}ms), {}, wait for accurate fix: {}",
        sampling.interval_ms(),
        sampling.fastest_interval_ms(),
        sampling.accuracy,
        sampling.wait_for_accurate_fix
    );
    if let Some(stale) = sampling.stale_after {
        println!("  signal lost after {}", humantime::format_duration(stale));
    }
    let granted: Vec<String> = config
        .permissions
        .granted
        .iter()
        .map(|c| c.to_string())
        .collect();
    println!("  granted: [{}]", granted.join(", "));

    if let Some(replay) = &config.replay {
        match Track::from_file(&replay.track) {
            Ok(track) => println!(
                "  replay: {} ({} fixes over {})",
                replay.track.display(),
                track.fixes.len(),
                humantime::format_duration(track.duration())
            ),
            Err(e) => {
                eprintln!("Error reading track {}: {}", replay.track.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

async fn replay(path: &str, track_override: Option<PathBuf>, json: bool) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let replay_config = config.replay.clone();
    let Some(track_path) = track_override.or_else(|| replay_config.as_ref().map(|r| r.track.clone()))
    else {
        eprintln!("No track given (use --track or set replay.track)");
        return ExitCode::FAILURE;
    };

    let track = match Track::from_file(&track_path) {
        Ok(track) => track,
        Err(e) => {
            eprintln!("Error reading track {}: {}", track_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let (speedup, accuracy) = replay_config
        .map(|r| (r.speedup, r.accuracy))
        .unwrap_or((1.0, config.sampling.accuracy));
    let provider = Arc::new(ReplayProvider::new(track, speedup, accuracy));
    let permissions = Arc::new(StaticPermissions::new(
        config.permissions.granted.iter().copied(),
    ));
    let bus = SpeedBus::new(config.bridge.subscriber_buffer);

    let (printer, printer_task) = bus.subscribe_with(move |reading| {
        if json {
            match serde_json::to_string(&reading) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Failed to serialize reading: {}", e),
            }
        } else {
            println!(
                "{}  {:>8.1} m  {:>7.2} m/s  {:>7.2} km/h",
                reading.computed_at.format("%H:%M:%S"),
                reading.distance_m,
                reading.speed_mps,
                reading.speed_kmh
            );
        }
    });

    let engine = SamplingEngine::new(
        config.sampling.clone(),
        provider.clone(),
        permissions.clone(),
        bus.clone(),
    );
    let monitor = engine.monitor();
    let mut coordinator = LifecycleCoordinator::new(Arc::new(Mutex::new(engine)), permissions);

    match coordinator.handle(LifecycleSignal::StartRequested).await {
        Ok(directives) if directives.contains(&Directive::RequestPermission) => {
            eprintln!("Location permission not granted (see permissions.granted)");
            return ExitCode::FAILURE;
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Failed to start sampling: {}", e);
            return ExitCode::FAILURE;
        }
    }

    log::info!(
        "Replay will take about {}",
        humantime::format_duration(provider.playback_duration())
    );

    let interrupted = tokio::select! {
        _ = wait_for_end_of_track(&monitor) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        log::info!("Interrupted");
    }

    let handled = monitor.status().fixes_handled;
    if let Err(e) = coordinator.handle(LifecycleSignal::StopRequested).await {
        log::error!("Failed to stop sampling: {}", e);
    }

    // Dropping the subscription closes its queue once the printer drains it.
    bus.unsubscribe(printer);
    if let Err(e) = printer_task.await {
        log::error!("Reading printer failed: {}", e);
    }

    let stats = bus.stats();
    println!(
        "{} fixes handled, {} readings published, {} dropped",
        handled, stats.published, stats.dropped
    );
    ExitCode::SUCCESS
}

async fn wait_for_end_of_track(monitor: &sampling::EngineMonitor) {
    let mut ticker = tokio::time::interval(STATUS_POLL);
    loop {
        ticker.tick().await;
        if monitor.status().signal == SignalState::Ended {
            return;
        }
    }
}

async fn serve(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
