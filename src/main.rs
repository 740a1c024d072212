//! EchoBot - Automated Livestreaming Agent
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use echobot::ama::{AmaReplyGenerator, ElevenLabsTts, OpenAiChat, VoiceReplyGenerator};
use echobot::config::Config;
use echobot::events::EventClient;
use echobot::flow::RadioFlow;
use echobot::obs::{ObsConnect, ObsControl, WebSocketConnector};
use echobot::playlist::Playlist;
use echobot::schedule::Schedule;

/// EchoBot - automated livestreaming agent for OBS
#[derive(Parser, Debug)]
#[command(name = "echobot", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Playlist file (overrides config)
    #[arg(long)]
    playlist: Option<PathBuf>,

    /// Schedule file (overrides config)
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", echobot::NAME, echobot::VERSION);

    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(path) = args.playlist {
        config.flow.playlist_path = path;
    }
    if let Some(path) = args.schedule {
        config.flow.schedule_path = path;
    }

    config.validate()?;

    let playlist = Playlist::load(
        &config.flow.playlist_path,
        Some(config.flow.dj_total_duration),
    )?;
    let schedule = Schedule::load(&config.flow.schedule_path)?;
    info!("Loaded {} playlist items", playlist.len());

    let connector: Arc<dyn ObsConnect> =
        Arc::new(WebSocketConnector::new(&config.obs, &config.audio));
    let obs = connect_with_retry(connector.as_ref()).await?;

    let ama = build_ama(&config);
    let events = EventClient::from_config(&config.events);
    info!(
        "AMA reply generation: {}",
        if ama.is_some() { "enabled" } else { "disabled" }
    );
    info!(
        "Event notifications: {}",
        if events.is_some() { "enabled" } else { "disabled" }
    );

    let mut flow = RadioFlow::new(
        obs,
        Arc::clone(&connector),
        schedule,
        playlist,
        &config,
        ama,
        events,
    );

    // SIGINT/SIGTERM clear the running token; the loop finishes the current
    // item and exits
    let running = flow.running_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        running.cancel();
    });

    flow.start().await;

    info!("EchoBot stopped");
    Ok(())
}

/// Connect to OBS, retrying a few times before giving up
async fn connect_with_retry(connector: &dyn ObsConnect) -> anyhow::Result<Arc<dyn ObsControl>> {
    let max_retries = 5;
    let mut retry_count = 0;

    loop {
        match connector.connect().await {
            Ok(obs) => return Ok(obs),
            Err(e) => {
                retry_count += 1;
                if retry_count >= max_retries {
                    anyhow::bail!("Failed to connect to OBS: {}", e);
                }
                warn!(
                    "Failed to connect to OBS (attempt {}/{}): {}",
                    retry_count, max_retries, e
                );
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Wire up the AMA reply pipeline when fully configured
fn build_ama(config: &Config) -> Option<Arc<dyn VoiceReplyGenerator>> {
    if !config.ama.enabled {
        return None;
    }

    let Some(model) = OpenAiChat::from_config(&config.ama) else {
        warn!("AMA enabled but no chat API key configured, disabling");
        return None;
    };
    let Some(tts) = ElevenLabsTts::from_config(&config.ama, config.media.voice_output_dir())
    else {
        warn!("AMA enabled but ElevenLabs key/voice not configured, disabling");
        return None;
    };

    let personality = match &config.ama.personality_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read personality file {}: {}", path.display(), e);
                String::new()
            }
        },
        None => String::new(),
    };

    Some(Arc::new(AmaReplyGenerator::new(
        Arc::new(model),
        Arc::new(tts),
        personality,
    )))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
