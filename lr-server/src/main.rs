//! LapReplay Server
//!
//! Loads a recorded (or synthetic) session, drives playback and serves the
//! render stream and control API.

use anyhow::{Context, Result};
use clap::Parser;
use lr_adapters::{DemoProvider, SessionCache, SessionFile, SessionFileProvider};
use lr_core::{ReplayConfig, ReplayMode, TelemetryProvider};
use lr_server::replay::{DriverSelection, ReplaySession};
use lr_server::{api, state, ticker};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lapreplay", version)]
#[command(about = "Replay recorded race telemetry with a live leaderboard")]
struct Cli {
    /// Session file to replay (.json, .json.zst or .lrs)
    #[arg(long, conflicts_with = "demo")]
    session: Option<PathBuf>,

    /// Replay a synthetic demo race instead of a session file
    #[arg(long)]
    demo: bool,

    /// Replay a session previously saved with --cache, by its name
    #[arg(long, conflicts_with_all = ["session", "demo"])]
    cached: Option<String>,

    /// Number of laps in the demo race
    #[arg(long, requires = "demo")]
    laps: Option<u32>,

    /// Replay mode: fastest (single best lap) or race (full session)
    #[arg(long, default_value = "fastest")]
    mode: ReplayMode,

    /// Entities to replay: ALL or a comma-separated list such as VER,NOR
    #[arg(long, default_value = "ALL")]
    drivers: DriverSelection,

    /// Tick frequency, overrides the config file
    #[arg(long)]
    fps: Option<u32>,

    /// JSON replay configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save the loaded session to this file (.json, .json.zst or .lrs)
    #[arg(long)]
    record: Option<PathBuf>,

    /// Also keep a copy of the loaded session in the platform cache directory
    #[arg(long)]
    cache: bool,

    /// HTTP port
    #[arg(long, default_value_t = 9100)]
    port: u16,
}

fn load_config(cli: &Cli) -> Result<ReplayConfig> {
    let mut config = match &cli.config {
        Some(path) => ReplayConfig::from_json_file(path)?,
        None => ReplayConfig::default(),
    };
    if let Some(fps) = cli.fps {
        config.fps = fps;
    }
    config.validate()?;
    Ok(config)
}

fn open_provider(cli: &Cli) -> Result<Option<Box<dyn TelemetryProvider>>> {
    if let Some(path) = &cli.session {
        let provider = SessionFileProvider::open(path)?;
        return Ok(Some(Box::new(provider)));
    }
    if let Some(key) = &cli.cached {
        let cache = SessionCache::platform_default()
            .context("No platform cache directory available")?;
        let provider = cache.provider(key)?;
        return Ok(Some(Box::new(provider)));
    }
    if cli.demo {
        let provider = match cli.laps {
            Some(laps) => DemoProvider::with_laps(laps),
            None => DemoProvider::new(),
        };
        return Ok(Some(Box::new(provider)));
    }
    Ok(None)
}

fn save_session(cli: &Cli, provider: &dyn TelemetryProvider) -> Result<()> {
    if cli.record.is_none() && !cli.cache {
        return Ok(());
    }

    let entities = cli.drivers.resolve(&provider.entities());
    let session = SessionFile::record(provider, &entities, provider.name())?;

    if let Some(path) = &cli.record {
        session.save(path)?;
    }
    if cli.cache {
        let cache = SessionCache::platform_default()
            .context("No platform cache directory available")?;
        let path = cache.store(provider.name(), &session)?;
        info!("Cached session at {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting LapReplay Server");

    let config = load_config(&cli)?;

    // Create application state
    let state = state::AppState::new(config.clone());

    match open_provider(&cli)? {
        Some(provider) => {
            save_session(&cli, provider.as_ref())?;

            let session = ReplaySession::load(provider.as_ref(), &cli.drivers, cli.mode, &config)?;
            *state.replay.write().await = Some(session);
            ticker::start(&state).await;
        }
        None => info!("No session given, waiting for an upload"),
    }

    // Build the router
    let app = api::create_router(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
