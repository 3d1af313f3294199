// moodcam - webcam emotion detection with a small read-only HTTP API
//
// The detection loop runs on its own thread and publishes into a shared
// slot; the axum server reads that slot and the remote detection log.

use anyhow::Context;
use clap::Parser;
use moodcam_archive::{Archive, MemoryArchive, SupabaseArchive};
use moodcam_core::{LatestSlot, MoodcamConfig};
use moodcam_eye::{DetectionHandle, LoopStatus, StopReason};
use moodcam_server::{create_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "moodcam=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(name = "moodcam-server")]
#[command(about = "Webcam emotion detection with an HTTP API", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Capture device index
    #[arg(long)]
    camera: Option<u32>,

    /// ONNX model path
    #[arg(long)]
    model: Option<PathBuf>,

    /// Disable the preview window
    #[arg(long)]
    headless: bool,

    /// Keep detections in memory instead of Supabase
    #[arg(long)]
    memory_archive: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = load_config(&args)?;
    info!(
        "Starting moodcam (camera {}, model {})",
        config.camera.device_index,
        config.detection.model_path.display()
    );

    let archive = create_archive(&config, args.memory_archive)?;
    info!("Archive backend: {}", archive.name());

    let latest = LatestSlot::new();
    let detection = start_detection(&config, archive.clone(), latest.clone())?;

    let mut state = AppState::new(latest, archive).with_log_limit(config.server.log_limit);
    if let Some(handle) = &detection {
        state = state.with_loop_status(handle.status());
    }

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    let status = detection.as_ref().map(|handle| handle.status());
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(wait_for_shutdown(status))
        .await
        .context("HTTP server failed")?;

    shutdown_gracefully(detection).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Defaults, then the TOML file, then the environment, then flags.
fn load_config(args: &Args) -> anyhow::Result<MoodcamConfig> {
    let mut config = match &args.config {
        Some(path) => MoodcamConfig::from_file(path)?,
        None => MoodcamConfig::default(),
    };
    config.apply_env()?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(camera) = args.camera {
        config.camera.device_index = camera;
    }
    if let Some(model) = &args.model {
        config.detection.model_path = model.clone();
    }
    if args.headless {
        config.detection.preview = false;
    }

    config.validate()?;
    Ok(config)
}

fn create_archive(config: &MoodcamConfig, in_memory: bool) -> anyhow::Result<Arc<dyn Archive>> {
    if in_memory {
        warn!("Using the in-memory archive; detections are lost on exit");
        return Ok(Arc::new(MemoryArchive::new()));
    }
    let archive = SupabaseArchive::new(&config.archive)
        .context("Supabase is not configured (set SUPABASE_URL and SUPABASE_KEY, or pass --memory-archive)")?;
    Ok(Arc::new(archive))
}

#[cfg(feature = "vision")]
fn start_detection(
    config: &MoodcamConfig,
    archive: Arc<dyn Archive>,
    latest: LatestSlot,
) -> anyhow::Result<Option<DetectionHandle>> {
    let runtime = tokio::runtime::Handle::current();
    let handle = moodcam_eye::live::start_live_loop(config, archive, latest, runtime)
        .context("Failed to start the detection loop")?;
    Ok(Some(handle))
}

#[cfg(not(feature = "vision"))]
fn start_detection(
    _config: &MoodcamConfig,
    _archive: Arc<dyn Archive>,
    _latest: LatestSlot,
) -> anyhow::Result<Option<DetectionHandle>> {
    warn!("Built without the `vision` feature; serving the API only");
    Ok(None)
}

/// Resolves on Ctrl+C, SIGTERM, or when the detection loop ends on its own.
async fn wait_for_shutdown(detection: Option<LoopStatus>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let loop_exit = async {
        match detection {
            Some(status) => status.stopped().await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = terminate => info!("Shutdown signal received"),
        _ = loop_exit => info!("Detection loop ended, shutting down"),
    }
}

/// Stop the loop and wait for its thread; an in-flight upload finishes first.
async fn shutdown_gracefully(detection: Option<DetectionHandle>) -> anyhow::Result<()> {
    let Some(handle) = detection else {
        info!("Server stopped");
        return Ok(());
    };

    handle.stop();
    let outcome = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("Detection thread join failed")?;

    match outcome {
        Ok(StopReason::Quit) => info!("Server stopped"),
        Ok(StopReason::DeviceLost(reason)) => warn!("Server stopped after losing the camera: {}", reason),
        Err(e) => {
            error!("Detection loop failed: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}
