mod config;
mod config_api;
mod error;
mod host;
mod install;
mod meeting;
mod models;
mod router;
mod sensor;
mod server_api;
mod status;
mod store;
mod stream;
#[cfg(test)]
mod testing;
mod timestamp;

use anyhow::{Context, Result};
use host::{DirectoryFiles, HostNetwork, HostPlatform, Network};
use sensor::{DirectorySensor, Sensor};
use std::future::IntoFuture;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use store::{ConfigHandle, ConfigStore, FileStore};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        eprintln!();
        anyhow::bail!("missing command (see usage above)");
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("camfeed-device {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "install" => {
            init_logging(&config::AppConfig::default().log_filter);
            install::run_install()
        }
        "run" => run().await,
        _ => {
            print_usage();
            anyhow::bail!("unknown command");
        }
    }
}

fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> Result<()> {
    let (settings, source) = config::load_config()?;
    init_logging(&settings.log_filter);
    match source {
        Some(path) => info!("loaded settings from {}", path.display()),
        None => info!("no settings file found; using defaults"),
    }

    let store = Arc::new(FileStore::new(
        settings.state_path.clone(),
        config::fallback_state_path().ok(),
    ));
    let config = match store.load() {
        Ok(device) => Some(ConfigHandle::new(device)),
        Err(err) => {
            error!(
                error = %format!("{:#}", err),
                "device config unreadable; config API disabled until it is repaired"
            );
            None
        }
    };

    let sensor = match DirectorySensor::open(&settings.frames_dir, settings.frame_buffers) {
        Ok(sensor) => sensor,
        Err(err) => {
            warn!(error = %format!("{:#}", err), "frame source unavailable");
            DirectorySensor::from_frames(Vec::new(), settings.frame_buffers)
        }
    };
    let sensor: Arc<dyn Sensor> = Arc::new(sensor);
    if sensor.is_ready() {
        if let Some(handle) = &config {
            let camera = handle.snapshot().await.camera;
            if !sensor.apply_settings(&camera) {
                warn!("initial camera settings rejected");
            }
        }
        info!(sensor = %sensor.sensor_name(), "camera ready");
    } else {
        warn!("camera init failed");
    }

    let network: Arc<dyn Network> = Arc::new(HostNetwork::new());
    let platform = Arc::new(HostPlatform::new(settings.has_external_ram));

    let meeting = match &config {
        Some(handle) => {
            let api = server_api::ServerApi::new(settings.heartbeat_timeout())?;
            let service = Arc::new(meeting::MeetingService::new(
                handle.clone(),
                network.clone(),
                platform.clone(),
                api,
            ));
            meeting::spawn(service.clone(), settings.tick_interval());
            Some(service)
        }
        None => None,
    };

    let state = router::AppState {
        config,
        store,
        sensor,
        network: network.clone(),
        platform,
        files: Arc::new(DirectoryFiles::new(settings.static_dir.clone())),
        meeting,
        stream: stream::StreamSettings {
            fps_limit: settings.stream_fps_limit,
            boundary: settings.stream_boundary.clone(),
        },
        reboot_delay: settings.reboot_delay(),
        restart_pending: Arc::new(AtomicBool::new(false)),
    };
    let app = router::create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("bind {}", settings.listen_addr))?;
    info!(
        "version={} ip={} listening on {}",
        env!("CARGO_PKG_VERSION"),
        network.current_ip(),
        settings.listen_addr
    );

    tokio::select! {
        result = axum::serve(listener, app).into_future() => result.context("http server")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  camfeed-device install");
    eprintln!("  camfeed-device run");
    eprintln!("  camfeed-device --help");
    eprintln!("  camfeed-device --version");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CAMFEED_DEVICE_CONFIG  path to the settings file");
    eprintln!("  RUST_LOG               log filter (overrides log_filter)");
}
