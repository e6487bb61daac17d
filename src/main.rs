//! xiaoai-relay: local control server for a XiaoAi smart speaker.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::process::Command;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use xiaoai_relay::api::{self, AppState};
use xiaoai_relay::config::Settings;
use xiaoai_relay::controller::{SceneController, SceneTimings};
use xiaoai_relay::device::select_gateway;
use xiaoai_relay::store::ConfigStore;

#[derive(Parser, Debug)]
#[command(name = "xiaoai-relay", about = "Local control server for a XiaoAi speaker")]
struct Args {
    /// Path to xiaoai-relay.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides settings)
    #[arg(short, long)]
    port: Option<u16>,

    /// Use the mock device even if Mijia credentials are present
    #[arg(long)]
    mock: bool,

    /// Do not open the front end in a browser
    #[arg(long)]
    no_browser: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Keep hyper/reqwest internals out of the log unless asked
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,hyper_util=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,hyper_util=warn,reqwest=warn,tower_http=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("xiaoai-relay starting");

    let mut settings = Settings::load(args.config.as_deref());
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let device = select_gateway(&settings.device, args.mock);
    let controller = Arc::new(SceneController::new(device, SceneTimings::default()));

    let store = Arc::new(ConfigStore::new(settings.paths.config_file()));
    let assets_dir = settings.paths.assets_dir();
    info!("Config file: {}", store.path().display());
    info!("Serving front end from {}", assets_dir.display());

    let state = AppState { controller, store };
    let app = api::router(state, &assets_dir);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting XiaoAi relay on {addr}...");

    if settings.server.open_browser && !args.no_browser {
        let url = format!("http://127.0.0.1:{}", settings.server.port);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            open_browser(&url).await;
        });
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("xiaoai-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Open `url` with the platform's default handler.
async fn open_browser(url: &str) {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };

    match cmd
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) if status.success() => debug!("Opened {url} in browser"),
        Ok(status) => warn!("Browser launcher exited with {status}"),
        Err(e) => warn!("Failed to open browser: {e}"),
    }
}
