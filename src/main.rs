//! onair-desk
//!
//! On-air state engine for live dance-competition broadcasts. Serves the
//! current and next title lines to OBS browser overlays, journals every
//! change for undo/redo and bridges program/preview stills from OBS to the
//! operator console.

mod capture;
mod catalog;
mod config;
mod error;
mod logging;
mod onair;
mod overlay;
mod presets;
mod server;
mod settings;

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use capture::ObwsConnector;
use catalog::JsonCatalog;
use config::Config;
use onair::{OnAirDesk, TextOutputs};
use overlay::{CaptureStatusPoller, OverlayMode, OverlayPoller};
use presets::PresetStore;
use server::AppContext;
use settings::SettingsStore;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Serve,
    Watch {
        server: Option<String>,
        mode: OverlayMode,
    },
}

fn parse_args(args: &[String]) -> Result<Command> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Command::Help);
    }

    let mut rest = args.iter();
    match rest.next().map(String::as_str) {
        None | Some("serve") => Ok(Command::Serve),
        Some("watch") => {
            let mut server = None;
            let mut mode = OverlayMode::Current;
            while let Some(flag) = rest.next() {
                match flag.as_str() {
                    "--server" => {
                        server = Some(rest.next().context("--server needs a URL")?.clone());
                    }
                    "--mode" => {
                        mode = OverlayMode::parse(rest.next().context("--mode needs a value")?);
                    }
                    other => bail!("Unknown option for watch: {}", other),
                }
            }
            Ok(Command::Watch { server, mode })
        }
        Some(other) => bail!("Unknown command: {} (see --help)", other),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        print_help();
        return Ok(());
    }

    let _log_guard = logging::init_logging()?;
    info!("onair-desk starting...");

    let config = Config::load()?;
    info!("Configuration loaded from {:?}", config.config_path()?);

    let runtime = tokio::runtime::Runtime::new()?;

    // Ctrl+C flips the shutdown flag that the server and pollers watch
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let _ = shutdown_tx.send(true);
    })?;

    let result = runtime.block_on(async move {
        match command {
            Command::Serve => run_server(&config, shutdown_rx).await,
            Command::Watch { server, mode } => run_watch(&config, server, mode, shutdown_rx).await,
            Command::Help => Ok(()),
        }
    });

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    info!("Shutdown complete");
    result
}

async fn run_server(config: &Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    info!("Data directory: {:?}", data_dir);

    let catalog = JsonCatalog::load(&data_dir)?;
    let settings = SettingsStore::load(&data_dir)?;
    let presets = PresetStore::load(&data_dir)?;
    info!("OBS endpoint: {}", settings.current().await.endpoint());

    let outputs = TextOutputs::new(config.output_dir()?);
    info!("Text source files: {:?}", outputs.dir());
    let desk = OnAirDesk::new(config.history.capacity).with_outputs(outputs);

    let ctx = Arc::new(AppContext::new(
        desk,
        Arc::new(catalog),
        Arc::new(settings),
        Arc::new(presets),
        Arc::new(ObwsConnector),
        config.capture.timeouts(),
    ));

    server::serve(
        ctx,
        &config.listen_address(),
        Some(config.server.public_dir.as_path()),
        shutdown,
    )
    .await
}

async fn run_watch(
    config: &Config,
    server: Option<String>,
    mode: OverlayMode,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let base_url = server.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.server.http_port));

    let overlay = OverlayPoller::new(
        base_url.clone(),
        mode,
        Duration::from_millis(config.overlay.state_interval_ms),
        Duration::from_millis(config.overlay.settings_interval_ms),
        config.overlay.hide_empty,
    );
    let status = CaptureStatusPoller::new(
        base_url,
        Duration::from_millis(config.overlay.status_interval_ms),
    );

    let status_task = tokio::spawn(status.run(shutdown.clone()));
    overlay.run(shutdown).await;
    status_task.await.context("Capture status poller panicked")?;
    Ok(())
}

fn print_help() {
    println!("onair-desk - On-air titles and OBS capture bridge for live overlays");
    println!();
    println!("USAGE:");
    println!("    onair-desk [COMMAND] [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    serve                 Run the HTTP server (default)");
    println!("    watch                 Follow a running server like an overlay would");
    println!();
    println!("WATCH OPTIONS:");
    println!("    --server <URL>        Server to follow (default http://127.0.0.1:<http_port>)");
    println!("    --mode <current|next> Which line to follow (default current)");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG              Set log level (e.g., debug, info, warn)");
    println!("    ONAIR_DESK_CONFIG     Path to config.toml");
    println!("    ONAIR_DESK_LOG_PATH   Directory for log files");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_command_is_serve() {
        assert_eq!(parse_args(&args(&[])).unwrap(), Command::Serve);
        assert_eq!(parse_args(&args(&["serve"])).unwrap(), Command::Serve);
    }

    #[test]
    fn test_help_wins() {
        assert_eq!(parse_args(&args(&["watch", "--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn test_watch_options() {
        let command = parse_args(&args(&[
            "watch",
            "--server",
            "http://desk.local:3000",
            "--mode",
            "next",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Watch {
                server: Some("http://desk.local:3000".into()),
                mode: OverlayMode::Next,
            }
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse_args(&args(&["launch"])).is_err());
        assert!(parse_args(&args(&["watch", "--server"])).is_err());
        assert!(parse_args(&args(&["watch", "--verbose"])).is_err());
    }
}
