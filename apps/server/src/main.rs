//! Roomcast Server - headless Sonos control and media server.
//!
//! Discovers the household's Sonos speakers, exposes REST endpoints that
//! drive them (play, pause, skip, volume, preset playlists), and hosts the
//! MP3 files the speakers stream back over the LAN.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roomcast_core::{
    bootstrap_services, start_server, LocalIpDetector, MediaLibrary, NetworkContext,
};
use tokio::signal;

use crate::config::ServerConfig;

/// Roomcast Server - Sonos control surface and media host.
#[derive(Parser, Debug)]
#[command(name = "roomcast-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "ROOMCAST_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "ROOMCAST_BIND_PORT")]
    port: Option<u16>,

    /// Advertise IP address (overrides config file).
    #[arg(short = 'a', long, env = "ROOMCAST_ADVERTISE_IP")]
    advertise_ip: Option<std::net::IpAddr>,

    /// Default speaker for commands that don't name one.
    #[arg(short = 's', long, env = "ROOMCAST_DEFAULT_SPEAKER")]
    default_speaker: Option<String>,

    /// Directory of MP3 files served under /music/.
    #[arg(short = 'm', long, env = "ROOMCAST_MEDIA_DIR")]
    media_dir: Option<PathBuf>,

    /// Prebuilt static site served under /ui/.
    #[arg(long, env = "ROOMCAST_SITE_DIR")]
    site_dir: Option<PathBuf>,

    /// List the files of a preset as JSON and exit (e.g. --list-preset 5).
    #[arg(long, value_name = "PRESET")]
    list_preset: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Roomcast Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(ip) = args.advertise_ip {
        config.advertise_ip = Some(ip);
    }
    if let Some(speaker) = args.default_speaker {
        config.default_speaker = Some(speaker);
    }
    if let Some(media_dir) = args.media_dir {
        config.media_dir = media_dir;
    }
    if let Some(site_dir) = args.site_dir {
        config.site_dir = Some(site_dir);
    }

    let library = Arc::new(MediaLibrary::new(&config.media_dir));

    // Utility mode: print a preset's files and exit.
    if let Some(preset) = args.list_preset {
        let files = library
            .preset_tracks(&preset)
            .with_context(|| format!("Failed to list files for preset {}", preset))?;
        println!("{}", serde_json::to_string(&files)?);
        return Ok(());
    }

    // Resolve advertise IP: use explicit config, or fall back to auto-detection
    let network = if let Some(ip) = config.advertise_ip {
        log::info!(
            "Configuration: bind_port={}, advertise_ip={}",
            config.bind_port,
            ip
        );
        NetworkContext::explicit(config.bind_port, ip)
    } else {
        log::info!(
            "Configuration: bind_port={}, advertise_ip=auto",
            config.bind_port
        );
        NetworkContext::auto_detect(config.bind_port, LocalIpDetector::arc()).context(
            "Failed to auto-detect the local IP address. \
             Please specify --advertise-ip or set ROOMCAST_ADVERTISE_IP to the IP \
             address that Sonos speakers can reach.",
        )?
    };

    log::info!("Media directory: {}", config.media_dir.display());
    match &config.site_dir {
        Some(dir) => log::info!("Serving /ui/ from {}", dir.display()),
        None => log::info!("No site directory configured - /ui/ is disabled"),
    }

    // Bootstrap services and start background discovery
    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, network, library);
    services.start_background_tasks();

    log::info!("Services bootstrapped, background discovery started");

    // Spawn the HTTP server
    let app_state = services.app_state(config.site_dir.clone());
    let shutdown = services.shutdown_token();
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));

    let server_task = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, bind_addr, shutdown).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;
    let _ = server_task.await;

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
