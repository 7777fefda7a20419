//! Tunnelit CLI - Reach a backend without a fixed address through a public proxy
//!
//! `tunnelit proxy` runs on the publicly reachable host. `tunnelit tunnel`
//! runs next to the backend server and keeps authenticated connections
//! parked at the proxy.

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tunnelit_lib::{ProxyServer, Settings, TunnelAgent, DEFAULT_IDLE_CONNS};

use crate::config::{load_config_file, log_destination, resolve_address, ConfigFile};
use crate::logging::init_logging;

/// Tunnelit - Expose a backend through a public proxy
#[derive(Parser, Debug)]
#[command(name = "tunnelit")]
#[command(about = "Tunnelit - Expose a backend through a public proxy")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Idle tunnel connections to keep [default: 10]
    #[arg(long, global = true)]
    idle_conns: Option<usize>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Shared tunnel password
    #[arg(
        long,
        env = "TUNNELIT_PASSWORD",
        hide_env_values = true,
        default_value = "",
        hide_default_value = true,
        hide = true
    )]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept clients and tunnel connections and splice them together
    #[command(long_about = r#"
Listen for clients on --addr and for tunnel agents on --paddr. Each client
is paired with one idle, authenticated tunnel connection and bytes are
relayed until either side closes.

EXAMPLES:
  TUNNELIT_PASSWORD=secret tunnelit proxy --addr 0.0.0.0:8080 --paddr 0.0.0.0:8081

ENVIRONMENT VARIABLES:
  TUNNELIT_PASSWORD  Password tunnel agents must present
    "#)]
    Proxy {
        /// Client listen address (e.g., 0.0.0.0:8080)
        #[arg(long)]
        addr: Option<String>,

        /// Tunnel listen address (e.g., 0.0.0.0:8081)
        #[arg(long)]
        paddr: Option<String>,
    },

    /// Keep connections parked at the proxy and bridge them to the backend
    #[command(long_about = r#"
Dial the proxy at --paddr, authenticate, and wait for a client. Once a
client is paired, dial the backend at --saddr and relay.

EXAMPLES:
  TUNNELIT_PASSWORD=secret tunnelit tunnel --paddr proxy.example.com:8081 --saddr 127.0.0.1:22

ENVIRONMENT VARIABLES:
  TUNNELIT_PASSWORD  Password presented to the proxy
    "#)]
    Tunnel {
        /// Proxy tunnel address (e.g., proxy.example.com:8081)
        #[arg(long)]
        paddr: Option<String>,

        /// Backend server address (e.g., 127.0.0.1:22)
        #[arg(long)]
        saddr: Option<String>,
    },
}

async fn run_proxy(settings: Settings, addr: String, paddr: String) -> Result<()> {
    let server = ProxyServer::bind(settings.proxy_config(addr, paddr))
        .await
        .context("Failed to start proxy")?;

    tokio::select! {
        result = server.run() => result.context("Proxy listener failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    }
}

async fn run_tunnel(settings: Settings, paddr: String, saddr: String) -> Result<()> {
    let agent = TunnelAgent::new(settings.agent_config(paddr, saddr))
        .context("Failed to create tunnel agent")?;

    tokio::select! {
        result = agent.run() => result.context("Tunnel agent stopped"),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // Setup logging
    let log_file = log_destination(cli.log.take(), file.log.clone());
    let _log_guard = init_logging(cli.verbose, log_file.as_deref())?;

    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    let idle_conns = cli
        .idle_conns
        .or(file.idle_conns)
        .unwrap_or(DEFAULT_IDLE_CONNS);

    // Only the digest outlives this point
    let password = std::mem::take(&mut cli.password);
    let settings = Settings::new(&password, idle_conns).context("Invalid configuration")?;
    drop(password);

    match cli.command {
        Commands::Proxy { addr, paddr } => {
            let addr = resolve_address(addr, file.proxy.addr, "addr")?;
            let paddr = resolve_address(paddr, file.proxy.paddr, "paddr")?;
            run_proxy(settings, addr, paddr).await
        }
        Commands::Tunnel { paddr, saddr } => {
            let paddr = resolve_address(paddr, file.tunnel.paddr, "paddr")?;
            let saddr = resolve_address(saddr, file.tunnel.saddr, "saddr")?;
            run_tunnel(settings, paddr, saddr).await
        }
    }
}
