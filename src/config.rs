//! YAML configuration file and CLI merge
//!
//! Every setting in the file is optional; command-line flags win.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file format
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Idle tunnel connections to keep (proxy capacity / agent readiness)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_conns: Option<usize>,

    /// Log file to append to; blank means stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,

    #[serde(default)]
    pub proxy: ProxySection,

    #[serde(default)]
    pub tunnel: TunnelSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProxySection {
    /// Client listen address (host:port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,

    /// Tunnel listen address (host:port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paddr: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TunnelSection {
    /// Proxy tunnel address to dial (host:port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paddr: Option<String>,

    /// Backend server address (host:port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saddr: Option<String>,
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: ConfigFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Pick the CLI value over the file value, then validate it
pub fn resolve_address(
    cli: Option<String>,
    file: Option<String>,
    flag: &str,
) -> Result<String> {
    let addr = cli.or(file).with_context(|| {
        format!(
            "Missing --{} (pass it on the command line or set it in the config file)",
            flag
        )
    })?;
    validate_address(&addr, flag)?;
    Ok(addr)
}

/// Check `host:port` shape; the host is resolved later when dialing or binding
pub fn validate_address(addr: &str, flag: &str) -> Result<()> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        anyhow::bail!(
            "Invalid --{} address format: '{}' (expected format: host:port)",
            flag,
            addr
        );
    };

    if host.is_empty() {
        anyhow::bail!(
            "Invalid --{} address format: '{}' (host cannot be empty)",
            flag,
            addr
        );
    }

    port.parse::<u16>()
        .with_context(|| format!("Invalid port in --{} address: {}", flag, addr))?;

    Ok(())
}

/// A blank log path means "log to stderr"
pub fn log_destination(cli: Option<PathBuf>, file: Option<PathBuf>) -> Option<PathBuf> {
    cli.or(file).filter(|path| !path.as_os_str().is_empty())
}
