//! Settings shared by the proxy and the tunnel agent
//!
//! The secret is hashed once here and only the digest is kept.

use thiserror::Error;
use tracing::warn;
use tunnelit_agent::AgentConfig;
use tunnelit_proto::PasswordDigest;
use tunnelit_server::ProxyConfig;

/// Environment variable holding the shared tunnel password
pub const PASSWORD_ENV: &str = "TUNNELIT_PASSWORD";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("idle_conns must be greater than zero")]
    ZeroIdleConns,
}

/// Validated settings common to both roles
#[derive(Debug, Clone)]
pub struct Settings {
    idle_conns: usize,
    digest: PasswordDigest,
}

impl Settings {
    pub fn new(secret: &str, idle_conns: usize) -> Result<Self, ConfigError> {
        if idle_conns == 0 {
            return Err(ConfigError::ZeroIdleConns);
        }
        if secret.is_empty() {
            warn!("{} is empty; tunnels authenticate with an empty password", PASSWORD_ENV);
        }

        Ok(Self {
            idle_conns,
            digest: PasswordDigest::from_secret(secret),
        })
    }

    pub fn idle_conns(&self) -> usize {
        self.idle_conns
    }

    pub fn digest(&self) -> &PasswordDigest {
        &self.digest
    }

    /// Proxy listening for clients on `addr` and tunnels on `paddr`
    pub fn proxy_config(&self, addr: impl Into<String>, paddr: impl Into<String>) -> ProxyConfig {
        ProxyConfig::new(addr, paddr, self.idle_conns, self.digest)
    }

    /// Agent dialing the proxy at `paddr` and the backend at `saddr`
    pub fn agent_config(&self, paddr: impl Into<String>, saddr: impl Into<String>) -> AgentConfig {
        AgentConfig::new(paddr, saddr, self.idle_conns, self.digest)
    }
}
