use crate::pairing::PairingTimeouts;
use std::time::Duration;
use tunnelit_proto::{
    PasswordDigest, DEFAULT_AUTH_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_READY_TIMEOUT,
};

/// Proxy server configuration, built once at startup
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address clients connect to
    pub client_addr: String,
    /// Address tunnel agents connect to
    pub tunnel_addr: String,
    /// Capacity of the idle pool and of the admission gate
    pub idle_conns: usize,
    pub digest: PasswordDigest,
    /// How long a client waits for an idle tunnel
    pub idle_timeout: Duration,
    /// Deadline for a new tunnel connection to deliver its digest
    pub auth_timeout: Duration,
    /// Deadline for a claimed tunnel connection to answer `ConnReady`
    pub ready_timeout: Duration,
}

impl ProxyConfig {
    pub fn new(
        client_addr: impl Into<String>,
        tunnel_addr: impl Into<String>,
        idle_conns: usize,
        digest: PasswordDigest,
    ) -> Self {
        Self {
            client_addr: client_addr.into(),
            tunnel_addr: tunnel_addr.into(),
            idle_conns,
            digest,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn pairing_timeouts(&self) -> PairingTimeouts {
        PairingTimeouts {
            idle: self.idle_timeout,
            ready: self.ready_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::new(
            "127.0.0.1:8080",
            "127.0.0.1:8081",
            10,
            PasswordDigest::from_secret("pw"),
        );
        assert_eq!(config.client_addr, "127.0.0.1:8080");
        assert_eq!(config.tunnel_addr, "127.0.0.1:8081");
        assert_eq!(config.idle_conns, 10);
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.ready_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_pairing_timeouts_follow_config() {
        let config = ProxyConfig::new("a:1", "b:2", 1, PasswordDigest::from_secret(""))
            .with_idle_timeout(Duration::from_millis(250))
            .with_ready_timeout(Duration::from_millis(500));
        let timeouts = config.pairing_timeouts();
        assert_eq!(timeouts.idle, Duration::from_millis(250));
        assert_eq!(timeouts.ready, Duration::from_millis(500));
    }
}
