use std::time::Duration;
use tunnelit_proto::PasswordDigest;

/// Delay applied between failed attempts to reach the proxy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for the delay
    pub max_delay: Duration,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Tunnel agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Proxy tunnel listener to dial (host:port)
    pub proxy_addr: String,
    /// Backend server to dial once a client is paired (host:port)
    pub backend_addr: String,
    /// Maximum connections parked at the proxy, mirrors the proxy's capacity
    pub idle_conns: usize,
    pub digest: PasswordDigest,
    pub retry: RetryPolicy,
}

impl AgentConfig {
    pub fn new(
        proxy_addr: impl Into<String>,
        backend_addr: impl Into<String>,
        idle_conns: usize,
        digest: PasswordDigest,
    ) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
            backend_addr: backend_addr.into(),
            idle_conns,
            digest,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
