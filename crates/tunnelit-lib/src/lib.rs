//! Tunnelit Library - Public API for Rust applications embedding the proxy or the tunnel agent
//!
//! # Quick Start - Proxy
//!
//! ```ignore
//! use tunnelit_lib::{ProxyServer, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new("secret", 10)?;
//!     let server = ProxyServer::bind(settings.proxy_config("0.0.0.0:8080", "0.0.0.0:8081")).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Tunnel Agent
//!
//! ```ignore
//! use tunnelit_lib::{Settings, TunnelAgent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new("secret", 10)?;
//!     let agent = TunnelAgent::new(settings.agent_config("proxy.example.com:8081", "127.0.0.1:22"))?;
//!     agent.run().await?;
//!     Ok(())
//! }
//! ```

mod settings;

pub use settings::{ConfigError, Settings, PASSWORD_ENV};

// Re-export protocol types
pub use tunnelit_proto::{
    CodecError, PasswordDigest, Signal, DEFAULT_AUTH_TIMEOUT, DEFAULT_IDLE_CONNS,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_READY_TIMEOUT, DIGEST_LEN,
};

// Re-export connection primitives
pub use tunnelit_connection::{relay, GatePermit, PermitGate, RelayStats};

// Re-export proxy server types
pub use tunnelit_server::{
    AuthError, IdleTunnel, IdleTunnelPool, PairingError, PoolError, ProxyConfig, ProxyMonitor,
    ProxyServer, ProxyServerError,
};

// Re-export tunnel agent types
pub use tunnelit_agent::{AgentConfig, AgentError, Backoff, RetryPolicy, TunnelAgent};
