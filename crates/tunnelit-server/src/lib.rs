//! Tunnelit Proxy Server
//!
//! The publicly reachable side of the tunnel. It listens for ordinary
//! clients on one address and for tunnel agents on another, keeps a bounded
//! pool of authenticated idle tunnel connections, and splices each client
//! to exactly one of them.

mod auth;
mod config;
mod pairing;
mod pool;
mod server;

pub use auth::{authenticate_tunnel, AuthError};
pub use config::ProxyConfig;
pub use pairing::{pair_client, PairedSession, PairingError, PairingTimeouts};
pub use pool::{IdleTunnel, IdleTunnelPool, PoolError};
pub use server::{ProxyMonitor, ProxyServer, ProxyServerError};
