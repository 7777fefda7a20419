//! Tunnel agent
//!
//! Runs next to the backend server. Keeps up to `idle_conns` authenticated
//! connections parked at the proxy and, each time the proxy hands one of
//! them a client, dials the backend and relays between the two.

mod agent;
mod backoff;
mod config;

pub use agent::{AgentError, TunnelAgent};
pub use backoff::Backoff;
pub use config::{AgentConfig, RetryPolicy};
