//! Connection primitives shared by the proxy and the tunnel agent
//!
//! - [`relay`]: bidirectional byte copy between two paired connections
//! - [`PermitGate`]: counting permits bounding outstanding tunnel connections

pub mod gate;
pub mod relay;

pub use gate::{GateClosed, GatePermit, PermitGate};
pub use relay::{relay, RelayStats, RELAY_BUFFER_SIZE};
