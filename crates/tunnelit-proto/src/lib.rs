//! Tunnel Protocol Definitions
//!
//! This crate defines the handshake spoken on tunnel connections between the
//! proxy and a tunnel agent: a fixed-length password digest followed by
//! single-byte control signals. After the final `ConnReady` exchange the
//! connection carries raw, unframed bytes.

pub mod codec;
pub mod digest;
pub mod signal;

pub use codec::{expect_signal, read_digest, read_signal, write_digest, write_signal, CodecError};
pub use digest::{PasswordDigest, DIGEST_LEN};
pub use signal::{Signal, UnknownSignal};

use std::time::Duration;

/// Default number of idle tunnel connections the proxy will hold
pub const DEFAULT_IDLE_CONNS: usize = 10;

/// How long a client waits for an idle tunnel before it is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a new tunnel connection has to deliver its digest
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a claimed tunnel connection has to confirm `ConnReady`
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
