//! Pairing a waiting client with an idle tunnel connection

use crate::pool::{IdleTunnel, IdleTunnelPool};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use tunnelit_connection::{relay, RelayStats};
use tunnelit_proto::{expect_signal, write_signal, CodecError, Signal};

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("No idle tunnel connection became available within {0:?}")]
    NoIdleTunnel(Duration),

    #[error("Tunnel {peer_addr} did not confirm readiness within {timeout:?}")]
    ReadyTimeout {
        peer_addr: SocketAddr,
        timeout: Duration,
    },

    #[error("Ready exchange with tunnel {peer_addr} failed: {source}")]
    Handshake {
        peer_addr: SocketAddr,
        #[source]
        source: CodecError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PairingTimeouts {
    /// How long to wait for an idle tunnel
    pub idle: Duration,
    /// How long the claimed tunnel has to answer `ConnReady`
    pub ready: Duration,
}

/// A client and a tunnel connection that completed the ready exchange.
///
/// Owns both connections until [`PairedSession::relay`] consumes it.
#[derive(Debug)]
pub struct PairedSession<C, S> {
    client: C,
    tunnel: S,
    tunnel_addr: SocketAddr,
}

impl<C, S> PairedSession<C, S>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn tunnel_addr(&self) -> SocketAddr {
        self.tunnel_addr
    }

    /// Relay client <-> tunnel until either closes; both are closed on return
    pub async fn relay(self) -> RelayStats {
        relay(self.client, self.tunnel).await
    }
}

/// Claim one idle tunnel for `client` and perform the ready exchange.
///
/// On every error path the client, and the claimed tunnel if there was
/// one, are dropped here. A claimed tunnel never goes back to the pool.
pub async fn pair_client<C, S>(
    client: C,
    pool: &IdleTunnelPool<IdleTunnel<S>>,
    timeouts: PairingTimeouts,
) -> Result<PairedSession<C, S>, PairingError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let idle = pool
        .pop_timeout(timeouts.idle)
        .await
        .ok_or(PairingError::NoIdleTunnel(timeouts.idle))?;

    debug!(
        tunnel = %idle.peer_addr(),
        idle_ms = idle.idle_for().as_millis() as u64,
        "Claimed idle tunnel connection"
    );

    // Frees the admission slot so a replacement tunnel can be accepted
    let (mut tunnel, peer_addr) = idle.claim();

    let handshake = async {
        write_signal(&mut tunnel, Signal::ConnReady).await?;
        expect_signal(&mut tunnel, Signal::ConnReady).await
    };

    let outcome = tokio::time::timeout(timeouts.ready, handshake).await;
    match outcome {
        Ok(Ok(())) => Ok(PairedSession {
            client,
            tunnel,
            tunnel_addr: peer_addr,
        }),
        Ok(Err(source)) => Err(PairingError::Handshake { peer_addr, source }),
        Err(_) => Err(PairingError::ReadyTimeout {
            peer_addr,
            timeout: timeouts.ready,
        }),
    }
}
