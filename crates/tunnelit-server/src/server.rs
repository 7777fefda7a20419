//! Proxy Server Implementation
//!
//! Owns the client listener, the tunnel listener, the idle pool and the
//! admission gate. The tunnel listener only accepts while it holds an
//! admission permit, so at most `idle_conns` tunnel connections are ever
//! outstanding (accepted but not yet claimed by a client).

use crate::auth::authenticate_tunnel;
use crate::config::ProxyConfig;
use crate::pairing::{pair_client, PairingError};
use crate::pool::{IdleTunnel, IdleTunnelPool, PoolError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tunnelit_connection::{GateClosed, GatePermit, PermitGate};
use tunnelit_proto::Signal;

#[derive(Debug, Error)]
pub enum ProxyServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid pool configuration: {0}")]
    Pool(#[from] PoolError),

    #[error("Failed to bind {listener} listener to {address}: {reason}\n\nTroubleshooting:\n  • Check if another process is using this address\n  • Try using a different address or port")]
    BindError {
        listener: &'static str,
        address: String,
        reason: String,
    },

    #[error("Failed to accept on {listener} listener: {source}")]
    AcceptError {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Admission gate closed")]
    AdmissionClosed(#[from] GateClosed),
}

type TunnelPool = IdleTunnelPool<IdleTunnel<TcpStream>>;

/// Session ID generator for log correlation
#[derive(Clone)]
pub struct SessionIdGenerator {
    next_session_id: Arc<AtomicU64>,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self {
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn generate(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the proxy's shared state
#[derive(Clone)]
pub struct ProxyMonitor {
    pool: Arc<TunnelPool>,
    admission: PermitGate,
}

impl ProxyMonitor {
    /// Authenticated tunnel connections waiting for a client
    pub fn idle_tunnels(&self) -> usize {
        self.pool.len()
    }

    /// Admission slots in use: unclaimed tunnels plus the slot held by a pending accept
    pub fn outstanding_tunnels(&self) -> usize {
        self.admission.outstanding()
    }

    pub fn available_permits(&self) -> usize {
        self.admission.available()
    }

    pub fn capacity(&self) -> usize {
        self.admission.capacity()
    }
}

pub struct ProxyServer {
    config: Arc<ProxyConfig>,
    client_listener: TcpListener,
    tunnel_listener: TcpListener,
    pool: Arc<TunnelPool>,
    admission: PermitGate,
    session_id_gen: SessionIdGenerator,
}

impl ProxyServer {
    /// Bind both listeners
    pub async fn bind(config: ProxyConfig) -> Result<Self, ProxyServerError> {
        let pool = Arc::new(IdleTunnelPool::new(config.idle_conns)?);
        let admission = PermitGate::new(config.idle_conns);

        let client_listener = Self::bind_with_retry("client", &config.client_addr).await?;
        let tunnel_listener = Self::bind_with_retry("tunnel", &config.tunnel_addr).await?;

        Ok(Self {
            config: Arc::new(config),
            client_listener,
            tunnel_listener,
            pool,
            admission,
            session_id_gen: SessionIdGenerator::new(),
        })
    }

    async fn bind_with_retry(
        listener: &'static str,
        address: &str,
    ) -> Result<TcpListener, ProxyServerError> {
        // Retry bind logic to handle TIME_WAIT state gracefully (up to 3 attempts with 1 second delays)
        for attempt in 1..=3 {
            match TcpListener::bind(address).await {
                Ok(bound) => {
                    if attempt > 1 {
                        info!(
                            "Successfully bound {} listener to {} on attempt {}/3",
                            listener, address, attempt
                        );
                    }
                    return Ok(bound);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && attempt < 3 => {
                    warn!(
                        "Address {} is in use (attempt {}/3, may be in TIME_WAIT state), retrying in 1 second...",
                        address, attempt
                    );
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
                Err(e) => {
                    return Err(ProxyServerError::BindError {
                        listener,
                        address: address.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ProxyServerError::BindError {
            listener,
            address: address.to_string(),
            reason: "Address in use after 3 retry attempts".to_string(),
        })
    }

    pub fn client_addr(&self) -> Result<SocketAddr, ProxyServerError> {
        Ok(self.client_listener.local_addr()?)
    }

    pub fn tunnel_addr(&self) -> Result<SocketAddr, ProxyServerError> {
        Ok(self.tunnel_listener.local_addr()?)
    }

    pub fn monitor(&self) -> ProxyMonitor {
        ProxyMonitor {
            pool: self.pool.clone(),
            admission: self.admission.clone(),
        }
    }

    /// Serve clients and tunnels until a listener fails.
    ///
    /// Only listener-level failures end this; per-connection errors are
    /// logged by the task that owns the connection.
    pub async fn run(self) -> Result<(), ProxyServerError> {
        info!(
            "Listening for clients on {} and tunnels on {} (idle conns: {})",
            self.client_listener.local_addr()?,
            self.tunnel_listener.local_addr()?,
            self.config.idle_conns
        );

        let Self {
            config,
            client_listener,
            tunnel_listener,
            pool,
            admission,
            session_id_gen,
        } = self;

        tokio::select! {
            res = Self::serve_clients(client_listener, config.clone(), pool.clone(), session_id_gen) => res,
            res = Self::serve_tunnels(tunnel_listener, config, pool, admission) => res,
        }
    }

    async fn serve_clients(
        listener: TcpListener,
        config: Arc<ProxyConfig>,
        pool: Arc<TunnelPool>,
        session_id_gen: SessionIdGenerator,
    ) -> Result<(), ProxyServerError> {
        loop {
            let (stream, peer_addr) =
                listener
                    .accept()
                    .await
                    .map_err(|source| ProxyServerError::AcceptError {
                        listener: "client",
                        source,
                    })?;

            let session_id = session_id_gen.generate();
            debug!("New client connection from {} (session {})", peer_addr, session_id);

            let config = config.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                Self::handle_client(stream, peer_addr, session_id, config, pool).await;
            });
        }
    }

    async fn handle_client(
        client: TcpStream,
        peer_addr: SocketAddr,
        session_id: u64,
        config: Arc<ProxyConfig>,
        pool: Arc<TunnelPool>,
    ) {
        let session = match pair_client(client, &pool, config.pairing_timeouts()).await {
            Ok(session) => session,
            Err(e @ PairingError::NoIdleTunnel(_)) => {
                warn!("Dropping client {} (session {}): {}", peer_addr, session_id, e);
                return;
            }
            Err(PairingError::Handshake {
                peer_addr: tunnel,
                source,
            }) => {
                match source.unexpected_byte() {
                    Some(actual) => warn!(
                        client = %peer_addr,
                        tunnel = %tunnel,
                        session_id,
                        expected = Signal::ConnReady.as_u8(),
                        actual,
                        "Received unexpected response from tunnel"
                    ),
                    None => warn!(
                        "Ready exchange with tunnel {} failed for client {} (session {}): {}",
                        tunnel, peer_addr, session_id, source
                    ),
                }
                return;
            }
            Err(e) => {
                warn!("Pairing failed for client {} (session {}): {}", peer_addr, session_id, e);
                return;
            }
        };

        debug!(
            "Client {} paired with tunnel {} (session {})",
            peer_addr,
            session.tunnel_addr(),
            session_id
        );

        let stats = session.relay().await;

        debug!(
            client = %peer_addr,
            session_id,
            bytes_from_client = stats.a_to_b,
            bytes_to_client = stats.b_to_a,
            "Session closed"
        );
    }

    async fn serve_tunnels(
        listener: TcpListener,
        config: Arc<ProxyConfig>,
        pool: Arc<TunnelPool>,
        admission: PermitGate,
    ) -> Result<(), ProxyServerError> {
        loop {
            // Backpressure: no permit, no accept
            let permit = admission.acquire().await?;

            let (stream, peer_addr) =
                listener
                    .accept()
                    .await
                    .map_err(|source| ProxyServerError::AcceptError {
                        listener: "tunnel",
                        source,
                    })?;

            debug!("New tunnel connection from {}", peer_addr);

            let config = config.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                Self::handle_tunnel(stream, peer_addr, permit, config, pool).await;
            });
        }
    }

    async fn handle_tunnel(
        mut stream: TcpStream,
        peer_addr: SocketAddr,
        permit: GatePermit,
        config: Arc<ProxyConfig>,
        pool: Arc<TunnelPool>,
    ) {
        if let Err(e) = authenticate_tunnel(&mut stream, &config.digest, config.auth_timeout).await
        {
            // Dropping the stream and the permit closes the connection and frees the slot
            warn!("Tunnel authentication failed for {}: {}", peer_addr, e);
            return;
        }

        debug!("Tunnel {} authenticated, parking in idle pool", peer_addr);

        if let Err(e) = pool.push(IdleTunnel::new(stream, peer_addr, permit)).await {
            error!("Failed to park tunnel {}: {}", peer_addr, e);
        }
    }
}
