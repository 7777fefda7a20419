use crate::backoff::Backoff;
use crate::config::AgentConfig;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use tunnelit_connection::{relay, GateClosed, GatePermit, PermitGate, RelayStats};
use tunnelit_proto::{expect_signal, read_signal, write_digest, write_signal, CodecError, Signal};

/// Errors from one tunnel connection attempt
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("idle_conns must be greater than zero")]
    ZeroIdleConns,

    #[error("Failed to connect to proxy at {address}: {source}")]
    ProxyDial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Proxy rejected the tunnel password")]
    PasswordRejected,

    #[error("Handshake with proxy failed: {0}")]
    Handshake(#[from] CodecError),

    #[error("Failed to connect to backend at {address}: {source}")]
    BackendDial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Readiness gate closed")]
    GateClosed(#[from] GateClosed),
}

/// Keeps the proxy's idle pool topped up and bridges paired connections
/// to the backend.
///
/// Cloning is cheap; clones share the readiness gate and the backoff.
#[derive(Clone)]
pub struct TunnelAgent {
    config: Arc<AgentConfig>,
    readiness: PermitGate,
    backoff: Arc<Backoff>,
}

impl TunnelAgent {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        if config.idle_conns == 0 {
            return Err(AgentError::ZeroIdleConns);
        }

        Ok(Self {
            readiness: PermitGate::new(config.idle_conns),
            backoff: Arc::new(Backoff::new(config.retry)),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Local gate mirroring the proxy's admission capacity
    pub fn readiness(&self) -> &PermitGate {
        &self.readiness
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Dial the proxy whenever a readiness permit is free, forever.
    ///
    /// Each attempt runs on its own task. Returns only if the readiness gate
    /// is closed.
    pub async fn run(&self) -> Result<(), AgentError> {
        info!(
            "Tunnel agent forwarding {} -> {} (idle conns: {})",
            self.config.proxy_addr, self.config.backend_addr, self.config.idle_conns
        );

        loop {
            let permit = self.readiness.acquire().await?;

            let delay = self.backoff.delay();
            if !delay.is_zero() {
                debug!(
                    "Waiting {:?} before dialing proxy (failures: {})",
                    delay,
                    self.backoff.failures()
                );
                tokio::time::sleep(delay).await;
            }

            let agent = self.clone();
            tokio::spawn(async move {
                match agent.establish_one(permit).await {
                    Ok(stats) => debug!(
                        bytes_to_backend = stats.a_to_b,
                        bytes_from_backend = stats.b_to_a,
                        "Tunnel session closed"
                    ),
                    Err(e) => agent.log_attempt_error(&e),
                }
            });
        }
    }

    /// Run one tunnel connection through its whole life.
    ///
    /// 1. dial the proxy and authenticate
    /// 2. wait for the proxy to pair a client (`ConnReady`)
    /// 3. release `permit` so another idle connection can be opened
    /// 4. dial the backend, confirm `ConnReady`, relay until either side closes
    ///
    /// Failures before authentication succeeds feed the shared backoff. If
    /// the attempt fails before step 3 the permit is returned on drop.
    pub async fn establish_one(&self, permit: GatePermit) -> Result<RelayStats, AgentError> {
        let mut proxy = match self.connect_authenticated().await {
            Ok(proxy) => {
                self.backoff.reset();
                proxy
            }
            Err(e) => {
                let delay = self.backoff.record_failure();
                debug!("Proxy attempt failed, next attempt delayed by {:?}", delay);
                return Err(e);
            }
        };

        debug!("Authenticated with proxy {}, waiting for a client", self.config.proxy_addr);

        expect_signal(&mut proxy, Signal::ConnReady).await?;

        // Paired with a client: this slot can be replenished now
        permit.release();

        let backend = TcpStream::connect(&self.config.backend_addr)
            .await
            .map_err(|source| AgentError::BackendDial {
                address: self.config.backend_addr.clone(),
                source,
            })?;

        write_signal(&mut proxy, Signal::ConnReady).await?;

        debug!("Relaying proxy {} <-> backend {}", self.config.proxy_addr, self.config.backend_addr);

        Ok(relay(proxy, backend).await)
    }

    async fn connect_authenticated(&self) -> Result<TcpStream, AgentError> {
        let mut proxy = TcpStream::connect(&self.config.proxy_addr)
            .await
            .map_err(|source| AgentError::ProxyDial {
                address: self.config.proxy_addr.clone(),
                source,
            })?;

        write_digest(&mut proxy, &self.config.digest).await?;

        match read_signal(&mut proxy).await? {
            Signal::PasswordOk => Ok(proxy),
            Signal::PasswordInvalid => Err(AgentError::PasswordRejected),
            other => Err(CodecError::Unexpected {
                expected: Signal::PasswordOk,
                actual: other.as_u8(),
            }
            .into()),
        }
    }

    fn log_attempt_error(&self, error: &AgentError) {
        match error {
            AgentError::Handshake(codec) => match codec.unexpected_byte() {
                Some(actual) => warn!(
                    proxy = %self.config.proxy_addr,
                    actual,
                    "Received unexpected signal from proxy"
                ),
                None => debug!("Proxy connection ended before pairing: {}", codec),
            },
            other => warn!("{}", other),
        }
    }
}
