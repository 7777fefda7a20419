//! Bidirectional relay between two paired connections
//!
//! Each direction runs in its own task. The first direction to finish (EOF
//! or error) tears the other one down, so both connections are dropped, and
//! therefore closed, exactly once regardless of which side went away.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Read buffer size per direction
pub const RELAY_BUFFER_SIZE: usize = 16 * 1024;

/// Bytes moved in each direction over the life of a relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub a_to_b: u64,
    pub b_to_a: u64,
}

impl RelayStats {
    pub fn total(&self) -> u64 {
        self.a_to_b + self.b_to_a
    }
}

/// Aborts the direction task if the relay future itself is dropped
struct DirectionTask(JoinHandle<io::Result<()>>);

impl Drop for DirectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum First {
    Forward(Result<io::Result<()>, tokio::task::JoinError>),
    Backward(Result<io::Result<()>, tokio::task::JoinError>),
}

async fn pump<R, W>(mut reader: R, mut writer: W, counter: Arc<AtomicU64>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            let _ = writer.shutdown().await;
            return Ok(());
        }
        writer.write_all(&buffer[..n]).await?;
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Copy bytes between `a` and `b` until either side closes, then close both.
///
/// Takes ownership of both connections; when this returns they have been
/// dropped.
pub async fn relay<A, B>(a: A, b: B) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let a_to_b = Arc::new(AtomicU64::new(0));
    let b_to_a = Arc::new(AtomicU64::new(0));

    let mut forward = DirectionTask(tokio::spawn(pump(a_read, b_write, a_to_b.clone())));
    let mut backward = DirectionTask(tokio::spawn(pump(b_read, a_write, b_to_a.clone())));

    let first = tokio::select! {
        res = &mut forward.0 => First::Forward(res),
        res = &mut backward.0 => First::Backward(res),
    };
    let (direction, result, mut remaining) = match first {
        First::Forward(res) => ("a->b", res, backward),
        First::Backward(res) => ("b->a", res, forward),
    };

    // The other direction still owns two halves; stop it and wait so they
    // are really gone before reporting.
    remaining.0.abort();
    let _ = (&mut remaining.0).await;

    match result {
        Ok(Ok(())) => debug!(direction, "Relay direction reached end of stream"),
        Ok(Err(e)) => debug!(direction, error = %e, "Relay direction failed"),
        Err(e) if e.is_panic() => warn!(direction, "Relay task panicked: {}", e),
        Err(_) => {}
    }

    RelayStats {
        a_to_b: a_to_b.load(Ordering::Relaxed),
        b_to_a: b_to_a.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_relays_both_directions() {
        let (mut client, client_far) = duplex(1024);
        let (mut backend, backend_far) = duplex(1024);

        let handle = tokio::spawn(relay(client_far, backend_far));

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        backend.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(client);
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay should finish once a side closes")
            .unwrap();
        assert_eq!(stats, RelayStats { a_to_b: 4, b_to_a: 5 });
        assert_eq!(stats.total(), 9);
    }

    #[tokio::test]
    async fn test_close_on_a_closes_b() {
        let (client, client_far) = duplex(1024);
        let (mut backend, backend_far) = duplex(1024);

        let handle = tokio::spawn(relay(client_far, backend_far));
        drop(client);

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(1), backend.read(&mut buf))
            .await
            .expect("backend side should observe closure")
            .unwrap();
        assert_eq!(n, 0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_on_b_closes_a() {
        let (mut client, client_far) = duplex(1024);
        let (backend, backend_far) = duplex(1024);

        let handle = tokio::spawn(relay(client_far, backend_far));
        drop(backend);

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(1), client.read(&mut buf))
            .await
            .expect("client side should observe closure")
            .unwrap();
        assert_eq!(n, 0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_large_transfer_is_complete() {
        let (mut client, client_far) = duplex(4096);
        let (mut backend, backend_far) = duplex(4096);
        let handle = tokio::spawn(relay(client_far, backend_far));

        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            client.write_all(&payload).await.unwrap();
            client
        });

        let mut received = vec![0u8; expected.len()];
        backend.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);

        drop(writer.await.unwrap());
        let stats = handle.await.unwrap();
        assert_eq!(stats.a_to_b, expected.len() as u64);
        assert_eq!(stats.b_to_a, 0);
    }
}
