//! Idle tunnel pool
//!
//! A bounded FIFO of authenticated tunnel connections waiting for a client.
//! Any number of producers (tunnel handlers) and consumers (waiting clients)
//! may use it concurrently; each entry is handed to exactly one consumer.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tunnelit_connection::GatePermit;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Idle pool capacity must be greater than 0")]
    ZeroCapacity,

    #[error("Idle pool closed")]
    Closed,
}

/// Bounded, concurrency-safe FIFO
pub struct IdleTunnelPool<T> {
    sender: mpsc::Sender<T>,
    // Waiting consumers queue on this lock in arrival order
    receiver: Mutex<mpsc::Receiver<T>>,
}

impl<T> IdleTunnelPool<T> {
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let (sender, receiver) = mpsc::channel(capacity);
        Ok(Self {
            sender,
            receiver: Mutex::new(receiver),
        })
    }

    /// Enqueue an entry, waiting for space if the pool is full
    pub async fn push(&self, item: T) -> Result<(), PoolError> {
        self.sender.send(item).await.map_err(|_| PoolError::Closed)
    }

    /// Dequeue the oldest entry, waiting for one to arrive
    pub async fn pop(&self) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// Dequeue the oldest entry, giving up after `timeout`.
    ///
    /// Dropping the pending receive on timeout never loses an entry.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.pop()).await.ok().flatten()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Entries currently waiting in the pool
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An authenticated tunnel connection parked in the pool.
///
/// It carries the admission permit taken when the raw connection was
/// accepted; the permit goes back to the gate when a client claims the
/// connection, or when the entry is dropped.
#[derive(Debug)]
pub struct IdleTunnel<S> {
    stream: S,
    peer_addr: SocketAddr,
    admitted_at: Instant,
    permit: GatePermit,
}

impl<S> IdleTunnel<S> {
    pub fn new(stream: S, peer_addr: SocketAddr, permit: GatePermit) -> Self {
        Self {
            stream,
            peer_addr,
            admitted_at: Instant::now(),
            permit,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn idle_for(&self) -> Duration {
        self.admitted_at.elapsed()
    }

    /// Take the connection out of the pool's custody and free its slot
    pub fn claim(self) -> (S, SocketAddr) {
        self.permit.release();
        (self.stream, self.peer_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tunnelit_connection::PermitGate;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            IdleTunnelPool::<u32>::new(0),
            Err(PoolError::ZeroCapacity)
        ));
    }

    #[tokio::test]
    async fn test_fifo_order_and_len() {
        let pool = IdleTunnelPool::new(3).unwrap();
        assert_eq!(pool.capacity(), 3);
        assert!(pool.is_empty());

        pool.push(1).await.unwrap();
        pool.push(2).await.unwrap();
        pool.push(3).await.unwrap();
        assert_eq!(pool.len(), 3);

        assert_eq!(pool.pop().await, Some(1));
        assert_eq!(pool.pop().await, Some(2));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pop().await, Some(3));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_pop_timeout_on_empty_pool() {
        let pool = IdleTunnelPool::<u32>::new(1).unwrap();
        let start = Instant::now();
        assert_eq!(pool.pop_timeout(Duration::from_millis(50)).await, None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_timed_out_waiter_does_not_swallow_entry() {
        let pool = Arc::new(IdleTunnelPool::new(1).unwrap());

        assert_eq!(pool.pop_timeout(Duration::from_millis(10)).await, None);
        pool.push(7u32).await.unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pop_timeout(Duration::from_millis(10)).await, Some(7));
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_push() {
        let pool = Arc::new(IdleTunnelPool::new(1).unwrap());

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.pop_timeout(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.push(42u32).await.unwrap();

        assert_eq!(waiter.await.unwrap(), Some(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_entry_delivered_once() {
        let pool = Arc::new(IdleTunnelPool::new(8).unwrap());
        let total = 200u32;

        let mut consumers = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            consumers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(item) = pool.pop_timeout(Duration::from_secs(1)).await {
                    got.push(item);
                }
                got
            }));
        }

        let mut producers = Vec::new();
        for chunk in 0..4u32 {
            let pool = pool.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..total / 4 {
                    pool.push(chunk * 1000 + i).await.unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut seen = HashSet::new();
        for consumer in consumers {
            for item in consumer.await.unwrap() {
                assert!(seen.insert(item), "item {} delivered twice", item);
            }
        }
        assert_eq!(seen.len(), total as usize);
    }

    #[tokio::test]
    async fn test_claim_releases_permit() {
        let gate = PermitGate::new(1);
        let permit = gate.acquire().await.unwrap();
        let idle = IdleTunnel::new((), "127.0.0.1:9".parse().unwrap(), permit);
        assert_eq!(gate.available(), 0);
        assert_eq!(idle.peer_addr().port(), 9);

        let ((), peer) = idle.claim();
        assert_eq!(peer.port(), 9);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_dropping_idle_tunnel_releases_permit() {
        let gate = PermitGate::new(1);
        let permit = gate.acquire().await.unwrap();
        let idle = IdleTunnel::new((), "127.0.0.1:9".parse().unwrap(), permit);
        drop(idle);
        assert_eq!(gate.available(), 1);
    }
}
