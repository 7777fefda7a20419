//! Counting permit gate
//!
//! The proxy takes a permit before accepting a raw tunnel connection and the
//! agent takes one before dialing the proxy. A permit is an owned value: it
//! returns its slot exactly once, either through [`GatePermit::release`] or
//! when it is dropped on an error path.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned once the gate has been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("permit gate closed")]
pub struct GateClosed;

/// Bounded set of permits, safe to share between tasks
#[derive(Debug, Clone)]
pub struct PermitGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of capacity taken from a [`PermitGate`]
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Give the slot back to the gate
    pub fn release(self) {}
}

impl PermitGate {
    /// Create a gate with every permit available
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a permit is free and take it
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a permit only if one is free right now
    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held by someone
    pub fn outstanding(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Wake every waiter with [`GateClosed`]; held permits stay valid
    pub fn close(&self) {
        self.semaphore.close();
    }
}
