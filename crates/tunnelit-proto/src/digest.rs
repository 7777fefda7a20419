//! Password digest exchanged by tunnel agents
//!
//! The operator secret is hashed once with SHA-256 at startup; only the
//! digest travels on the wire and only the digest is kept in memory.

use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the digest on the wire (SHA-256)
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of the shared tunnel password
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PasswordDigest([u8; DIGEST_LEN]);

impl PasswordDigest {
    /// Hash a secret into a digest
    ///
    /// # Example
    /// ```
    /// use tunnelit_proto::PasswordDigest;
    ///
    /// let a = PasswordDigest::from_secret("hunter2");
    /// let b = PasswordDigest::from_secret("hunter2");
    /// assert!(a.matches(b.as_bytes()));
    /// ```
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Compare against bytes received from a peer.
    ///
    /// Every byte is visited regardless of where the first difference is.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        if candidate.len() != DIGEST_LEN {
            return false;
        }
        self.0
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}
