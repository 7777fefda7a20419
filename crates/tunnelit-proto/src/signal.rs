//! Single-byte control signals

use std::fmt;
use thiserror::Error;

/// Control byte sent on a tunnel connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signal {
    /// A client has been paired; proceed (sent in both directions)
    ConnReady = 1,
    /// The digest did not match; the proxy closes the connection
    PasswordInvalid = 10,
    /// The digest matched; the connection is now idle in the pool
    PasswordOk = 11,
}

/// A byte that is not part of the control alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown control byte {0}")]
pub struct UnknownSignal(pub u8);

impl Signal {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Signal {
    type Error = UnknownSignal;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Signal::ConnReady),
            10 => Ok(Signal::PasswordInvalid),
            11 => Ok(Signal::PasswordOk),
            other => Err(UnknownSignal(other)),
        }
    }
}

impl From<Signal> for u8 {
    fn from(signal: Signal) -> Self {
        signal.as_u8()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::ConnReady => "conn-ready",
            Signal::PasswordInvalid => "password-invalid",
            Signal::PasswordOk => "password-ok",
        };
        write!(f, "{}({})", name, self.as_u8())
    }
}
