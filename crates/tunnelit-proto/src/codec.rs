//! Async helpers for reading and writing the handshake
//!
//! Signals are single bytes and the digest has a fixed length, so there is
//! no length prefix: each helper reads or writes exactly what it needs and
//! leaves any following bytes on the stream untouched.

use crate::digest::{PasswordDigest, DIGEST_LEN};
use crate::signal::{Signal, UnknownSignal};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Handshake codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Digest truncated: peer closed before sending the full digest")]
    ShortDigest,

    #[error("Unexpected signal: expected {expected}, got {actual}")]
    Unexpected { expected: Signal, actual: u8 },

    #[error(transparent)]
    Unknown(#[from] UnknownSignal),
}

impl CodecError {
    /// The raw byte received when the peer answered out of protocol
    pub fn unexpected_byte(&self) -> Option<u8> {
        match self {
            CodecError::Unexpected { actual, .. } => Some(*actual),
            CodecError::Unknown(UnknownSignal(byte)) => Some(*byte),
            _ => None,
        }
    }
}

/// Write one control byte
pub async fn write_signal<W>(writer: &mut W, signal: Signal) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&[signal.as_u8()]).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_byte<R>(reader: &mut R) -> Result<u8, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_u8().await {
        Ok(byte) => Ok(byte),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CodecError::Closed),
        Err(e) => Err(CodecError::Io(e)),
    }
}

/// Read one control byte and decode it
pub async fn read_signal<R>(reader: &mut R) -> Result<Signal, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let byte = read_byte(reader).await?;
    Ok(Signal::try_from(byte)?)
}

/// Read one control byte and require it to be `expected`
pub async fn expect_signal<R>(reader: &mut R, expected: Signal) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let actual = read_byte(reader).await?;
    if actual != expected.as_u8() {
        return Err(CodecError::Unexpected { expected, actual });
    }
    Ok(())
}

/// Send the password digest
pub async fn write_digest<W>(writer: &mut W, digest: &PasswordDigest) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(digest.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly [`DIGEST_LEN`] bytes
pub async fn read_digest<R>(reader: &mut R) -> Result<[u8; DIGEST_LEN], CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; DIGEST_LEN];
    match reader.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CodecError::ShortDigest),
        Err(e) => Err(CodecError::Io(e)),
    }
}
