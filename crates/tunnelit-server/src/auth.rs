//! Tunnel connection authentication (listener side)

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tunnelit_proto::{read_digest, write_signal, CodecError, PasswordDigest, Signal};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Timed out after {0:?} waiting for the password digest")]
    Timeout(Duration),

    #[error("Invalid password digest")]
    InvalidPassword,

    #[error("Handshake error: {0}")]
    Codec(#[from] CodecError),
}

/// Run the password exchange on a freshly accepted tunnel connection.
///
/// Reads exactly one digest and answers `PasswordOk` or `PasswordInvalid`.
/// The whole exchange must finish within `timeout`; on timeout or a short
/// read nothing is written back. There is no retry on the same connection.
pub async fn authenticate_tunnel<S>(
    stream: &mut S,
    digest: &PasswordDigest,
    timeout: Duration,
) -> Result<(), AuthError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let exchange = async {
        let received = read_digest(stream).await?;
        if !digest.matches(&received) {
            // The connection is closed right after, so a failed write changes nothing
            let _ = write_signal(stream, Signal::PasswordInvalid).await;
            return Err(AuthError::InvalidPassword);
        }
        write_signal(stream, Signal::PasswordOk).await?;
        Ok(())
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};
    use tunnelit_proto::{read_signal, write_digest, DIGEST_LEN};

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_correct_digest_accepted() {
        let digest = PasswordDigest::from_secret("letmein");
        let (mut agent, mut proxy_side) = duplex(128);

        write_digest(&mut agent, &digest).await.unwrap();
        authenticate_tunnel(&mut proxy_side, &digest, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(read_signal(&mut agent).await.unwrap(), Signal::PasswordOk);
    }

    #[tokio::test]
    async fn test_wrong_digest_rejected() {
        let digest = PasswordDigest::from_secret("letmein");
        let (mut agent, mut proxy_side) = duplex(128);

        write_digest(&mut agent, &PasswordDigest::from_secret("guess"))
            .await
            .unwrap();
        let err = authenticate_tunnel(&mut proxy_side, &digest, TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidPassword));
        assert_eq!(
            read_signal(&mut agent).await.unwrap(),
            Signal::PasswordInvalid
        );
    }

    #[tokio::test]
    async fn test_partial_digest_then_stall_times_out() {
        let digest = PasswordDigest::from_secret("letmein");
        let (mut agent, mut proxy_side) = duplex(128);

        agent.write_all(&[0u8; DIGEST_LEN / 2]).await.unwrap();
        let err = authenticate_tunnel(&mut proxy_side, &digest, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));

        // Nothing was written back
        drop(proxy_side);
        let err = read_signal(&mut agent).await.unwrap_err();
        assert!(matches!(err, CodecError::Closed));
    }

    #[tokio::test]
    async fn test_partial_digest_then_close() {
        let digest = PasswordDigest::from_secret("letmein");
        let (mut agent, mut proxy_side) = duplex(128);

        agent.write_all(&[0u8; 3]).await.unwrap();
        drop(agent);

        let err = authenticate_tunnel(&mut proxy_side, &digest, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Codec(CodecError::ShortDigest)));
    }
}
