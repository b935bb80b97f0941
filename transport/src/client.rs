//! Request issuance with a hard deadline.
//!
//! [`MinerTransport`] is the seam the dispatch scheduler talks through;
//! tests substitute scripted implementations, production uses
//! [`TcpTransport`]. One `send` is one short-lived exchange — the
//! validator connects, writes the signed request, and waits for exactly
//! one response frame.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;

use attest_messages::{VerificationRequest, VerificationResponse, WireMessage};

use crate::error::TransportError;
use crate::framing::{read_frame, write_frame};

/// Channel for issuing one verification request to one miner.
pub trait MinerTransport: Send + Sync + 'static {
    /// Send `request` to the miner at `address` and await its response,
    /// failing with [`TransportError::Timeout`] once `deadline` elapses.
    fn send(
        &self,
        address: &str,
        request: VerificationRequest,
        deadline: Duration,
    ) -> impl Future<Output = Result<VerificationResponse, TransportError>> + Send;
}

/// TCP transport: one connection per request, length-prefixed bincode
/// frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpTransport;

impl MinerTransport for TcpTransport {
    async fn send(
        &self,
        address: &str,
        request: VerificationRequest,
        deadline: Duration,
    ) -> Result<VerificationResponse, TransportError> {
        tracing::trace!(%address, "issuing verification request");
        let exchange = async {
            let mut stream = TcpStream::connect(address)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let payload = bincode::serialize(&WireMessage::Request(request))
                .map_err(|e| TransportError::Malformed(e.to_string()))?;
            write_frame(&mut stream, &payload).await?;

            let frame = read_frame(&mut stream).await?;
            match bincode::deserialize::<WireMessage>(&frame) {
                Ok(WireMessage::Response(response)) => Ok(response),
                Ok(_) => Err(TransportError::Malformed(
                    "expected a response frame".into(),
                )),
                Err(e) => Err(TransportError::Malformed(e.to_string())),
            }
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_crypto::keypair_from_seed;
    use attest_types::{ClaimId, MinerId, Nonce, Timestamp};
    use tokio::net::TcpListener;

    fn request_fixture() -> VerificationRequest {
        let kp = keypair_from_seed(&[1; 32]);
        VerificationRequest::signed(
            ClaimId::new([7; 32]),
            "statement",
            vec![],
            Nonce::new([3; 16]),
            Timestamp::from_millis(0),
            kp.public,
            &kp.private,
        )
    }

    #[tokio::test]
    async fn tcp_send_receives_matching_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // Minimal scripted miner: echo a signed response for the
        // received request's nonce.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let frame = read_frame(&mut stream).await.unwrap();
            let WireMessage::Request(request) =
                bincode::deserialize::<WireMessage>(&frame).unwrap()
            else {
                panic!("expected request");
            };
            let miner = keypair_from_seed(&[2; 32]);
            let response = VerificationResponse::signed(
                request.nonce,
                MinerId(miner.public),
                vec![],
                1.0,
                Timestamp::from_millis(5),
                &miner.private,
            );
            let payload = bincode::serialize(&WireMessage::Response(response)).unwrap();
            write_frame(&mut stream, &payload).await.unwrap();
        });

        let response = TcpTransport
            .send(&addr, request_fixture(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.nonce, Nonce::new([3; 16]));
        assert!(response.verify());
    }

    #[tokio::test]
    async fn silent_miner_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            // Accept, then never answer.
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let result = TcpTransport
            .send(&addr, request_fixture(), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn unreachable_address_is_connection_failure() {
        // Port 1 is essentially never listening.
        let result = TcpTransport
            .send("127.0.0.1:1", request_fixture(), Duration::from_secs(1))
            .await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed(_)) | Err(TransportError::Timeout)
        ));
    }
}
