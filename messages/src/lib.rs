//! Wire protocol between the validator and miners.
//!
//! Both directions are signed over a canonical bincode encoding of the
//! message minus its signature, so signatures verify across language
//! runtimes as long as the field order is preserved.

use attest_crypto::{sign_message, verify_signature};
use attest_types::{ClaimId, MinerId, Nonce, PrivateKey, PublicKey, Signature, Timestamp};
use serde::{Deserialize, Serialize};

/// Wire protocol version, carried in every frame.
pub const PROTOCOL_VERSION: u16 = 1;

/// A single piece of evidence returned by a miner: a source URL and the
/// excerpt that supports or contradicts the statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub url: String,
    pub excerpt: String,
}

/// A claim-verification request issued to one miner.
///
/// Signed by the validator; miners reject requests from issuers they do
/// not recognize.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub claim_id: ClaimId,
    /// The statement to gather evidence for.
    pub statement: String,
    /// Preferred sources, forwarded verbatim as a hint.
    pub sources: Vec<String>,
    /// Ties the miner's response to this exact request.
    pub nonce: Nonce,
    pub issued_at: Timestamp,
    /// The issuing validator's public key.
    pub validator: PublicKey,
    /// Signature over [`VerificationRequest::signable_bytes`].
    pub signature: Signature,
}

/// Borrowing view of the signed request fields, in signing order.
#[derive(Serialize)]
struct SignableRequest<'a> {
    claim_id: &'a ClaimId,
    statement: &'a str,
    sources: &'a [String],
    nonce: &'a Nonce,
    issued_at: &'a Timestamp,
    validator: &'a PublicKey,
}

impl VerificationRequest {
    /// Build and sign a request for `claim_id` in one step.
    #[allow(clippy::too_many_arguments)]
    pub fn signed(
        claim_id: ClaimId,
        statement: impl Into<String>,
        sources: Vec<String>,
        nonce: Nonce,
        issued_at: Timestamp,
        validator: PublicKey,
        key: &PrivateKey,
    ) -> Self {
        let mut request = Self {
            claim_id,
            statement: statement.into(),
            sources,
            nonce,
            issued_at,
            validator,
            signature: Signature([0u8; 64]),
        };
        request.signature = sign_message(&request.signable_bytes(), key);
        request
    }

    /// Canonical byte encoding of everything except the signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        bincode::serialize(&SignableRequest {
            claim_id: &self.claim_id,
            statement: &self.statement,
            sources: &self.sources,
            nonce: &self.nonce,
            issued_at: &self.issued_at,
            validator: &self.validator,
        })
        .expect("request fields are always serializable")
    }

    /// Verify the issuer signature.
    pub fn verify(&self) -> bool {
        verify_signature(&self.signable_bytes(), &self.signature, &self.validator)
    }
}

/// A miner's response to a [`VerificationRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationResponse {
    /// Echoes the request nonce.
    pub nonce: Nonce,
    pub miner: MinerId,
    /// Evidence gathered for the statement.
    pub evidence: Vec<Evidence>,
    /// Miner-reported confidence in its evidence, in [0,1].
    pub confidence: f64,
    pub responded_at: Timestamp,
    /// Signature over [`VerificationResponse::signable_bytes`].
    pub signature: Signature,
}

/// Borrowing view of the signed response fields, in signing order.
#[derive(Serialize)]
struct SignableResponse<'a> {
    nonce: &'a Nonce,
    miner: &'a MinerId,
    evidence: &'a [Evidence],
    confidence: &'a f64,
    responded_at: &'a Timestamp,
}

impl VerificationResponse {
    /// Build and sign a response in one step.
    pub fn signed(
        nonce: Nonce,
        miner: MinerId,
        evidence: Vec<Evidence>,
        confidence: f64,
        responded_at: Timestamp,
        key: &PrivateKey,
    ) -> Self {
        let mut response = Self {
            nonce,
            miner,
            evidence,
            confidence,
            responded_at,
            signature: Signature([0u8; 64]),
        };
        response.signature = sign_message(&response.signable_bytes(), key);
        response
    }

    /// Canonical byte encoding of everything except the signature.
    pub fn signable_bytes(&self) -> Vec<u8> {
        bincode::serialize(&SignableResponse {
            nonce: &self.nonce,
            miner: &self.miner,
            evidence: &self.evidence,
            confidence: &self.confidence,
            responded_at: &self.responded_at,
        })
        .expect("response fields are always serializable")
    }

    /// Verify the signature against the miner id embedded in the response.
    pub fn verify(&self) -> bool {
        verify_signature(
            &self.signable_bytes(),
            &self.signature,
            self.miner.public_key(),
        )
    }
}

/// Top-level wire frame between validator and miner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WireMessage {
    Request(VerificationRequest),
    Response(VerificationResponse),
}

/// A discovered miner as reported by the peer-discovery feed:
/// identity, reachable address, and registration stake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinerEndpoint {
    pub id: MinerId,
    /// `"ip:port"` the miner listens on.
    pub address: String,
    pub stake: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_crypto::{generate_keypair, keypair_from_seed, random_nonce};

    fn request_fixture(key: &attest_types::KeyPair) -> VerificationRequest {
        VerificationRequest::signed(
            ClaimId::new([1; 32]),
            "the moon orbits the earth",
            vec!["nasa.gov".into()],
            Nonce::new([2; 16]),
            Timestamp::from_millis(1_000),
            key.public,
            &key.private,
        )
    }

    #[test]
    fn request_sign_verify_round_trip() {
        let kp = generate_keypair();
        let request = request_fixture(&kp);
        assert!(request.verify());
    }

    #[test]
    fn tampered_request_fails_verification() {
        let kp = generate_keypair();
        let mut request = request_fixture(&kp);
        request.statement = "the earth orbits the moon".into();
        assert!(!request.verify());
    }

    #[test]
    fn signable_bytes_exclude_signature() {
        let kp = keypair_from_seed(&[3; 32]);
        let mut request = request_fixture(&kp);
        let before = request.signable_bytes();
        request.signature = Signature([9; 64]);
        assert_eq!(before, request.signable_bytes());
    }

    #[test]
    fn signable_bytes_are_deterministic() {
        let kp = keypair_from_seed(&[4; 32]);
        let a = request_fixture(&kp);
        let b = request_fixture(&kp);
        assert_eq!(a.signable_bytes(), b.signable_bytes());
    }

    #[test]
    fn response_sign_verify_round_trip() {
        let kp = generate_keypair();
        let response = VerificationResponse::signed(
            random_nonce(),
            MinerId(kp.public),
            vec![Evidence {
                url: "https://example.org/a".into(),
                excerpt: "the moon orbits the earth every 27 days".into(),
            }],
            0.9,
            Timestamp::from_millis(2_000),
            &kp.private,
        );
        assert!(response.verify());
    }

    #[test]
    fn response_signed_by_other_key_fails() {
        let kp = generate_keypair();
        let other = generate_keypair();
        // Claims to be `kp` but signs with `other`.
        let response = VerificationResponse::signed(
            random_nonce(),
            MinerId(kp.public),
            vec![],
            0.5,
            Timestamp::from_millis(2_000),
            &other.private,
        );
        assert!(!response.verify());
    }

    #[test]
    fn wire_message_round_trips_through_bincode() {
        let kp = keypair_from_seed(&[5; 32]);
        let frame = WireMessage::Request(request_fixture(&kp));
        let bytes = bincode::serialize(&frame).unwrap();
        let back: WireMessage = bincode::deserialize(&bytes).unwrap();
        match back {
            WireMessage::Request(r) => assert!(r.verify()),
            _ => panic!("expected request frame"),
        }
    }
}
