//! The outstanding-request table: every issued nonce, what it was issued
//! for, and to whom.
//!
//! Admission is the trust boundary for responses. A response is accepted
//! only when its nonce is outstanding, it names the miner the request
//! targeted, and its signature verifies. Expired nonces are kept as
//! tombstones for a retention window so that a late reply from an honest
//! miner (already penalized as a timeout) is distinguishable from a
//! nonce forgery, which draws the maximum penalty. A rejection does not
//! consume the pending entry — the genuine response can still arrive.

use std::collections::HashMap;

use attest_messages::VerificationResponse;
use attest_types::{ClaimId, MinerId, Nonce, Timestamp};

use crate::error::TransportError;

/// A request that has been issued and not yet answered or expired.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub claim_id: ClaimId,
    pub miner: MinerId,
    pub issued_at: Timestamp,
    /// The owning round's deadline; admission past this point is handled
    /// by round expiry, not this table.
    pub expires_at: Timestamp,
}

/// Table of issued nonces plus tombstones of recently expired ones.
pub struct OutstandingRequests {
    pending: HashMap<Nonce, PendingRequest>,
    /// Expired nonce → when to forget it entirely.
    tombstones: HashMap<Nonce, Timestamp>,
    tombstone_ttl_ms: u64,
}

impl OutstandingRequests {
    pub fn new(tombstone_ttl_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            tombstones: HashMap::new(),
            tombstone_ttl_ms,
        }
    }

    /// Record an issued request under its nonce.
    pub fn register(&mut self, nonce: Nonce, request: PendingRequest) {
        self.pending.insert(nonce, request);
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Validate a response against the table and consume its entry.
    ///
    /// On success the pending request is removed and returned — the
    /// caller uses `issued_at` for latency scoring. On failure the entry
    /// is left in place (except for tombstoned nonces, which were
    /// already gone) so a genuine response can still arrive.
    pub fn admit(
        &mut self,
        response: &VerificationResponse,
    ) -> Result<PendingRequest, TransportError> {
        let target = self.pending.get(&response.nonce).map(|p| p.miner);
        match target {
            Some(miner) if miner == response.miner => {
                if !response.verify() {
                    return Err(TransportError::BadSignature);
                }
                Ok(self
                    .pending
                    .remove(&response.nonce)
                    .expect("entry present under checked key"))
            }
            Some(_) => {
                // The nonce exists but was issued to a different miner.
                // A valid signature proves the signer is replaying
                // someone else's nonce.
                if response.verify() {
                    Err(TransportError::ForgedNonce)
                } else {
                    Err(TransportError::BadSignature)
                }
            }
            None => {
                if self.tombstones.contains_key(&response.nonce) {
                    return Err(TransportError::LateResponse);
                }
                if response.verify() {
                    Err(TransportError::ForgedNonce)
                } else {
                    Err(TransportError::BadSignature)
                }
            }
        }
    }

    /// Expire every outstanding request for `claim_id`, converting the
    /// entries to tombstones. Returns the miners that never answered.
    pub fn expire_round(&mut self, claim_id: &ClaimId, now: Timestamp) -> Vec<MinerId> {
        let expired: Vec<Nonce> = self
            .pending
            .iter()
            .filter(|(_, p)| p.claim_id == *claim_id)
            .map(|(nonce, _)| *nonce)
            .collect();

        let forget_at = now.plus_millis(self.tombstone_ttl_ms);
        let mut miners = Vec::with_capacity(expired.len());
        for nonce in expired {
            if let Some(pending) = self.pending.remove(&nonce) {
                miners.push(pending.miner);
                self.tombstones.insert(nonce, forget_at);
            }
        }
        miners
    }

    /// Drop tombstones whose retention window has passed.
    pub fn sweep_tombstones(&mut self, now: Timestamp) {
        self.tombstones.retain(|_, forget_at| !forget_at.is_past(now));
    }

    #[cfg(test)]
    fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }
}
