//! Dispatch scheduler — turns a pending claim into a fan-out of signed
//! verification requests.
//!
//! One tokio task per (claim, miner); results funnel into the intake
//! channel. Requests are independent: no response blocks another's
//! issuance, and the only shared state touched here is the registry (for
//! selection) and the outstanding-nonce table (per-request registration).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};

use attest_consensus::ResponseAggregator;
use attest_crypto::random_nonce;
use attest_messages::{VerificationRequest, VerificationResponse};
use attest_registry::MinerRegistry;
use attest_transport::{MinerTransport, OutstandingRequests, PendingRequest, TransportError};
use attest_types::{Claim, ClaimId, KeyPair, MinerId, Timestamp, ValidatorParams};

use crate::metrics::NodeMetrics;

/// The result of one issued request, delivered to the intake loop.
#[derive(Debug)]
pub struct IntakeEvent {
    pub claim_id: ClaimId,
    /// The miner the request was dialed to.
    pub miner: MinerId,
    pub result: Result<VerificationResponse, TransportError>,
}

/// Everything the scheduler needs to dispatch claims.
pub struct DispatchContext<T: MinerTransport> {
    pub registry: Arc<RwLock<MinerRegistry>>,
    pub aggregator: Arc<Mutex<ResponseAggregator>>,
    pub outstanding: Arc<Mutex<OutstandingRequests>>,
    pub transport: Arc<T>,
    pub identity: Arc<KeyPair>,
    pub params: ValidatorParams,
    pub intake_tx: mpsc::Sender<IntakeEvent>,
    pub metrics: Arc<NodeMetrics>,
}

/// Dispatch one claim: select miners, open the round, and issue one
/// concurrent signed request per selected miner.
///
/// A claim with no selectable miners is dropped with a warning — the
/// external submitter may requeue it once miners are available.
pub async fn dispatch_claim<T: MinerTransport>(ctx: &DispatchContext<T>, claim: Claim) {
    let want = ctx.params.dispatch_count(claim.quorum);
    let selected = {
        let registry = ctx.registry.read().await;
        registry.select(want, &HashSet::new())
    };

    if selected.is_empty() {
        tracing::warn!(claim = %claim.id.short(), "no active miners — claim dropped");
        return;
    }
    if selected.len() < claim.quorum {
        tracing::warn!(
            claim = %claim.id.short(),
            selected = selected.len(),
            quorum = claim.quorum,
            "fewer miners than quorum — round can only expire"
        );
    }

    let now = Timestamp::now();
    let dispatched: Vec<MinerId> = selected.iter().map(|m| m.id).collect();
    if let Err(e) = ctx
        .aggregator
        .lock()
        .await
        .open_round(claim.clone(), dispatched, now)
    {
        tracing::warn!(claim = %claim.id.short(), error = %e, "failed to open round");
        return;
    }

    // The round deadline is authoritative even when shorter than the
    // per-request timeout.
    let remaining_ms = now.elapsed_since(claim.deadline);
    let request_deadline =
        Duration::from_millis(ctx.params.request_timeout_ms.min(remaining_ms.max(1)));

    for record in selected {
        let nonce = random_nonce();
        let request = VerificationRequest::signed(
            claim.id,
            claim.statement.clone(),
            claim.sources.clone(),
            nonce,
            now,
            ctx.identity.public,
            &ctx.identity.private,
        );
        ctx.outstanding.lock().await.register(
            nonce,
            PendingRequest {
                claim_id: claim.id,
                miner: record.id,
                issued_at: now,
                expires_at: claim.deadline,
            },
        );

        let transport = Arc::clone(&ctx.transport);
        let intake_tx = ctx.intake_tx.clone();
        let claim_id = claim.id;
        let miner = record.id;
        let address = record.address.clone();
        ctx.metrics.requests_issued.inc();
        tokio::spawn(async move {
            let result = transport.send(&address, request, request_deadline).await;
            // The intake loop owning the receiver may already be gone
            // during shutdown; dropping the result is fine then.
            let _ = intake_tx
                .send(IntakeEvent {
                    claim_id,
                    miner,
                    result,
                })
                .await;
        });
    }

    ctx.metrics.claims_dispatched.inc();
    tracing::debug!(claim = %claim.id.short(), "claim dispatched");
}
