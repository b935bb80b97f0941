//! The validator node — owns every engine and runs the daemon loop.
//!
//! Four tick tasks plus the response intake loop, each `select!`ing on
//! the shutdown signal. Locks are per-entity and never held across
//! network I/O; the spawned request tasks only touch the intake channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use attest_consensus::{EvidenceHashRule, ResponseAggregator, RoundEvent};
use attest_crypto::{generate_keypair, keypair_from_seed};
use attest_registry::MinerRegistry;
use attest_transport::{MinerTransport, OutstandingRequests, TransportError};
use attest_types::{Claim, ClaimId, KeyPair, MinerId, Timestamp, ValidatorParams};
use attest_weights::TrustEngine;

use crate::claim_queue::ClaimQueue;
use crate::config::ValidatorConfig;
use crate::discovery::{PeerDiscovery, StaticDiscovery};
use crate::dispatch::{dispatch_claim, DispatchContext, IntakeEvent};
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::submit::{JsonFileSink, SnapshotSink};

/// Capacity of the response intake channel.
const INTAKE_CHANNEL_CAPACITY: usize = 4_096;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running validator node.
pub struct ValidatorNode<T: MinerTransport> {
    pub config: ValidatorConfig,
    params: ValidatorParams,
    identity: Arc<KeyPair>,
    registry: Arc<RwLock<MinerRegistry>>,
    aggregator: Arc<Mutex<ResponseAggregator>>,
    trust: Arc<Mutex<TrustEngine>>,
    queue: Arc<Mutex<ClaimQueue>>,
    outstanding: Arc<Mutex<OutstandingRequests>>,
    transport: Arc<T>,
    discovery: Arc<dyn PeerDiscovery>,
    sink: Arc<dyn SnapshotSink>,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    intake_tx: mpsc::Sender<IntakeEvent>,
    intake_rx: Option<mpsc::Receiver<IntakeEvent>>,
    task_handles: Vec<JoinHandle<()>>,
}

impl<T: MinerTransport> ValidatorNode<T> {
    /// Build a node from configuration with the default discovery
    /// (static, from the config's miner list) and snapshot sink (JSON
    /// file in the data directory).
    pub fn new(config: ValidatorConfig, transport: T) -> Result<Self, NodeError> {
        let discovery = Arc::new(StaticDiscovery::from_entries(&config.miners)?);
        std::fs::create_dir_all(&config.data_dir)?;
        let sink = Arc::new(JsonFileSink::new(&config.data_dir));
        Self::with_collaborators(config, transport, discovery, sink)
    }

    /// Build a node with explicit discovery and sink collaborators.
    pub fn with_collaborators(
        config: ValidatorConfig,
        transport: T,
        discovery: Arc<dyn PeerDiscovery>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<Self, NodeError> {
        let params = config.params.clone();
        let identity = Arc::new(load_identity(&config)?);
        tracing::info!(
            validator = %MinerId(identity.public).short(),
            "validator identity loaded"
        );

        let (intake_tx, intake_rx) = mpsc::channel(INTAKE_CHANNEL_CAPACITY);

        Ok(Self {
            registry: Arc::new(RwLock::new(MinerRegistry::from_params(&params))),
            aggregator: Arc::new(Mutex::new(ResponseAggregator::new(
                params.clone(),
                Box::new(EvidenceHashRule),
            ))),
            trust: Arc::new(Mutex::new(TrustEngine::from_params(&params))),
            queue: Arc::new(Mutex::new(ClaimQueue::new(params.max_queue_depth))),
            outstanding: Arc::new(Mutex::new(OutstandingRequests::new(
                params.nonce_tombstone_ms,
            ))),
            transport: Arc::new(transport),
            discovery,
            sink,
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            identity,
            params,
            config,
            intake_tx,
            intake_rx: Some(intake_rx),
            task_handles: Vec::new(),
        })
    }

    /// The registry handle (shared with the tick tasks).
    pub fn registry(&self) -> Arc<RwLock<MinerRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Enqueue a claim for dispatch on the next tick. This is the
    /// ingestion point for the external API collaborator.
    pub async fn submit_claim(&self, claim: Claim) -> Result<(), NodeError> {
        let mut queue = self.queue.lock().await;
        if queue.contains(&claim.id) {
            return Err(NodeError::DuplicateClaim(claim.id));
        }
        if !queue.try_push(claim) {
            return Err(NodeError::QueueFull);
        }
        self.metrics.claims_submitted.inc();
        self.metrics.queued_claims.set(queue.len() as i64);
        Ok(())
    }

    /// Build a claim from a statement using this node's default quorum
    /// and round window.
    pub fn make_claim(&self, statement: impl Into<String>, sources: Vec<String>) -> Claim {
        Claim::new(
            statement,
            sources,
            self.params.required_quorum,
            self.params.round_window_ms,
            Timestamp::now(),
        )
    }

    /// Start every background task. Returns once the loops are running.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        // Seed the registry before the first dispatch tick so early
        // claims see the bootstrap miners.
        match self.discovery.fetch() {
            Ok(endpoints) => {
                let mut registry = self.registry.write().await;
                registry.reconcile(&endpoints, Timestamp::now());
                self.metrics.active_miners.set(registry.active_count() as i64);
            }
            Err(e) => tracing::warn!(error = %e, "initial discovery fetch failed"),
        }

        self.spawn_intake_loop();
        self.spawn_dispatch_tick();
        self.spawn_reconcile_tick();
        self.spawn_snapshot_tick();
        self.spawn_discovery_tick();
        tracing::info!("validator node started");
        Ok(())
    }

    /// Trigger shutdown and wait for every task to finish.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        self.shutdown.trigger();
        for handle in self.task_handles.drain(..) {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                return Err(NodeError::ShutdownTimeout);
            }
        }
        tracing::info!("validator node stopped");
        Ok(())
    }

    // ── Background tasks ────────────────────────────────────────────────

    fn spawn_intake_loop(&mut self) {
        let mut intake_rx = self
            .intake_rx
            .take()
            .expect("start is called once per node");
        let registry = Arc::clone(&self.registry);
        let aggregator = Arc::clone(&self.aggregator);
        let outstanding = Arc::clone(&self.outstanding);
        let trust = Arc::clone(&self.trust);
        let metrics = Arc::clone(&self.metrics);
        let params = self.params.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("intake loop shutting down");
                        break;
                    }
                    event = intake_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                handle_intake(
                    event,
                    &registry,
                    &aggregator,
                    &outstanding,
                    &trust,
                    &metrics,
                    &params,
                )
                .await;
            }
        });
        self.task_handles.push(handle);
    }

    fn spawn_dispatch_tick(&mut self) {
        let ctx = DispatchContext {
            registry: Arc::clone(&self.registry),
            aggregator: Arc::clone(&self.aggregator),
            outstanding: Arc::clone(&self.outstanding),
            transport: Arc::clone(&self.transport),
            identity: Arc::clone(&self.identity),
            params: self.params.clone(),
            intake_tx: self.intake_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        };
        let queue = Arc::clone(&self.queue);
        let metrics = Arc::clone(&self.metrics);
        let tick = Duration::from_millis(self.params.dispatch_tick_ms);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("dispatch tick shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let pending = {
                            let mut queue = queue.lock().await;
                            let drained = queue.drain();
                            metrics.queued_claims.set(0);
                            drained
                        };
                        for claim in pending {
                            dispatch_claim(&ctx, claim).await;
                        }
                    }
                }
            }
        });
        self.task_handles.push(handle);
    }

    fn spawn_reconcile_tick(&mut self) {
        let registry = Arc::clone(&self.registry);
        let aggregator = Arc::clone(&self.aggregator);
        let outstanding = Arc::clone(&self.outstanding);
        let trust = Arc::clone(&self.trust);
        let metrics = Arc::clone(&self.metrics);
        let tick = Duration::from_millis(self.params.reconcile_tick_ms);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("reconcile tick shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Timestamp::now();
                        let (outcomes, events) = {
                            let mut aggregator = aggregator.lock().await;
                            let outcomes = aggregator.settle_due(now);
                            let events = aggregator.drain_events();
                            metrics.live_rounds.set(aggregator.live_rounds() as i64);
                            (outcomes, events)
                        };

                        for event in events {
                            match event {
                                RoundEvent::Finalized { claim_id, verdict } => {
                                    metrics.rounds_finalized.inc();
                                    tracing::info!(
                                        claim = %claim_id.short(),
                                        supporters = verdict.supporters.len(),
                                        "verdict reached"
                                    );
                                }
                                RoundEvent::Expired { claim_id } => {
                                    metrics.rounds_expired.inc();
                                    tracing::warn!(claim = %claim_id.short(), "quorum unreachable");
                                }
                                RoundEvent::Settled { .. } => {}
                            }
                        }

                        for outcome in outcomes {
                            {
                                let mut outstanding = outstanding.lock().await;
                                outstanding.expire_round(&outcome.claim_id, now);
                            }
                            metrics
                                .round_settle_ms
                                .observe(outcome.opened_at.elapsed_since(now) as f64);

                            let mut registry = registry.write().await;
                            let mut trust = trust.lock().await;
                            match trust.apply_round(&mut registry, &outcome) {
                                Ok(changes) => {
                                    tracing::debug!(
                                        claim = %outcome.claim_id.short(),
                                        miners = changes.len(),
                                        finalized = outcome.finalized,
                                        "round deltas applied"
                                    );
                                }
                                Err(e) => {
                                    tracing::error!(
                                        claim = %outcome.claim_id.short(),
                                        error = %e,
                                        "failed to apply round deltas"
                                    );
                                }
                            }
                        }

                        outstanding.lock().await.sweep_tombstones(now);
                    }
                }
            }
        });
        self.task_handles.push(handle);
    }

    fn spawn_snapshot_tick(&mut self) {
        let registry = Arc::clone(&self.registry);
        let trust = Arc::clone(&self.trust);
        let sink = Arc::clone(&self.sink);
        let metrics = Arc::clone(&self.metrics);
        let tick = Duration::from_millis(self.params.snapshot_interval_ms);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // The immediate first tick would emit an all-default snapshot.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("snapshot tick shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let snapshot = {
                            let registry = registry.read().await;
                            let trust = trust.lock().await;
                            trust.emit_snapshot(&registry, Timestamp::now())
                        };
                        debug_assert!(snapshot.is_normalized());
                        match sink.submit(&snapshot) {
                            Ok(()) => {
                                metrics.snapshots_emitted.inc();
                                tracing::debug!(miners = snapshot.weights.len(), "weight snapshot emitted");
                            }
                            Err(e) => tracing::error!(error = %e, "snapshot submission failed"),
                        }
                    }
                }
            }
        });
        self.task_handles.push(handle);
    }

    fn spawn_discovery_tick(&mut self) {
        let registry = Arc::clone(&self.registry);
        let discovery = Arc::clone(&self.discovery);
        let metrics = Arc::clone(&self.metrics);
        let tick = Duration::from_millis(self.params.discovery_interval_ms);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("discovery tick shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        match discovery.fetch() {
                            Ok(endpoints) => {
                                let mut registry = registry.write().await;
                                registry.reconcile(&endpoints, Timestamp::now());
                                metrics.active_miners.set(registry.active_count() as i64);
                            }
                            Err(e) => tracing::warn!(error = %e, "discovery fetch failed"),
                        }
                    }
                }
            }
        });
        self.task_handles.push(handle);
    }
}

/// Process one request result from the fan-out tasks.
async fn handle_intake(
    event: IntakeEvent,
    registry: &Arc<RwLock<MinerRegistry>>,
    aggregator: &Arc<Mutex<ResponseAggregator>>,
    outstanding: &Arc<Mutex<OutstandingRequests>>,
    trust: &Arc<Mutex<TrustEngine>>,
    metrics: &Arc<NodeMetrics>,
    params: &ValidatorParams,
) {
    let IntakeEvent {
        claim_id,
        miner,
        result,
    } = event;

    match result {
        Ok(response) => {
            let admitted = outstanding.lock().await.admit(&response);
            match admitted {
                Ok(pending) => {
                    let now = Timestamp::now();
                    if let Err(e) = registry.write().await.mark_seen(&response.miner, now) {
                        tracing::debug!(miner = %response.miner.short(), error = %e, "mark_seen failed");
                    }
                    let result = aggregator.lock().await.admit(
                        pending.claim_id,
                        response.miner,
                        response.evidence,
                        response.confidence,
                        now,
                    );
                    match result {
                        Ok(_) => metrics.responses_admitted.inc(),
                        Err(e) => {
                            metrics.responses_rejected.inc();
                            tracing::debug!(
                                claim = %pending.claim_id.short(),
                                miner = %response.miner.short(),
                                error = %e,
                                "response not admitted"
                            );
                        }
                    }
                }
                Err(TransportError::LateResponse) => {
                    // Already penalized as a timeout when the round expired.
                    metrics.responses_rejected.inc();
                    tracing::debug!(miner = %miner.short(), "late response dropped");
                }
                Err(e) if e.is_attributable_fault() => {
                    penalize_fault(
                        claim_id, miner, &e, registry, aggregator, trust, metrics, params,
                    )
                    .await;
                }
                Err(e) => {
                    metrics.responses_rejected.inc();
                    tracing::debug!(miner = %miner.short(), error = %e, "response rejected");
                }
            }
        }
        Err(e) if e.is_attributable_fault() => {
            penalize_fault(
                claim_id, miner, &e, registry, aggregator, trust, metrics, params,
            )
            .await;
        }
        Err(_) => {
            // Timeout, connection failure, IO: no response. The miner is
            // resolved as timed out and collects that penalty at settle.
            metrics.requests_timed_out.inc();
            if let Err(e) = aggregator.lock().await.note_timeout(claim_id, miner) {
                tracing::debug!(
                    claim = %claim_id.short(),
                    miner = %miner.short(),
                    error = %e,
                    "timeout not recorded"
                );
            }
        }
    }
}

/// Apply the maximum penalty for an attributable fault and resolve the
/// miner in its round.
#[allow(clippy::too_many_arguments)]
async fn penalize_fault(
    claim_id: ClaimId,
    miner: MinerId,
    error: &TransportError,
    registry: &Arc<RwLock<MinerRegistry>>,
    aggregator: &Arc<Mutex<ResponseAggregator>>,
    trust: &Arc<Mutex<TrustEngine>>,
    metrics: &Arc<NodeMetrics>,
    params: &ValidatorParams,
) {
    metrics.responses_faulted.inc();
    tracing::warn!(
        claim = %claim_id.short(),
        miner = %miner.short(),
        error = %error,
        "attributable transport fault — applying maximum penalty"
    );
    {
        let mut registry = registry.write().await;
        let mut trust = trust.lock().await;
        if let Err(e) = trust.apply_fault(&mut registry, &miner, params.malformed_penalty) {
            tracing::debug!(miner = %miner.short(), error = %e, "fault penalty not applied");
        }
    }
    if let Err(e) = aggregator.lock().await.note_fault(claim_id, miner) {
        tracing::debug!(
            claim = %claim_id.short(),
            miner = %miner.short(),
            error = %e,
            "fault not recorded in round"
        );
    }
}

/// Load the validator identity from the configured seed, or generate an
/// ephemeral one.
fn load_identity(config: &ValidatorConfig) -> Result<KeyPair, NodeError> {
    match &config.identity_seed {
        Some(seed_hex) => {
            let bytes = hex::decode(seed_hex)
                .map_err(|e| NodeError::Config(format!("identity_seed: {e}")))?;
            let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                NodeError::Config(format!(
                    "identity_seed must be 32 bytes, got {}",
                    bytes.len()
                ))
            })?;
            Ok(keypair_from_seed(&seed))
        }
        None => {
            tracing::warn!("no identity_seed configured — using an ephemeral identity");
            Ok(generate_keypair())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_seed_is_deterministic() {
        let config = ValidatorConfig {
            identity_seed: Some(hex::encode([9u8; 32])),
            ..ValidatorConfig::default()
        };
        let a = load_identity(&config).unwrap();
        let b = load_identity(&config).unwrap();
        assert_eq!(a.public, b.public);
    }

    #[test]
    fn short_identity_seed_rejected() {
        let config = ValidatorConfig {
            identity_seed: Some("abcd".into()),
            ..ValidatorConfig::default()
        };
        assert!(matches!(
            load_identity(&config),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn missing_seed_generates_distinct_identities() {
        let config = ValidatorConfig::default();
        let a = load_identity(&config).unwrap();
        let b = load_identity(&config).unwrap();
        assert_ne!(a.public, b.public);
    }
}
