//! Commit-then-confirm submission
//!
//! A submission subscribes before it broadcasts so a fast confirmation cannot
//! slip between the two. After the broadcast it checks the signature status
//! once, which covers a transaction that landed on an earlier attempt, and
//! then waits on three sources at once:
//!
//! - the confirmation subscription
//! - a block-height watcher that detects an expired blockhash
//! - a wall-clock deadline
//!
//! Nothing is retried. Every outcome is handed back to the caller.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use solana_sdk::signature::Signature;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{BroadcastConfig, LedgerTransport, TransportError};
use crate::tx_builder::{TxPipelineError, ValidatedTransaction};
use crate::types::{Commitment, FreshnessToken, SignatureStatus};

/// Options for one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Level the transaction must reach
    pub commitment: Commitment,
    /// Broadcast without simulating first
    pub skip_preflight: bool,
    /// Wall-clock bound on the confirmation wait
    pub confirmation_timeout: Duration,
    /// How often the block height is compared with the blockhash window
    pub block_height_poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            skip_preflight: false,
            confirmation_timeout: Duration::from_secs(90),
            block_height_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Where a rejected transaction was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionStage {
    /// Simulation failed; the transaction was never forwarded
    Preflight,
    /// The node refused it
    Broadcast,
    /// It landed and failed on-chain
    Execution,
}

impl RejectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionStage::Preflight => "preflight",
            RejectionStage::Broadcast => "broadcast",
            RejectionStage::Execution => "execution",
        }
    }
}

/// Network's refusal, reason kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub stage: RejectionStage,
    pub reason: String,
}

/// Terminal outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// Reached the requested commitment without error
    Confirmed(Signature),
    Rejected(Rejection),
    /// Deadline passed with no decision; the transaction may still land
    TimedOut(Signature),
}

impl SubmissionResult {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionResult::Confirmed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionResult::Confirmed(_) => "confirmed",
            SubmissionResult::Rejected(_) => "rejected",
            SubmissionResult::TimedOut(_) => "timed_out",
        }
    }

    /// Map onto the error taxonomy; only `Confirmed` is `Ok`
    pub fn into_result(self) -> Result<Signature, TxPipelineError> {
        match self {
            SubmissionResult::Confirmed(signature) => Ok(signature),
            SubmissionResult::Rejected(Rejection { stage, reason }) => Err(match stage {
                RejectionStage::Preflight => TxPipelineError::PreflightRejected(reason),
                RejectionStage::Broadcast => TxPipelineError::BroadcastRejected(reason),
                RejectionStage::Execution => TxPipelineError::ExecutionFailed(reason),
            }),
            SubmissionResult::TimedOut(signature) => {
                Err(TxPipelineError::ConfirmationTimedOut(signature))
            }
        }
    }
}

fn outcome_from_status(signature: Signature, err: Option<String>) -> SubmissionResult {
    match err {
        None => SubmissionResult::Confirmed(signature),
        Some(reason) => SubmissionResult::Rejected(Rejection {
            stage: RejectionStage::Execution,
            reason,
        }),
    }
}

/// Sends validated transactions over a shared transport
#[derive(Clone)]
pub struct SubmissionEngine {
    transport: Arc<dyn LedgerTransport>,
}

impl SubmissionEngine {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn LedgerTransport> {
        &self.transport
    }

    /// Fetch a fresh validity window for a new message
    pub async fn fetch_lifetime(
        &self,
        commitment: Commitment,
    ) -> Result<FreshnessToken, TxPipelineError> {
        self.transport
            .latest_blockhash(commitment)
            .await
            .map_err(|e| self.transport_failure(e))
    }

    /// Current outcome of `signature`, if it has reached `commitment`.
    ///
    /// `None` means undecided: not seen yet, or seen below the level.
    pub async fn query_status(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Option<SubmissionResult>, TxPipelineError> {
        let status = self
            .transport
            .signature_status(signature)
            .await
            .map_err(|e| self.transport_failure(e))?;
        Ok(status
            .filter(|s: &SignatureStatus| s.commitment.satisfies(commitment))
            .map(|s| outcome_from_status(*signature, s.err)))
    }

    /// Submit and wait for a terminal outcome.
    ///
    /// # Errors
    ///
    /// - [`TxPipelineError::StaleFreshnessToken`] when the block height passes
    ///   the blockhash window and the node has never seen the transaction
    /// - [`TxPipelineError::Transport`] when the node cannot be reached before
    ///   the broadcast is accepted; later failures end in `TimedOut` instead
    #[instrument(
        skip(self, transaction, options),
        fields(signature = %transaction.signature(), commitment = %options.commitment)
    )]
    pub async fn submit(
        &self,
        transaction: &ValidatedTransaction,
        options: &SubmitOptions,
    ) -> Result<SubmissionResult, TxPipelineError> {
        let m = metrics();
        m.submissions_total.inc();
        m.transaction_size.observe(transaction.size() as f64);

        let signature = transaction.signature();
        let lifetime = *transaction.lifetime();
        let last_valid_block_height = lifetime.last_valid_block_height;

        let subscription = self
            .transport
            .subscribe_signature(&signature, options.commitment)
            .await
            .map_err(|e| self.transport_failure(e))?;
        m.active_subscriptions.inc();
        let mut subscription = scopeguard::guard(subscription, |subscription| {
            drop(subscription);
            m.active_subscriptions.dec();
        });
        let timer = Timer::new();

        let config = BroadcastConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: options.commitment,
        };
        let refused = match self.transport.broadcast(transaction.transaction(), config).await {
            Ok(sent) => {
                if sent != signature {
                    warn!(%sent, "Node reported a different signature");
                }
                debug!("Broadcast accepted");
                None
            }
            Err(e) if e.is_already_processed() => {
                info!("Transaction already processed, checking its status");
                None
            }
            Err(TransportError::Preflight { reason }) => Some(reject(RejectionStage::Preflight, reason)),
            Err(TransportError::Rejected { reason }) => Some(reject(RejectionStage::Broadcast, reason)),
            Err(e) => return Err(self.transport_failure(e)),
        };

        if let Some(rejection) = refused {
            // A landed transaction whose blockhash has since expired is refused too
            match self.transport.signature_status(&signature).await {
                Ok(Some(status)) if status.commitment.satisfies(options.commitment) => {
                    info!(level = %status.commitment, "Refused transaction had already landed");
                    return Ok(self.finish(outcome_from_status(signature, status.err), &timer));
                }
                Ok(Some(status)) => {
                    info!(level = %status.commitment, "Refused transaction had already landed, waiting for commitment");
                }
                Ok(None) => return Ok(self.finish(rejection, &timer)),
                Err(e) => {
                    self.note_transport_failure(&e);
                    return Ok(self.finish(rejection, &timer));
                }
            }
        }

        // From here on the transaction may land at any moment: transport
        // failures are logged and the next tick tries again.
        if let Ok(Some(outcome)) = self.query_status(&signature, options.commitment).await {
            return Ok(self.finish(outcome, &timer));
        }

        let deadline = tokio::time::sleep(options.confirmation_timeout);
        tokio::pin!(deadline);
        let mut height_watch = tokio::time::interval(options.block_height_poll_interval);
        height_watch.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        height_watch.tick().await;
        let mut subscription_open = true;
        let mut landed_below = false;

        loop {
            tokio::select! {
                event = subscription.next(), if subscription_open => match event {
                    Some(event) if event.commitment.satisfies(options.commitment) => {
                        debug!(slot = event.slot, "Confirmation notification");
                        return Ok(self.finish(outcome_from_status(signature, event.err), &timer));
                    }
                    Some(event) => {
                        debug!(level = %event.commitment, "Below requested commitment");
                    }
                    None => {
                        warn!("Confirmation subscription closed, polling status instead");
                        subscription_open = false;
                    }
                },
                _ = height_watch.tick() => {
                    if !subscription_open {
                        if let Ok(Some(outcome)) = self.query_status(&signature, options.commitment).await {
                            return Ok(self.finish(outcome, &timer));
                        }
                    }
                    let expired = match self.transport.block_height(options.commitment).await {
                        Ok(height) => lifetime.is_expired_at(height).then_some(height),
                        Err(e) => {
                            self.note_transport_failure(&e);
                            None
                        }
                    };
                    if let Some(height) = expired {
                        // Seen at any level means it landed inside the window
                        match self.transport.signature_status(&signature).await {
                            Ok(Some(status)) if status.commitment.satisfies(options.commitment) => {
                                return Ok(self.finish(outcome_from_status(signature, status.err), &timer));
                            }
                            Ok(Some(status)) => {
                                if !landed_below {
                                    info!(level = %status.commitment, height, "Landed before the blockhash expired, waiting for commitment");
                                    landed_below = true;
                                }
                            }
                            Ok(None) => {
                                m.stale_tokens_total.inc();
                                warn!(height, last_valid_block_height, "Blockhash expired before landing");
                                return Err(TxPipelineError::StaleFreshnessToken {
                                    signature,
                                    last_valid_block_height,
                                });
                            }
                            Err(e) => self.note_transport_failure(&e),
                        }
                    }
                },
                _ = &mut deadline => {
                    m.timeouts_total.inc();
                    warn!(timeout = ?options.confirmation_timeout, "Confirmation deadline reached");
                    return Ok(SubmissionResult::TimedOut(signature));
                }
            }
        }
    }

    fn finish(&self, outcome: SubmissionResult, timer: &Timer) -> SubmissionResult {
        let m = metrics();
        match &outcome {
            SubmissionResult::Confirmed(signature) => {
                m.confirmations_total.inc();
                timer.observe_duration(&m.confirmation_latency);
                info!(%signature, "Transaction confirmed");
            }
            SubmissionResult::Rejected(rejection) => {
                m.record_rejection(rejection.stage.as_str());
                warn!(stage = rejection.stage.as_str(), reason = %rejection.reason, "Transaction rejected");
            }
            SubmissionResult::TimedOut(_) => m.timeouts_total.inc(),
        }
        outcome
    }

    fn transport_failure(&self, err: TransportError) -> TxPipelineError {
        self.note_transport_failure(&err);
        TxPipelineError::from(err)
    }

    fn note_transport_failure(&self, err: &TransportError) {
        metrics().transport_errors_total.inc();
        warn!(endpoint = self.transport.endpoint(), error = %err, "Transport failure");
    }
}

fn reject(stage: RejectionStage, reason: String) -> SubmissionResult {
    SubmissionResult::Rejected(Rejection { stage, reason })
}
