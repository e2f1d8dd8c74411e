//! RPC Manager Module
//!
//! The network seam of the pipeline. [`LedgerTransport`] is everything the
//! submission engine needs from a node; [`rpc_transport::RpcTransport`] speaks
//! JSON-RPC and PubSub to a real cluster and [`loopback::LoopbackLedger`] is an
//! in-memory ledger for tests and dry runs.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use solana_sdk::{signature::Signature, transaction::VersionedTransaction};
use tokio::sync::mpsc;

use crate::types::{Commitment, FreshnessToken, SignatureStatus};

// Submodules
pub mod loopback;
pub mod rpc_errors;
pub mod rpc_transport;

// Re-exports for convenience
pub use loopback::{LoopbackLedger, BLOCKHASH_VALIDITY_BLOCKS};
pub use rpc_errors::TransportError;
pub use rpc_transport::RpcTransport;

pub type TransportResult<T> = Result<T, TransportError>;

/// Options forwarded with a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Send without simulating first
    pub skip_preflight: bool,
    /// Commitment the simulation runs against
    pub preflight_commitment: Commitment,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}

/// One notification for a watched signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEvent {
    /// Level reached
    pub commitment: Commitment,
    /// Slot the notification refers to
    pub slot: u64,
    /// Execution error if the transaction failed on-chain
    pub err: Option<String>,
}

/// Stream of confirmation events for one signature.
///
/// Dropping the handle releases the subscription on the node. Other
/// subscriptions on the same transport are unaffected.
pub struct ConfirmationSubscription {
    signature: Signature,
    events: mpsc::Receiver<ConfirmationEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ConfirmationSubscription {
    /// Build a subscription from an event channel and a release hook run on drop
    pub fn new(
        signature: Signature,
        events: mpsc::Receiver<ConfirmationEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            signature,
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl Stream for ConfirmationSubscription {
    type Item = ConfirmationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for ConfirmationSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ConfirmationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationSubscription")
            .field("signature", &self.signature)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Node access needed by the submission engine.
///
/// Implementations are shared across concurrent pipelines behind an `Arc`
/// and must not require caller-side locking.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Endpoint label for logs
    fn endpoint(&self) -> &str;

    /// Most recent blockhash and its last valid block height
    async fn latest_blockhash(&self, commitment: Commitment) -> TransportResult<FreshnessToken>;

    /// Hand a signed transaction to the node
    async fn broadcast(
        &self,
        transaction: &VersionedTransaction,
        config: BroadcastConfig,
    ) -> TransportResult<Signature>;

    /// Watch a signature until it reaches `commitment`
    async fn subscribe_signature(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> TransportResult<ConfirmationSubscription>;

    /// Current status, `None` when the node has not seen the signature
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> TransportResult<Option<SignatureStatus>>;

    /// Current block height at `commitment`
    async fn block_height(&self, commitment: Commitment) -> TransportResult<u64>;
}
