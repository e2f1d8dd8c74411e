//! In-memory ledger for tests and dry runs
//!
//! Behaves like a single honest node at the transport boundary: it checks
//! signatures and blockhash freshness, simulates before accepting unless
//! preflight is skipped, answers status queries and pushes signature
//! notifications. It does not execute programs; a program can be marked as
//! failing to exercise the on-chain error path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{
    BroadcastConfig, ConfirmationEvent, ConfirmationSubscription, LedgerTransport,
    TransportError, TransportResult,
};
use crate::compat;
use crate::types::{Commitment, FreshnessToken, SignatureStatus};

/// Blocks a blockhash stays valid after it is produced
pub const BLOCKHASH_VALIDITY_BLOCKS: u64 = 150;

const ENDPOINT: &str = "loopback";
const SUBSCRIPTION_BUFFER: usize = 4;

const ALREADY_PROCESSED: &str =
    "Transaction simulation failed: This transaction has already been processed";
const BLOCKHASH_NOT_FOUND: &str = "Transaction simulation failed: Blockhash not found";
const SIGNATURE_FAILURE: &str = "Transaction signature verification failure";
const PROGRAM_FAILURE: &str = "InstructionError(0, Custom(1))";

struct WatchEntry {
    signature: Signature,
    commitment: Commitment,
    sender: mpsc::Sender<ConfirmationEvent>,
    notified: bool,
}

#[derive(Default)]
struct LedgerState {
    /// Blockhash -> last valid block height
    blockhashes: HashMap<Hash, u64>,
    latest: Option<FreshnessToken>,
    /// Accepted but not yet landed
    pending: HashSet<Signature>,
    landed: HashMap<Signature, SignatureStatus>,
    failing_programs: HashSet<Pubkey>,
}

/// In-memory [`LedgerTransport`]
pub struct LoopbackLedger {
    state: Mutex<LedgerState>,
    block_height: AtomicU64,
    auto_confirm: bool,
    unreachable: AtomicBool,
    watchers: Arc<DashMap<u64, WatchEntry>>,
    next_watch_id: AtomicU64,
    broadcasts: AtomicUsize,
}

impl Default for LoopbackLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackLedger {
    /// Ledger that finalizes every accepted transaction immediately
    pub fn new() -> Self {
        Self::with_auto_confirm(true)
    }

    /// Ledger that holds accepted transactions until [`LoopbackLedger::advance`]
    pub fn manual() -> Self {
        Self::with_auto_confirm(false)
    }

    fn with_auto_confirm(auto_confirm: bool) -> Self {
        let ledger = Self {
            state: Mutex::new(LedgerState::default()),
            block_height: AtomicU64::new(1),
            auto_confirm,
            unreachable: AtomicBool::new(false),
            watchers: Arc::new(DashMap::new()),
            next_watch_id: AtomicU64::new(0),
            broadcasts: AtomicUsize::new(0),
        };
        ledger.produce_blockhash(1);
        ledger
    }

    fn produce_blockhash(&self, height: u64) -> FreshnessToken {
        let token = FreshnessToken::new(Hash::new_unique(), height + BLOCKHASH_VALIDITY_BLOCKS);
        let mut state = self.state.lock();
        state
            .blockhashes
            .insert(token.blockhash, token.last_valid_block_height);
        state.latest = Some(token);
        token
    }

    /// Produce `blocks` new blocks, each with a fresh blockhash
    pub fn advance_blocks(&self, blocks: u64) -> u64 {
        let height = self.block_height.fetch_add(blocks, Ordering::SeqCst) + blocks;
        self.produce_blockhash(height);
        trace!(height, "Loopback ledger advanced");
        height
    }

    /// Move a broadcast transaction to `level`, landing it if needed.
    ///
    /// Returns false when the signature was never accepted.
    pub fn advance(&self, signature: &Signature, level: Commitment) -> bool {
        let status = {
            let mut state = self.state.lock();
            let slot = self.block_height.load(Ordering::SeqCst);
            if state.pending.remove(signature) {
                state.landed.insert(
                    *signature,
                    SignatureStatus {
                        commitment: level,
                        slot,
                        err: None,
                    },
                );
            }
            match state.landed.get_mut(signature) {
                Some(status) => {
                    if level > status.commitment {
                        status.commitment = level;
                    }
                    status.clone()
                }
                None => return false,
            }
        };
        self.notify(signature, &status);
        true
    }

    /// Transactions invoking `program_id` land with an execution error
    pub fn fail_program(&self, program_id: Pubkey) {
        self.state.lock().failing_programs.insert(program_id);
    }

    /// Every call fails as if the node were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Live confirmation subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.watchers.len()
    }

    /// Broadcast calls received, accepted or not
    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }

    pub fn current_block_height(&self) -> u64 {
        self.block_height.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> TransportResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable {
                endpoint: ENDPOINT.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn notify(&self, signature: &Signature, status: &SignatureStatus) {
        for mut entry in self.watchers.iter_mut() {
            let watch = entry.value_mut();
            if watch.notified
                || watch.signature != *signature
                || !status.commitment.satisfies(watch.commitment)
            {
                continue;
            }
            let event = ConfirmationEvent {
                commitment: watch.commitment,
                slot: status.slot,
                err: status.err.clone(),
            };
            // Receivers that went away are cleaned up by their release hook
            if watch.sender.try_send(event).is_ok() {
                watch.notified = true;
            }
        }
    }
}

#[async_trait]
impl LedgerTransport for LoopbackLedger {
    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    async fn latest_blockhash(&self, _commitment: Commitment) -> TransportResult<FreshnessToken> {
        self.check_reachable()?;
        let latest = self.state.lock().latest;
        match latest {
            Some(token) => Ok(token),
            None => Ok(self.produce_blockhash(self.current_block_height())),
        }
    }

    async fn broadcast(
        &self,
        transaction: &VersionedTransaction,
        config: BroadcastConfig,
    ) -> TransportResult<Signature> {
        self.check_reachable()?;
        self.broadcasts.fetch_add(1, Ordering::SeqCst);

        let required = compat::get_num_required_signatures(&transaction.message) as usize;
        let verified = transaction.verify_with_results();
        if verified.len() != required || verified.iter().any(|ok| !ok) {
            return Err(TransportError::Rejected {
                reason: SIGNATURE_FAILURE.to_string(),
            });
        }
        let Some(signature) = transaction.signatures.first().copied() else {
            return Err(TransportError::Rejected {
                reason: SIGNATURE_FAILURE.to_string(),
            });
        };

        let height = self.current_block_height();
        let landed = {
            let mut state = self.state.lock();

            // Blockhash age is checked before the status cache
            let fresh = state
                .blockhashes
                .get(transaction.message.recent_blockhash())
                .is_some_and(|last_valid| height <= *last_valid);
            if !fresh {
                if config.skip_preflight {
                    // Accepted by the node, dropped by the leader
                    debug!(%signature, "Stale blockhash, transaction will never land");
                    return Ok(signature);
                }
                return Err(TransportError::Preflight {
                    reason: BLOCKHASH_NOT_FOUND.to_string(),
                });
            }

            if state.pending.contains(&signature) || state.landed.contains_key(&signature) {
                if config.skip_preflight {
                    return Ok(signature);
                }
                return Err(TransportError::Preflight {
                    reason: ALREADY_PROCESSED.to_string(),
                });
            }

            let keys = compat::get_static_account_keys(&transaction.message);
            let fails = transaction.message.instructions().iter().any(|ix| {
                keys.get(ix.program_id_index as usize)
                    .is_some_and(|program| state.failing_programs.contains(program))
            });
            if fails && !config.skip_preflight {
                return Err(TransportError::Preflight {
                    reason: format!(
                        "Transaction simulation failed: Error processing Instruction 0: {}",
                        PROGRAM_FAILURE
                    ),
                });
            }

            if self.auto_confirm || fails {
                let status = SignatureStatus {
                    commitment: if self.auto_confirm {
                        Commitment::Finalized
                    } else {
                        Commitment::Processed
                    },
                    slot: height,
                    err: fails.then(|| PROGRAM_FAILURE.to_string()),
                };
                state.landed.insert(signature, status.clone());
                Some(status)
            } else {
                state.pending.insert(signature);
                None
            }
        };

        if let Some(status) = landed {
            self.notify(&signature, &status);
        }
        debug!(%signature, "Loopback ledger accepted transaction");
        Ok(signature)
    }

    async fn subscribe_signature(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> TransportResult<ConfirmationSubscription> {
        self.check_reachable()?;
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let id = self.next_watch_id.fetch_add(1, Ordering::SeqCst);
        self.watchers.insert(
            id,
            WatchEntry {
                signature: *signature,
                commitment,
                sender,
                notified: false,
            },
        );

        let watchers = Arc::clone(&self.watchers);
        Ok(ConfirmationSubscription::new(*signature, receiver, move || {
            watchers.remove(&id);
        }))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> TransportResult<Option<SignatureStatus>> {
        self.check_reachable()?;
        Ok(self.state.lock().landed.get(signature).cloned())
    }

    async fn block_height(&self, _commitment: Commitment) -> TransportResult<u64> {
        self.check_reachable()?;
        Ok(self.current_block_height())
    }
}
