//! Error types for the transaction pipeline
//!
//! One taxonomy covers the whole lifecycle so callers can match on a single
//! enum regardless of which stage failed:
//! - Key material generation and loading
//! - Program address derivation
//! - Message assembly and signing
//! - Size validation
//! - Broadcast and confirmation
//!
//! Nothing in the pipeline retries on its own. The helpers below only
//! classify errors so the caller can decide on a policy.

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

use crate::rpc_manager::TransportError;

/// Comprehensive error type for all pipeline operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxPipelineError {
    /// The host's secure random source or signing primitive could not be used
    #[error("Signing primitive unavailable: {0}")]
    CryptoUnavailable(String),

    /// A derivation seed exceeds the per-seed byte limit
    #[error("Seed {index} is {len} bytes, limit is {max}")]
    SeedTooLong {
        /// Position of the offending seed
        index: usize,
        /// Actual length in bytes
        len: usize,
        /// Per-seed limit
        max: usize,
    },

    /// More derivation seeds than the network accepts
    #[error("{count} seeds supplied, limit is {max}")]
    TooManySeeds {
        /// Number of caller seeds
        count: usize,
        /// Caller seed limit (the bump takes the last slot)
        max: usize,
    },

    /// Every bump in [0, 255] produced an on-curve point
    #[error("No bump in [0, 255] yields an off-curve address for program {program_id}")]
    NoValidBump {
        /// Program the derivation was attempted for
        program_id: Pubkey,
    },

    /// A required signer was not attached to the message
    #[error("Missing signer: {pubkey}")]
    MissingSigner {
        /// Account that must sign
        pubkey: Pubkey,
    },

    /// A signer's key does not match the network's signature scheme
    #[error("Signature scheme mismatch for {pubkey}: {reason}")]
    SignatureSchemeMismatch {
        /// Offending key (default pubkey when unknown)
        pubkey: Pubkey,
        /// What did not match
        reason: String,
    },

    /// The signed transaction exceeds the wire limit
    #[error("Transaction is {size} bytes, maximum is {max}")]
    TransactionTooLarge {
        /// Serialized size in bytes
        size: usize,
        /// Hard wire limit
        max: usize,
    },

    /// The transaction outlived its blockhash validity window without landing
    #[error("Blockhash expired at block height {last_valid_block_height} before {signature} landed")]
    StaleFreshnessToken {
        /// Signature that never landed
        signature: Signature,
        /// Last block height at which the blockhash was valid
        last_valid_block_height: u64,
    },

    /// Preflight simulation rejected the transaction; it was never broadcast
    #[error("Preflight rejected: {0}")]
    PreflightRejected(String),

    /// The network refused the broadcast
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// The transaction landed but its execution failed on-chain
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// No confirmation before the deadline; the transaction may still land
    #[error("Confirmation timed out for {0}")]
    ConfirmationTimedOut(Signature),

    /// Message could not be assembled or compiled
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// Transport could not be reached or misbehaved
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TxPipelineError {
    /// Only a confirmation timeout leaves the outcome undecided.
    ///
    /// The caller must re-query the signature status instead of resubmitting.
    pub fn is_uncertain(&self) -> bool {
        matches!(self, Self::ConfirmationTimedOut(_))
    }

    /// Whether recovery requires assembling a new message with a fresh blockhash
    pub fn requires_new_lifetime(&self) -> bool {
        matches!(self, Self::StaleFreshnessToken { .. })
    }

    /// Structural errors are caller-fixable and surface before any network call
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::SeedTooLong { .. }
                | Self::TooManySeeds { .. }
                | Self::NoValidBump { .. }
                | Self::MissingSigner { .. }
                | Self::SignatureSchemeMismatch { .. }
                | Self::TransactionTooLarge { .. }
                | Self::Assembly(_)
        )
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::CryptoUnavailable(_) => "crypto",
            Self::SeedTooLong { .. } | Self::TooManySeeds { .. } | Self::NoValidBump { .. } => {
                "derivation"
            }
            Self::MissingSigner { .. } | Self::SignatureSchemeMismatch { .. } => "signing",
            Self::TransactionTooLarge { .. } => "size",
            Self::StaleFreshnessToken { .. } => "blockhash",
            Self::PreflightRejected(_) => "preflight",
            Self::BroadcastRejected(_) => "broadcast",
            Self::ExecutionFailed(_) => "execution",
            Self::ConfirmationTimedOut(_) => "timeout",
            Self::Assembly(_) => "assembly",
            Self::Transport(_) => "transport",
            Self::Configuration(_) => "config",
        }
    }
}

// Convenience constructors for common error scenarios
impl TxPipelineError {
    /// Create an assembly error
    pub fn assembly(reason: impl Into<String>) -> Self {
        Self::Assembly(reason.into())
    }

    /// Create a scheme mismatch error for a known key
    pub fn scheme_mismatch(pubkey: Pubkey, reason: impl Into<String>) -> Self {
        Self::SignatureSchemeMismatch {
            pubkey,
            reason: reason.into(),
        }
    }
}

impl From<TransportError> for TxPipelineError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Preflight { reason } => Self::PreflightRejected(reason),
            TransportError::Rejected { reason } => Self::BroadcastRejected(reason),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TxPipelineError::SeedTooLong {
            index: 1,
            len: 40,
            max: 32,
        };
        assert_eq!(err.to_string(), "Seed 1 is 40 bytes, limit is 32");

        let err = TxPipelineError::PreflightRejected("Blockhash not found".to_string());
        assert_eq!(err.to_string(), "Preflight rejected: Blockhash not found");
    }

    #[test]
    fn test_only_timeout_is_uncertain() {
        assert!(TxPipelineError::ConfirmationTimedOut(Signature::default()).is_uncertain());
        assert!(!TxPipelineError::BroadcastRejected("x".to_string()).is_uncertain());
        assert!(!TxPipelineError::StaleFreshnessToken {
            signature: Signature::default(),
            last_valid_block_height: 10,
        }
        .is_uncertain());
    }

    #[test]
    fn test_stale_token_requires_new_lifetime() {
        let stale = TxPipelineError::StaleFreshnessToken {
            signature: Signature::default(),
            last_valid_block_height: 10,
        };
        assert!(stale.requires_new_lifetime());
        assert!(!stale.is_structural());
        assert!(!TxPipelineError::PreflightRejected("x".to_string()).requires_new_lifetime());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            TxPipelineError::NoValidBump {
                program_id: Pubkey::new_unique()
            }
            .category(),
            "derivation"
        );
        assert_eq!(
            TxPipelineError::MissingSigner {
                pubkey: Pubkey::new_unique()
            }
            .category(),
            "signing"
        );
        assert_eq!(
            TxPipelineError::Transport("down".to_string()).category(),
            "transport"
        );
    }

    #[test]
    fn test_transport_error_conversion_keeps_reason_verbatim() {
        let err: TxPipelineError = TransportError::Preflight {
            reason: "Transaction simulation failed: Blockhash not found".to_string(),
        }
        .into();
        assert_eq!(
            err,
            TxPipelineError::PreflightRejected(
                "Transaction simulation failed: Blockhash not found".to_string()
            )
        );

        let err: TxPipelineError = TransportError::Rejected {
            reason: "node is behind".to_string(),
        }
        .into();
        assert_eq!(err, TxPipelineError::BroadcastRejected("node is behind".to_string()));

        let err: TxPipelineError = TransportError::Unavailable {
            endpoint: "http://localhost:8899".to_string(),
            message: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, TxPipelineError::Transport(_)));
    }
}
