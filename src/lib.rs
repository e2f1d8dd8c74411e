//! Solana transaction pipeline library
//!
//! Key generation, program-derived addresses, message assembly, signing with
//! a wire-size gate, and commit-then-confirm submission over a pluggable
//! ledger transport.

pub mod compat;
pub mod config;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod programs;
pub mod rpc_manager;
pub mod structured_logging;
pub mod submit_engine;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use pipeline::{Pipeline, TransactionPlan};
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
pub use submit_engine::{SubmissionEngine, SubmissionResult, SubmitOptions};
pub use tx_builder::TxPipelineError;
pub use types::{Commitment, FreshnessToken};
