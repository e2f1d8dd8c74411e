//! Common types shared by the assembler, the transports and the submission engine

use serde::{Deserialize, Serialize};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
};
use std::fmt;
use std::str::FromStr;

/// Degree of network agreement on a transaction's inclusion.
///
/// Ordered: `Processed < Confirmed < Finalized`. A wait for a level is
/// satisfied by that level or any higher one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    /// Whether an observed level satisfies a requested one
    #[inline]
    pub fn satisfies(self, requested: Commitment) -> bool {
        self >= requested
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level '{}'", other)),
        }
    }
}

impl From<Commitment> for CommitmentLevel {
    fn from(c: Commitment) -> Self {
        match c {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        }
    }
}

impl From<Commitment> for CommitmentConfig {
    fn from(c: Commitment) -> Self {
        CommitmentConfig {
            commitment: c.into(),
        }
    }
}

/// Recent blockhash plus the last block height at which it is accepted.
///
/// A transaction bound to this token can land only while the chain's block
/// height is `<= last_valid_block_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreshnessToken {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl FreshnessToken {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
        }
    }

    /// True once the chain has moved past the validity window
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

/// Point-in-time status of a signature as reported by the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    /// Highest commitment reached so far
    pub commitment: Commitment,
    /// Slot the transaction landed in
    pub slot: u64,
    /// Execution error, if the transaction failed on-chain
    pub err: Option<String>,
}
