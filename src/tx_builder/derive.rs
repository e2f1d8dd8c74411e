//! Program-derived address computation
//!
//! A program-derived address (PDA) is
//! `SHA-256(seed_0 || .. || seed_n || bump || program_id || "ProgramDerivedAddress")`
//! for the first bump, searched from 255 downward, whose hash does not
//! decompress to an Ed25519 point. Being off the curve means no secret key
//! exists for it, so only the owning program can sign for the account.
//!
//! Seeds are hashed back to back without length prefixes: `["abc", "def"]`
//! and `["abcdef"]` derive the same address. Programs choose seeds that do
//! not collide with themselves.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use tracing::trace;

use crate::metrics::{metrics, Timer};
use crate::tx_builder::errors::TxPipelineError;

/// Maximum length of a single seed
pub const MAX_SEED_LEN: usize = 32;
/// Maximum number of seeds including the bump
pub const MAX_SEEDS: usize = 16;
/// Caller-supplied seeds; the bump takes the last slot
pub const MAX_CALLER_SEEDS: usize = MAX_SEEDS - 1;

const PDA_MARKER: &[u8; 21] = b"ProgramDerivedAddress";

/// Result of a successful derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Whether 32 bytes decompress to a point on the Ed25519 curve
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

fn check_seeds(seeds: &[&[u8]]) -> Result<(), TxPipelineError> {
    if seeds.len() > MAX_CALLER_SEEDS {
        return Err(TxPipelineError::TooManySeeds {
            count: seeds.len(),
            max: MAX_CALLER_SEEDS,
        });
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(TxPipelineError::SeedTooLong {
                index,
                len: seed.len(),
                max: MAX_SEED_LEN,
            });
        }
    }
    Ok(())
}

fn hash_candidate(program_id: &Pubkey, seeds: &[&[u8]], bump: u8) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);
    hasher.finalize().into()
}

/// Compute the address for one explicit bump.
///
/// Returns `Ok(None)` when that bump lands on the curve. Useful to re-verify a
/// bump stored on-chain without repeating the search.
pub fn create_program_address(
    program_id: &Pubkey,
    seeds: &[&[u8]],
    bump: u8,
) -> Result<Option<Pubkey>, TxPipelineError> {
    check_seeds(seeds)?;
    let hash = hash_candidate(program_id, seeds, bump);
    if is_on_curve(&hash) {
        return Ok(None);
    }
    Ok(Some(Pubkey::new_from_array(hash)))
}

/// Find the canonical program-derived address for `seeds` under `program_id`.
///
/// # Errors
///
/// - [`TxPipelineError::TooManySeeds`] with more than [`MAX_CALLER_SEEDS`] seeds
/// - [`TxPipelineError::SeedTooLong`] when a seed exceeds [`MAX_SEED_LEN`]
/// - [`TxPipelineError::NoValidBump`] when every bump lands on the curve
pub fn derive(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<DerivedAddress, TxPipelineError> {
    check_seeds(seeds)?;
    let timer = Timer::new();

    for bump in (0..=u8::MAX).rev() {
        let hash = hash_candidate(program_id, seeds, bump);
        if is_on_curve(&hash) {
            trace!(bump, "Candidate on curve, trying next bump");
            continue;
        }
        timer.observe_duration(&metrics().derive_latency);
        return Ok(DerivedAddress {
            address: Pubkey::new_from_array(hash),
            bump,
        });
    }

    Err(TxPipelineError::NoValidBump {
        program_id: *program_id,
    })
}
