//! Ed25519 key material generation and packing
//!
//! The network's signer constructor takes 64 bytes laid out as
//! `secret_seed ++ public_key`, secret half first. [`KeyMaterial`] owns both
//! halves and is the only place that layout is produced or parsed.

use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use zeroize::Zeroizing;

use crate::tx_builder::errors::TxPipelineError;

/// Ed25519 seed length
pub const SECRET_SEED_LEN: usize = 32;
/// Ed25519 public key length
pub const PUBLIC_KEY_LEN: usize = 32;
/// Packed keypair length handed to the signer constructor
pub const KEYPAIR_LEN: usize = SECRET_SEED_LEN + PUBLIC_KEY_LEN;

/// One Ed25519 identity. Immutable after construction; secret bytes are
/// wiped on drop.
pub struct KeyMaterial {
    secret_seed: Zeroizing<[u8; SECRET_SEED_LEN]>,
    public: [u8; PUBLIC_KEY_LEN],
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh keypair from the OS entropy source.
///
/// # Errors
///
/// Returns [`TxPipelineError::CryptoUnavailable`] when the secure random
/// source cannot be read.
pub fn generate() -> Result<KeyMaterial, TxPipelineError> {
    let mut seed = Zeroizing::new([0u8; SECRET_SEED_LEN]);
    OsRng
        .try_fill_bytes(&mut seed[..])
        .map_err(|e| TxPipelineError::CryptoUnavailable(e.to_string()))?;
    Ok(KeyMaterial::from_secret_seed(&seed))
}

impl KeyMaterial {
    /// Derive the public half from a 32-byte secret seed
    pub fn from_secret_seed(seed: &[u8; SECRET_SEED_LEN]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self {
            secret_seed: Zeroizing::new(*seed),
            public: signing_key.verifying_key().to_bytes(),
        }
    }

    /// Parse the packed `secret_seed ++ public_key` layout.
    ///
    /// The public half must be the key derived from the secret half; a
    /// mismatch means the bytes come from another scheme or another layout.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, TxPipelineError> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(TxPipelineError::scheme_mismatch(
                Pubkey::default(),
                format!("expected {} keypair bytes, got {}", KEYPAIR_LEN, bytes.len()),
            ));
        }

        let mut seed = Zeroizing::new([0u8; SECRET_SEED_LEN]);
        seed.copy_from_slice(&bytes[..SECRET_SEED_LEN]);
        let material = Self::from_secret_seed(&seed);

        if material.public[..] != bytes[SECRET_SEED_LEN..] {
            let claimed = Pubkey::try_from(&bytes[SECRET_SEED_LEN..]).unwrap_or_default();
            return Err(TxPipelineError::scheme_mismatch(
                claimed,
                "public key is not derived from the secret seed",
            ));
        }
        Ok(material)
    }

    /// Public key bytes
    pub fn public_key_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public
    }

    /// Network address of this identity
    pub fn address(&self) -> Pubkey {
        Pubkey::new_from_array(self.public)
    }

    /// Packed `secret_seed ++ public_key` bytes
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LEN]> {
        let mut out = Zeroizing::new([0u8; KEYPAIR_LEN]);
        out[..SECRET_SEED_LEN].copy_from_slice(&self.secret_seed[..]);
        out[SECRET_SEED_LEN..].copy_from_slice(&self.public);
        out
    }

    /// Build the network signer from the packed layout
    pub fn to_signer(&self) -> Result<Keypair, TxPipelineError> {
        let bytes = self.to_keypair_bytes();
        Keypair::try_from(&bytes[..])
            .map_err(|e| TxPipelineError::scheme_mismatch(self.address(), e.to_string()))
    }
}
