//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::path::Path;
use std::sync::Arc;

use crate::tx_builder::KeyMaterial;

/// Fee payer keypair loaded from disk
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    /// Create a new wallet manager from a keypair file.
    ///
    /// Accepts the CLI JSON array format or the raw 64 bytes.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path.display()))?;

        let keypair_bytes = if file_bytes.len() == 64 {
            file_bytes
        } else {
            let json: Vec<u8> =
                serde_json::from_slice(&file_bytes).context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", json.len());
            }
            json
        };

        if keypair_bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }

        let material = KeyMaterial::from_keypair_bytes(&keypair_bytes)
            .with_context(|| format!("Invalid keypair in {}", path.display()))?;
        let keypair = material.to_signer().context("Invalid keypair bytes")?;

        Ok(Self::from_keypair(keypair))
    }

    /// Create a new wallet manager from a keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Write `material` as a JSON byte array, the format `from_file` reads
    pub fn write_json(material: &KeyMaterial, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(&material.to_keypair_bytes().to_vec())
            .context("Failed to encode keypair")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write keypair file: {}", path.display()))
    }

    /// Load from a base58 secret key, the format browser wallets export
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .context("Invalid base58 keypair")?;
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let material =
            KeyMaterial::from_keypair_bytes(&bytes).context("Invalid base58 keypair bytes")?;
        Ok(Self::from_keypair(material.to_signer()?))
    }

    /// Base58 encoding of the packed 64-byte keypair
    pub fn to_base58(material: &KeyMaterial) -> String {
        bs58::encode(&material.to_keypair_bytes()[..]).into_string()
    }

    /// Get the public key
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Get a reference to the keypair
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl Clone for WalletManager {
    fn clone(&self) -> Self {
        Self {
            keypair: Arc::clone(&self.keypair),
        }
    }
}
