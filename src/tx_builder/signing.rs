//! Signing and the wire-size gate
//!
//! [`sign`] turns a [`SealedMessage`] into a [`SignedTransaction`];
//! [`validate_size`] turns that into a [`ValidatedTransaction`], the only type
//! the submission engine accepts.

use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
use tracing::{debug, warn};

use crate::compat;
use crate::tx_builder::errors::TxPipelineError;
use crate::tx_builder::message::{SealedMessage, SignerRef};
use crate::types::FreshnessToken;

/// Largest serialized transaction the network accepts (IPv6 MTU minus headers)
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// Transaction carrying one verified signature per required signer
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    transaction: VersionedTransaction,
    lifetime: FreshnessToken,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    /// Fee payer's signature, which identifies the transaction on the network
    pub fn signature(&self) -> Signature {
        self.transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn lifetime(&self) -> &FreshnessToken {
        &self.lifetime
    }

    /// Size of the wire encoding in bytes
    pub fn serialized_size(&self) -> Result<usize, TxPipelineError> {
        bincode::serialized_size(&self.transaction)
            .map(|size| size as usize)
            .map_err(|e| TxPipelineError::assembly(format!("cannot encode transaction: {}", e)))
    }
}

/// Signed transaction known to fit the wire limit
#[derive(Debug, Clone)]
pub struct ValidatedTransaction {
    signed: SignedTransaction,
    size: usize,
}

impl ValidatedTransaction {
    pub fn transaction(&self) -> &VersionedTransaction {
        self.signed.transaction()
    }

    pub fn signature(&self) -> Signature {
        self.signed.signature()
    }

    pub fn lifetime(&self) -> &FreshnessToken {
        self.signed.lifetime()
    }

    /// Serialized size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Sign a sealed message with every required signer.
///
/// Attached signers the message does not require are ignored.
///
/// # Errors
///
/// - [`TxPipelineError::MissingSigner`] when no attached signer holds a required key
/// - [`TxPipelineError::SignatureSchemeMismatch`] when a signer fails or its
///   signature does not verify against its key
pub fn sign(sealed: SealedMessage<'_>) -> Result<SignedTransaction, TxPipelineError> {
    let (message, lifetime, signers) = sealed.into_parts();

    let mut attached: Vec<(Pubkey, SignerRef<'_>)> = Vec::with_capacity(signers.len());
    for signer in signers {
        let pubkey = signer
            .try_pubkey()
            .map_err(|e| TxPipelineError::scheme_mismatch(Pubkey::default(), e.to_string()))?;
        attached.push((pubkey, signer));
    }

    let message_bytes = message.serialize();
    let required = compat::get_required_signers(&message);
    let mut signatures = Vec::with_capacity(required.len());

    for key in required {
        let signer = attached
            .iter()
            .find(|(pubkey, _)| pubkey == key)
            .map(|(_, signer)| *signer)
            .ok_or(TxPipelineError::MissingSigner { pubkey: *key })?;

        let signature = signer
            .try_sign_message(&message_bytes)
            .map_err(|e| TxPipelineError::scheme_mismatch(*key, e.to_string()))?;

        if !signature.verify(key.as_ref(), &message_bytes) {
            warn!(signer = %key, "Signature does not verify against signer key");
            return Err(TxPipelineError::scheme_mismatch(
                *key,
                "signature does not verify against the signer's public key",
            ));
        }
        signatures.push(signature);
    }

    let ignored = attached
        .iter()
        .filter(|(pubkey, _)| compat::signer_slot(&message, pubkey).is_none())
        .count();
    if ignored > 0 {
        debug!(ignored, "Attached signers not required by the message");
    }

    Ok(SignedTransaction {
        transaction: VersionedTransaction {
            signatures,
            message,
        },
        lifetime,
    })
}

/// Check the signed transaction against [`MAX_TRANSACTION_SIZE`].
///
/// # Errors
///
/// [`TxPipelineError::TransactionTooLarge`] when the wire encoding exceeds the limit.
pub fn validate_size(signed: SignedTransaction) -> Result<ValidatedTransaction, TxPipelineError> {
    let size = signed.serialized_size()?;
    if size > MAX_TRANSACTION_SIZE {
        return Err(TxPipelineError::TransactionTooLarge {
            size,
            max: MAX_TRANSACTION_SIZE,
        });
    }
    debug!(size, signature = %signed.signature(), "Transaction within size limit");
    Ok(ValidatedTransaction { signed, size })
}
