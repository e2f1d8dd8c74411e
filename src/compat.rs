//! Version-agnostic accessors for compiled messages
//!
//! Legacy and v0 messages store the header and static keys in different
//! structs. The signer and the size gate only need the common view, so they
//! go through these helpers instead of matching on the version themselves.
//!
//! ```rust,no_run
//! use solana_sdk::transaction::VersionedTransaction;
//! use tx_pipeline::compat;
//!
//! fn first_signer(tx: &VersionedTransaction) -> Option<&solana_sdk::pubkey::Pubkey> {
//!     compat::get_required_signers(&tx.message).first()
//! }
//! ```

use solana_sdk::{
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
};

/// Message header for either version
#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Keys embedded in the message.
///
/// For v0 messages this excludes addresses loaded from lookup tables; signers
/// are never loaded from a table.
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Keys that must sign, in signature-slot order.
///
/// These are the first `num_required_signatures` static keys. The fee payer
/// is always slot 0.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let num_signers = get_num_required_signatures(message) as usize;
    let account_keys = get_static_account_keys(message);
    &account_keys[..num_signers.min(account_keys.len())]
}

#[inline]
#[must_use]
pub fn get_num_required_signatures(message: &VersionedMessage) -> u8 {
    get_message_header(message).num_required_signatures
}

/// Signature slot a key occupies, if it is a required signer
#[inline]
#[must_use]
pub fn signer_slot(message: &VersionedMessage, pubkey: &Pubkey) -> Option<usize> {
    get_required_signers(message)
        .iter()
        .position(|key| key == pubkey)
}
