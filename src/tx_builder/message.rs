//! Type-state transaction assembler
//!
//! A message moves through three shapes:
//!
//! 1. [`TransactionMessage<Unset, Unset>`] from [`TransactionMessage::new`]
//! 2. fee payer and lifetime set exactly once, in either order
//! 3. [`SealedMessage`] from `attach_signers`, compiled and closed to new
//!    instructions
//!
//! Setting the fee payer or the lifetime twice does not compile, and neither
//! does appending to a sealed message. Signer requirements are derived from
//! the final instruction list only.

use std::collections::HashSet;
use std::fmt;

use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, AddressLookupTableAccount, Message, VersionedMessage},
    pubkey::Pubkey,
    signer::Signer,
};
use tracing::debug;

use crate::compat;
use crate::tx_builder::errors::TxPipelineError;
use crate::types::FreshnessToken;

/// Account keys a message can index
const MAX_ACCOUNT_KEYS: usize = 256;
/// The header counts required signatures in one byte
const MAX_SIGNERS: usize = u8::MAX as usize;

/// Wire format version of the compiled message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageVersion {
    #[default]
    Legacy,
    /// Versioned format; lookup tables may move read-only and writable
    /// non-signer keys out of the static key list
    V0 {
        lookup_tables: Vec<AddressLookupTableAccount>,
    },
}

impl MessageVersion {
    pub fn v0() -> Self {
        Self::V0 {
            lookup_tables: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::V0 { .. } => "v0",
        }
    }
}

/// Borrowed signer. `Sync` so a pipeline future holding it can be spawned.
pub type SignerRef<'a> = &'a (dyn Signer + Sync);

/// Marker for a field that has not been set yet
#[derive(Debug, Clone, Copy, Default)]
pub struct Unset;

/// Fee payer slot once set
#[derive(Clone, Copy)]
pub struct FeePayer<'a>(SignerRef<'a>);

/// Message under assembly.
///
/// `P` is [`Unset`] or [`FeePayer`], `L` is [`Unset`] or [`FreshnessToken`].
pub struct TransactionMessage<P = Unset, L = Unset> {
    version: MessageVersion,
    fee_payer: P,
    lifetime: L,
    instructions: Vec<Instruction>,
}

impl TransactionMessage {
    pub fn new(version: MessageVersion) -> Self {
        Self {
            version,
            fee_payer: Unset,
            lifetime: Unset,
            instructions: Vec::new(),
        }
    }

    pub fn legacy() -> Self {
        Self::new(MessageVersion::Legacy)
    }
}

impl<L> TransactionMessage<Unset, L> {
    /// Set the account that pays fees. It is always the first signer.
    pub fn with_fee_payer(self, payer: SignerRef<'_>) -> TransactionMessage<FeePayer<'_>, L> {
        TransactionMessage {
            version: self.version,
            fee_payer: FeePayer(payer),
            lifetime: self.lifetime,
            instructions: self.instructions,
        }
    }
}

impl<P> TransactionMessage<P, Unset> {
    /// Bind the message to a validity window
    pub fn with_lifetime(self, token: FreshnessToken) -> TransactionMessage<P, FreshnessToken> {
        TransactionMessage {
            version: self.version,
            fee_payer: self.fee_payer,
            lifetime: token,
            instructions: self.instructions,
        }
    }
}

impl<P, L> TransactionMessage<P, L> {
    /// Append one instruction after those already present
    pub fn append_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Append instructions in iteration order
    pub fn append_instructions<I>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        self.instructions.extend(instructions);
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn version(&self) -> &MessageVersion {
        &self.version
    }
}

impl<'a, L> TransactionMessage<FeePayer<'a>, L> {
    /// Fee payer address
    pub fn fee_payer(&self) -> Pubkey {
        self.fee_payer.0.pubkey()
    }

    /// Accounts that must sign: fee payer first, then every signer account
    /// in the order instructions first mention it.
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let payer = self.fee_payer();
        let mut seen = HashSet::from([payer]);
        let mut signers = vec![payer];
        for meta in self.instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && seen.insert(meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }
}

impl<'a> TransactionMessage<FeePayer<'a>, FreshnessToken> {
    pub fn lifetime(&self) -> &FreshnessToken {
        &self.lifetime
    }

    /// Compile into the wire message without sealing
    pub fn compile(&self) -> Result<VersionedMessage, TxPipelineError> {
        compile_message(
            &self.version,
            &self.fee_payer(),
            &self.instructions,
            self.lifetime.blockhash,
        )
    }

    /// Attach the signers beyond the fee payer and seal the message.
    ///
    /// The instruction list is final from here on.
    pub fn attach_signers(
        self,
        signers: &[SignerRef<'a>],
    ) -> Result<SealedMessage<'a>, TxPipelineError> {
        let message = self.compile()?;

        let mut attached = Vec::with_capacity(signers.len() + 1);
        attached.push(self.fee_payer.0);
        attached.extend_from_slice(signers);

        debug!(
            version = self.version.as_str(),
            instructions = self.instructions.len(),
            required_signers = compat::get_num_required_signatures(&message),
            attached_signers = attached.len(),
            "Message sealed"
        );

        Ok(SealedMessage {
            message,
            lifetime: self.lifetime,
            signers: attached,
        })
    }

    /// Seal with the fee payer as the only attached signer
    pub fn seal(self) -> Result<SealedMessage<'a>, TxPipelineError> {
        self.attach_signers(&[])
    }
}

fn compile_message(
    version: &MessageVersion,
    payer: &Pubkey,
    instructions: &[Instruction],
    blockhash: Hash,
) -> Result<VersionedMessage, TxPipelineError> {
    if instructions.is_empty() {
        return Err(TxPipelineError::assembly("message has no instructions"));
    }

    match version {
        MessageVersion::Legacy => {
            let (keys, signers) = count_unique_keys(payer, instructions);
            if keys > MAX_ACCOUNT_KEYS {
                return Err(TxPipelineError::assembly(format!(
                    "{} account keys, legacy messages index at most {}",
                    keys, MAX_ACCOUNT_KEYS
                )));
            }
            if signers > MAX_SIGNERS {
                return Err(TxPipelineError::assembly(format!(
                    "{} signer keys, a message header holds at most {}",
                    signers, MAX_SIGNERS
                )));
            }
            Ok(VersionedMessage::Legacy(Message::new_with_blockhash(
                instructions,
                Some(payer),
                &blockhash,
            )))
        }
        MessageVersion::V0 { lookup_tables } => {
            v0::Message::try_compile(payer, instructions, lookup_tables, blockhash)
                .map(VersionedMessage::V0)
                .map_err(|e| TxPipelineError::assembly(e.to_string()))
        }
    }
}

/// Unique account keys and unique signer keys, fee payer included
fn count_unique_keys(payer: &Pubkey, instructions: &[Instruction]) -> (usize, usize) {
    let mut keys = HashSet::from([*payer]);
    let mut signers = HashSet::from([*payer]);
    for ix in instructions {
        keys.insert(ix.program_id);
        for meta in &ix.accounts {
            keys.insert(meta.pubkey);
            if meta.is_signer {
                signers.insert(meta.pubkey);
            }
        }
    }
    (keys.len(), signers.len())
}

/// Compiled message with its signers attached. Only signing consumes it.
pub struct SealedMessage<'a> {
    message: VersionedMessage,
    lifetime: FreshnessToken,
    signers: Vec<SignerRef<'a>>,
}

impl<'a> SealedMessage<'a> {
    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn lifetime(&self) -> &FreshnessToken {
        &self.lifetime
    }

    /// Signers in attach order, fee payer first
    pub fn signers(&self) -> &[SignerRef<'a>] {
        &self.signers
    }

    /// Keys the compiled message requires signatures from, in wire order
    pub fn required_signers(&self) -> &[Pubkey] {
        compat::get_required_signers(&self.message)
    }

    pub(crate) fn into_parts(self) -> (VersionedMessage, FreshnessToken, Vec<SignerRef<'a>>) {
        (self.message, self.lifetime, self.signers)
    }
}

impl fmt::Debug for SealedMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedMessage")
            .field("required_signers", &self.required_signers())
            .field("attached_signers", &self.signers.len())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
