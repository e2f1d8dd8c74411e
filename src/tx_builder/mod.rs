//! Transaction building core
//!
//! Everything between "I have an intent" and "I have bytes the network will
//! accept", with no network access:
//!
//! - **keygen**: Ed25519 key material in the packed 64-byte layout
//! - **derive**: program-derived addresses with bump search
//! - **message**: type-state assembler (fee payer, lifetime, ordered instructions)
//! - **signing**: signature collection and the 1232-byte wire gate
//! - **errors**: the pipeline-wide error taxonomy
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use solana_sdk::{hash::Hash, instruction::Instruction, pubkey::Pubkey};
//! use tx_pipeline::tx_builder::{derive, keygen, sign, validate_size, TransactionMessage};
//! use tx_pipeline::types::FreshnessToken;
//!
//! # fn example() -> Result<(), tx_pipeline::tx_builder::TxPipelineError> {
//! let program_id = Pubkey::new_unique();
//! let user = keygen::generate()?.to_signer()?;
//! let user_key = solana_sdk::signer::Signer::pubkey(&user);
//! let pda = derive::derive(&program_id, &[b"prereqs", user_key.as_ref()])?;
//!
//! let token = FreshnessToken::new(Hash::default(), 1_000);
//! let sealed = TransactionMessage::legacy()
//!     .with_fee_payer(&user)
//!     .with_lifetime(token)
//!     .append_instruction(Instruction::new_with_bytes(program_id, &[0], vec![]))
//!     .seal()?;
//! let ready = validate_size(sign(sealed)?)?;
//! # let _ = (pda, ready);
//! # Ok(())
//! # }
//! ```

pub mod derive;
pub mod errors;
pub mod keygen;
pub mod message;
pub mod signing;

pub use derive::DerivedAddress;
pub use errors::TxPipelineError;
pub use keygen::KeyMaterial;
pub use message::{MessageVersion, SealedMessage, SignerRef, TransactionMessage};
pub use signing::{
    sign, validate_size, SignedTransaction, ValidatedTransaction, MAX_TRANSACTION_SIZE,
};

pub type Result<T> = std::result::Result<T, TxPipelineError>;
