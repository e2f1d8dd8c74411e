//! Enrollment program: `initialize` and `submit_ts`

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use solana_system_interface::program as system_program;

use super::{anchor_discriminator, borsh_string};
use crate::tx_builder::{derive, DerivedAddress, TxPipelineError};

/// Seed prefix of a user's enrollment account
pub const ENROLLMENT_SEED: &[u8] = b"prereqs";
/// Seed prefix of the collection authority
pub const COLLECTION_SEED: &[u8] = b"collection";

/// Accounts of a `submit_ts` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTsAccounts {
    pub user: Pubkey,
    pub account: Pubkey,
    pub mint: Pubkey,
    pub collection: Pubkey,
    pub authority: Pubkey,
}

/// Register `github` for `user`, creating the enrollment account
pub fn initialize(program_id: &Pubkey, github: &str, user: &Pubkey, account: &Pubkey) -> Instruction {
    let mut data = anchor_discriminator("initialize").to_vec();
    borsh_string(github, &mut data);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Submit the completion proof, minting `mint` into `collection`.
///
/// `mint` is a fresh keypair and must sign alongside the user.
pub fn submit_ts(
    program_id: &Pubkey,
    mpl_core_program: &Pubkey,
    accounts: &SubmitTsAccounts,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(accounts.user, true),
            AccountMeta::new(accounts.account, false),
            AccountMeta::new(accounts.mint, true),
            AccountMeta::new(accounts.collection, false),
            AccountMeta::new_readonly(accounts.authority, false),
            AccountMeta::new_readonly(*mpl_core_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: anchor_discriminator("submit_ts").to_vec(),
    }
}

/// Program ids and derived accounts of one enrollment deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentProgram {
    pub program_id: Pubkey,
    pub collection: Pubkey,
    pub mpl_core_program: Pubkey,
}

impl EnrollmentProgram {
    /// `["prereqs", user]`
    pub fn enrollment_account(&self, user: &Pubkey) -> Result<DerivedAddress, TxPipelineError> {
        derive::derive(&self.program_id, &[ENROLLMENT_SEED, user.as_ref()])
    }

    /// `["collection", collection]`
    pub fn collection_authority(&self) -> Result<DerivedAddress, TxPipelineError> {
        derive::derive(&self.program_id, &[COLLECTION_SEED, self.collection.as_ref()])
    }

    pub fn initialize(&self, github: &str, user: &Pubkey) -> Result<Instruction, TxPipelineError> {
        let account = self.enrollment_account(user)?;
        Ok(initialize(&self.program_id, github, user, &account.address))
    }

    pub fn submit_ts(&self, user: &Pubkey, mint: &Pubkey) -> Result<Instruction, TxPipelineError> {
        let accounts = SubmitTsAccounts {
            user: *user,
            account: self.enrollment_account(user)?.address,
            mint: *mint,
            collection: self.collection,
            authority: self.collection_authority()?.address,
        };
        Ok(submit_ts(&self.program_id, &self.mpl_core_program, &accounts))
    }
}
