//! SPL token transfer between associated token accounts

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::id as token_program_id;

use crate::tx_builder::TxPipelineError;

/// Instructions moving `amount` base units of `mint` from `owner` to `recipient`.
///
/// Both associated token accounts are created if missing, paid by `owner`.
/// The idempotent create makes the plan safe to resubmit.
pub fn transfer_plan(
    owner: &Pubkey,
    mint: &Pubkey,
    recipient: &Pubkey,
    amount: u64,
) -> Result<Vec<Instruction>, TxPipelineError> {
    let token_program = token_program_id();
    let source = get_associated_token_address(owner, mint);
    let destination = get_associated_token_address(recipient, mint);

    let transfer = spl_token::instruction::transfer(
        &token_program,
        &source,
        &destination,
        owner,
        &[],
        amount,
    )
    .map_err(|e| TxPipelineError::assembly(format!("spl-token transfer: {}", e)))?;

    Ok(vec![
        create_associated_token_account_idempotent(owner, owner, mint, &token_program),
        create_associated_token_account_idempotent(owner, recipient, mint, &token_program),
        transfer,
    ])
}
