//! One transaction cycle: fetch lifetime, assemble, sign, validate, submit
//!
//! Every transaction kind runs through [`Pipeline::run`]. What differs between
//! them is only the [`TransactionPlan`]: its instructions and its signers.

use std::sync::Arc;

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use tracing::Instrument;

use crate::observability::pipeline_span;
use crate::rpc_manager::LedgerTransport;
use crate::structured_logging::PipelineLogger;
use crate::submit_engine::{SubmissionEngine, SubmissionResult, SubmitOptions};
use crate::tx_builder::{
    sign, validate_size, MessageVersion, SignerRef, TransactionMessage, TxPipelineError,
    ValidatedTransaction,
};
use crate::types::FreshnessToken;

/// Instructions plus the signers they need
pub struct TransactionPlan<'a> {
    name: String,
    version: MessageVersion,
    fee_payer: SignerRef<'a>,
    instructions: Vec<Instruction>,
    signers: Vec<SignerRef<'a>>,
}

impl<'a> TransactionPlan<'a> {
    pub fn new(name: impl Into<String>, fee_payer: SignerRef<'a>) -> Self {
        Self {
            name: name.into(),
            version: MessageVersion::Legacy,
            fee_payer,
            instructions: Vec::new(),
            signers: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: MessageVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn with_instructions<I>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        self.instructions.extend(instructions);
        self
    }

    /// Signer beyond the fee payer
    pub fn with_signer(mut self, signer: SignerRef<'a>) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.fee_payer.pubkey()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Assemble, sign and size-check against `lifetime`. No network access.
    pub fn prepare(&self, lifetime: FreshnessToken) -> Result<ValidatedTransaction, TxPipelineError> {
        let sealed = TransactionMessage::new(self.version.clone())
            .with_fee_payer(self.fee_payer)
            .with_lifetime(lifetime)
            .append_instructions(self.instructions.iter().cloned())
            .attach_signers(&self.signers)?;
        validate_size(sign(sealed)?)
    }
}

/// Runs plans over one shared transport
#[derive(Clone)]
pub struct Pipeline {
    engine: SubmissionEngine,
    options: SubmitOptions,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn LedgerTransport>, options: SubmitOptions) -> Self {
        Self {
            engine: SubmissionEngine::new(transport),
            options,
        }
    }

    pub fn engine(&self) -> &SubmissionEngine {
        &self.engine
    }

    pub fn options(&self) -> &SubmitOptions {
        &self.options
    }

    /// Run one full cycle for `plan`.
    ///
    /// A stale blockhash is returned as an error; calling `run` again fetches
    /// a new one and re-signs.
    pub async fn run(&self, plan: &TransactionPlan<'_>) -> Result<SubmissionResult, TxPipelineError> {
        let logger = PipelineLogger::new(plan.name());
        let span = pipeline_span(plan.name(), logger.correlation_id());

        async {
            logger.log_started(&plan.fee_payer(), plan.instructions().len());

            match self.run_inner(plan, &logger).await {
                Ok((signature, outcome)) => {
                    logger.log_outcome(outcome.label(), &signature);
                    Ok(outcome)
                }
                Err(e) => {
                    logger.log_failure(e.category(), &e.to_string());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        plan: &TransactionPlan<'_>,
        logger: &PipelineLogger,
    ) -> Result<(Signature, SubmissionResult), TxPipelineError> {
        let lifetime = self.engine.fetch_lifetime(self.options.commitment).await?;
        logger.log_lifetime(&lifetime.blockhash.to_string(), lifetime.last_valid_block_height);

        let transaction = plan.prepare(lifetime)?;
        tracing::Span::current().record("signature", tracing::field::display(transaction.signature()));
        logger.log_signed(&transaction.signature(), transaction.size());

        let outcome = self.engine.submit(&transaction, &self.options).await?;
        Ok((transaction.signature(), outcome))
    }
}
