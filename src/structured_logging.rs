//! Structured logging for pipeline runs

use chrono::{DateTime, Utc};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::observability::CorrelationId;

/// Structured logger for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    correlation_id: CorrelationId,
    plan: String,
    started_at: DateTime<Utc>,
}

impl PipelineLogger {
    pub fn new(plan: impl Into<String>) -> Self {
        Self::with_correlation_id(plan, CorrelationId::new())
    }

    pub fn with_correlation_id(plan: impl Into<String>, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            plan: plan.into(),
            started_at: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    /// Milliseconds since the run started
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    pub fn log_started(&self, fee_payer: &Pubkey, instructions: usize) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            plan = %self.plan,
            fee_payer = %fee_payer,
            instructions,
            started_at = %self.started_at.to_rfc3339(),
            "Pipeline started"
        );
    }

    pub fn log_lifetime(&self, blockhash: &str, last_valid_block_height: u64) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            blockhash = %blockhash,
            last_valid_block_height,
            "Lifetime bound"
        );
    }

    pub fn log_signed(&self, signature: &Signature, size: usize) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            signature = %signature,
            size,
            "Transaction signed and validated"
        );
    }

    pub fn log_outcome(&self, outcome: &str, signature: &Signature) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            plan = %self.plan,
            outcome = %outcome,
            signature = %signature,
            latency_ms = self.elapsed_ms(),
            "Pipeline finished"
        );
    }

    pub fn log_failure(&self, category: &str, error: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            plan = %self.plan,
            category = %category,
            error = %error,
            latency_ms = self.elapsed_ms(),
            "Pipeline failed"
        );
    }
}
