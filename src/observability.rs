//! Observability module for correlation and tracing

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Correlation ID tying together every log line of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new random correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Span wrapping one pipeline run.
///
/// `signature` starts empty and is recorded once the transaction is signed.
pub fn pipeline_span(plan: &str, correlation_id: &CorrelationId) -> Span {
    tracing::info_span!(
        "pipeline",
        plan = %plan,
        correlation_id = %correlation_id,
        signature = tracing::field::Empty,
    )
}
