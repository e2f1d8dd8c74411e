use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::pubsub_client::PubsubClientError;
use solana_rpc_client_api::request::{RpcError, RpcResponseErrorData};
use thiserror::Error;

/// Transport-level error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Preflight simulation refused the transaction; it was not forwarded
    #[error("{reason}")]
    Preflight { reason: String },

    /// The node refused the transaction for a reason other than preflight
    #[error("{reason}")]
    Rejected { reason: String },

    /// The endpoint could not be reached or answered with garbage
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Unavailable { endpoint: String, message: String },

    /// The notification channel failed or closed unexpectedly
    #[error("Subscription error: {message}")]
    Subscription { message: String },
}

impl TransportError {
    /// The node has already seen this exact transaction.
    ///
    /// Resubmitting a signed transaction is not an error in itself; the
    /// caller should look at the signature's status instead.
    pub fn is_already_processed(&self) -> bool {
        match self {
            TransportError::Preflight { reason } | TransportError::Rejected { reason } => {
                reason.to_lowercase().contains("already been processed")
            }
            _ => false,
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            TransportError::Unavailable { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Classify a JSON-RPC client error.
    ///
    /// Server answers keep the server's message verbatim; anything that never
    /// reached the server is `Unavailable`.
    pub fn from_client_error(err: &ClientError, endpoint: &str) -> Self {
        match err.kind() {
            ClientErrorKind::RpcError(RpcError::RpcResponseError { message, data, .. }) => {
                match data {
                    RpcResponseErrorData::SendTransactionPreflightFailure(_) => {
                        TransportError::Preflight {
                            reason: message.clone(),
                        }
                    }
                    _ => TransportError::Rejected {
                        reason: message.clone(),
                    },
                }
            }
            ClientErrorKind::TransactionError(tx_err) => TransportError::Rejected {
                reason: tx_err.to_string(),
            },
            _ => TransportError::Unavailable {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn from_pubsub_error(err: &PubsubClientError) -> Self {
        TransportError::Subscription {
            message: err.to_string(),
        }
    }
}
