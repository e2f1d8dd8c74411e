//! JSON-RPC + PubSub transport over `solana-client`

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use solana_client::{
    nonblocking::{pubsub_client::PubsubClient, rpc_client::RpcClient},
    rpc_config::{RpcSendTransactionConfig, RpcSignatureSubscribeConfig},
};
use solana_rpc_client_api::response::RpcSignatureResult;
use solana_sdk::{
    commitment_config::CommitmentConfig, signature::Signature, transaction::VersionedTransaction,
};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::{debug, instrument, warn};

use super::{
    BroadcastConfig, ConfirmationEvent, ConfirmationSubscription, LedgerTransport,
    TransportError, TransportResult,
};
use crate::types::{Commitment, FreshnessToken, SignatureStatus};

/// Buffered notifications per subscription
const SUBSCRIPTION_BUFFER: usize = 8;

/// Transport backed by one RPC endpoint and its websocket
pub struct RpcTransport {
    rpc_url: String,
    ws_url: String,
    client: RpcClient,
    pubsub: OnceCell<Arc<PubsubClient>>,
}

impl RpcTransport {
    /// The websocket connection is opened on the first subscription
    pub fn new(rpc_url: impl Into<String>, ws_url: impl Into<String>, commitment: Commitment) -> Self {
        let rpc_url = rpc_url.into();
        Self {
            client: RpcClient::new_with_commitment(rpc_url.clone(), commitment.into()),
            rpc_url,
            ws_url: ws_url.into(),
            pubsub: OnceCell::new(),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn classify(&self, err: solana_client::client_error::ClientError) -> TransportError {
        TransportError::from_client_error(&err, &self.rpc_url)
    }

    async fn pubsub(&self) -> TransportResult<Arc<PubsubClient>> {
        let client = self
            .pubsub
            .get_or_try_init(|| async {
                debug!(url = %self.ws_url, "Opening websocket");
                PubsubClient::new(&self.ws_url)
                    .await
                    .map(Arc::new)
                    .map_err(|e| TransportError::Unavailable {
                        endpoint: self.ws_url.clone(),
                        message: e.to_string(),
                    })
            })
            .await?;
        Ok(client.clone())
    }
}

fn status_from_rpc(status: TransactionStatus) -> SignatureStatus {
    let commitment = match status.confirmation_status {
        Some(TransactionConfirmationStatus::Processed) => Commitment::Processed,
        Some(TransactionConfirmationStatus::Confirmed) => Commitment::Confirmed,
        Some(TransactionConfirmationStatus::Finalized) => Commitment::Finalized,
        // Nodes that predate confirmation_status report rooted slots without a count
        None if status.confirmations.is_none() => Commitment::Finalized,
        None => Commitment::Processed,
    };
    SignatureStatus {
        commitment,
        slot: status.slot,
        err: status.err.map(|e| format!("{:?}", e)),
    }
}

#[async_trait]
impl LedgerTransport for RpcTransport {
    fn endpoint(&self) -> &str {
        &self.rpc_url
    }

    #[instrument(skip(self), fields(url = %self.rpc_url))]
    async fn latest_blockhash(&self, commitment: Commitment) -> TransportResult<FreshnessToken> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(commitment.into())
            .await
            .map_err(|e| self.classify(e))?;
        debug!(%blockhash, last_valid_block_height, "Fetched blockhash");
        Ok(FreshnessToken::new(blockhash, last_valid_block_height))
    }

    #[instrument(skip(self, transaction), fields(url = %self.rpc_url))]
    async fn broadcast(
        &self,
        transaction: &VersionedTransaction,
        config: BroadcastConfig,
    ) -> TransportResult<Signature> {
        let send_config = RpcSendTransactionConfig {
            skip_preflight: config.skip_preflight,
            preflight_commitment: Some(config.preflight_commitment.into()),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, send_config)
            .await
            .map_err(|e| self.classify(e))
    }

    #[instrument(skip(self), fields(url = %self.ws_url))]
    async fn subscribe_signature(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> TransportResult<ConfirmationSubscription> {
        let pubsub = self.pubsub().await?;
        let (event_tx, event_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel::<TransportResult<()>>();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let signature = *signature;

        tokio::spawn(async move {
            let config = RpcSignatureSubscribeConfig {
                commitment: Some(CommitmentConfig::from(commitment)),
                enable_received_notification: Some(false),
            };
            let (mut stream, unsubscribe) =
                match pubsub.signature_subscribe(&signature, Some(config)).await {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        let _ = ready_tx.send(Err(TransportError::from_pubsub_error(&e)));
                        return;
                    }
                };
            if ready_tx.send(Ok(())).is_err() {
                drop(stream);
                unsubscribe().await;
                return;
            }

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => break,
                    update = stream.next() => {
                        let Some(update) = update else { break };
                        let err = match update.value {
                            RpcSignatureResult::ProcessedSignature(result) => {
                                result.err.map(|e| format!("{:?}", e))
                            }
                            // Receipt notifications are disabled in the config
                            RpcSignatureResult::ReceivedSignature(_) => continue,
                        };
                        let event = ConfirmationEvent {
                            commitment,
                            slot: update.context.slot,
                            err,
                        };
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }

            drop(stream);
            unsubscribe().await;
            debug!(%signature, "Signature subscription released");
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(TransportError::Subscription {
                    message: "subscription task exited before it was ready".to_string(),
                })
            }
        }

        Ok(ConfirmationSubscription::new(signature, event_rx, move || {
            let _ = cancel_tx.send(());
        }))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> TransportResult<Option<SignatureStatus>> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| self.classify(e))?;
        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(status_from_rpc))
    }

    async fn block_height(&self, commitment: Commitment) -> TransportResult<u64> {
        self.client
            .get_block_height_with_commitment(commitment.into())
            .await
            .map_err(|e| {
                let err = self.classify(e);
                warn!(error = %err, "Block height query failed");
                err
            })
    }
}
