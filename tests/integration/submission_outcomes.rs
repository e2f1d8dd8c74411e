//! Submission engine outcomes: confirmed, rejected at each stage, timed out,
//! stale blockhash, idempotent resubmission and cancellation

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Keypair};
    use tx_pipeline::rpc_manager::{LoopbackLedger, BLOCKHASH_VALIDITY_BLOCKS};
    use tx_pipeline::submit_engine::{Rejection, RejectionStage};
    use tx_pipeline::tx_builder::ValidatedTransaction;
    use tx_pipeline::{
        Commitment, Pipeline, SubmissionEngine, SubmissionResult, SubmitOptions, TransactionPlan,
        TxPipelineError,
    };

    fn noop_plan<'a>(payer: &'a Keypair, program: Pubkey) -> TransactionPlan<'a> {
        TransactionPlan::new("noop", payer)
            .with_instruction(Instruction::new_with_bytes(program, &[0], vec![]))
    }

    async fn prepared(engine: &SubmissionEngine, payer: &Keypair, program: Pubkey) -> ValidatedTransaction {
        let lifetime = engine.fetch_lifetime(Commitment::Confirmed).await.unwrap();
        noop_plan(payer, program).prepare(lifetime).unwrap()
    }

    fn quick_options() -> SubmitOptions {
        SubmitOptions {
            confirmation_timeout: Duration::from_secs(5),
            block_height_poll_interval: Duration::from_millis(200),
            ..SubmitOptions::default()
        }
    }

    #[tokio::test]
    async fn test_confirmed_outcome() {
        let ledger = Arc::new(LoopbackLedger::new());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;

        let outcome = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();
        assert_eq!(outcome, SubmissionResult::Confirmed(tx.signature()));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_mentioning_blockhash() {
        let ledger = Arc::new(LoopbackLedger::new());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        ledger.advance_blocks(BLOCKHASH_VALIDITY_BLOCKS + 1);

        let outcome = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();
        match outcome {
            SubmissionResult::Rejected(Rejection { stage, reason }) => {
                assert_eq!(stage, RejectionStage::Preflight);
                assert!(reason.contains("Blockhash"), "reason: {}", reason);
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }

        let err = engine
            .submit(&tx, &SubmitOptions::default())
            .await
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(matches!(err, TxPipelineError::PreflightRejected(ref r) if r.contains("Blockhash")));
        assert_eq!(ledger.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_resubmission_returns_same_signature() {
        let ledger = Arc::new(LoopbackLedger::new());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;

        let first = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();
        let second = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();

        assert_eq!(first, SubmissionResult::Confirmed(tx.signature()));
        assert_eq!(second, first);
        assert_eq!(ledger.broadcast_count(), 2);
    }

    #[tokio::test]
    async fn test_resubmission_while_pending_confirms_once_landed() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        let signature = tx.signature();

        let first = {
            let engine = engine.clone();
            let tx = tx.clone();
            tokio::spawn(async move { engine.submit(&tx, &quick_options()).await })
        };
        let second = {
            let engine = engine.clone();
            let tx = tx.clone();
            tokio::spawn(async move { engine.submit(&tx, &quick_options()).await })
        };

        while ledger.active_subscriptions() < 2 || ledger.broadcast_count() < 2 {
            tokio::task::yield_now().await;
        }
        assert!(ledger.advance(&signature, Commitment::Confirmed));

        assert_eq!(first.await.unwrap().unwrap(), SubmissionResult::Confirmed(signature));
        assert_eq!(second.await.unwrap().unwrap(), SubmissionResult::Confirmed(signature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timed_out() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;

        let outcome = engine.submit(&tx, &quick_options()).await.unwrap();
        assert_eq!(outcome, SubmissionResult::TimedOut(tx.signature()));
        assert_eq!(ledger.active_subscriptions(), 0);

        // Still undecided, not failed: it can land later
        assert!(ledger.advance(&tx.signature(), Commitment::Finalized));
        let status = engine
            .query_status(&tx.signature(), Commitment::Confirmed)
            .await
            .unwrap();
        assert_eq!(status, Some(SubmissionResult::Confirmed(tx.signature())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_below_requested_level_keeps_waiting() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        let signature = tx.signature();

        let options = SubmitOptions {
            commitment: Commitment::Finalized,
            ..quick_options()
        };
        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&tx, &options).await })
        };

        while ledger.broadcast_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(ledger.advance(&signature, Commitment::Confirmed));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!handle.is_finished());

        assert!(ledger.advance(&signature, Commitment::Finalized));
        assert_eq!(handle.await.unwrap().unwrap(), SubmissionResult::Confirmed(signature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_token_after_skipped_preflight() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        ledger.advance_blocks(BLOCKHASH_VALIDITY_BLOCKS + 1);

        let options = SubmitOptions {
            skip_preflight: true,
            ..quick_options()
        };
        let err = engine.submit(&tx, &options).await.unwrap_err();

        assert!(err.requires_new_lifetime());
        match err {
            TxPipelineError::StaleFreshnessToken {
                signature,
                last_valid_block_height,
            } => {
                assert_eq!(signature, tx.signature());
                assert_eq!(last_valid_block_height, tx.lifetime().last_valid_block_height);
            }
            other => panic!("Expected StaleFreshnessToken, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_landed_below_level_is_not_stale_after_expiry() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        let signature = tx.signature();

        let options = SubmitOptions {
            commitment: Commitment::Finalized,
            ..quick_options()
        };
        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&tx, &options).await })
        };
        while ledger.broadcast_count() == 0 {
            tokio::task::yield_now().await;
        }

        // Landed inside the window, then the window closed
        assert!(ledger.advance(&signature, Commitment::Confirmed));
        ledger.advance_blocks(BLOCKHASH_VALIDITY_BLOCKS + 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle.is_finished());

        assert!(ledger.advance(&signature, Commitment::Finalized));
        assert_eq!(handle.await.unwrap().unwrap(), SubmissionResult::Confirmed(signature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_landed_below_level_times_out_after_expiry() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        let signature = tx.signature();

        let options = SubmitOptions {
            commitment: Commitment::Finalized,
            ..quick_options()
        };
        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&tx, &options).await })
        };
        while ledger.broadcast_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(ledger.advance(&signature, Commitment::Confirmed));
        ledger.advance_blocks(BLOCKHASH_VALIDITY_BLOCKS + 1);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, SubmissionResult::TimedOut(signature));
        let err = outcome.into_result().unwrap_err();
        assert!(err.is_uncertain());
        assert!(!err.requires_new_lifetime());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_outage_after_broadcast_keeps_waiting() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        let signature = tx.signature();

        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&tx, &quick_options()).await })
        };
        while ledger.broadcast_count() == 0 {
            tokio::task::yield_now().await;
        }

        ledger.set_unreachable(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle.is_finished());

        ledger.set_unreachable(false);
        assert!(ledger.advance(&signature, Commitment::Confirmed));
        assert_eq!(handle.await.unwrap().unwrap(), SubmissionResult::Confirmed(signature));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_outage_until_deadline_is_uncertain() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;
        let signature = tx.signature();

        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&tx, &quick_options()).await })
        };
        while ledger.broadcast_count() == 0 {
            tokio::task::yield_now().await;
        }
        ledger.set_unreachable(true);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, SubmissionResult::TimedOut(signature));
        assert!(outcome.into_result().unwrap_err().is_uncertain());
        assert_eq!(ledger.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_resubmitting_landed_transaction_after_expiry_confirms() {
        let ledger = Arc::new(LoopbackLedger::new());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;

        let first = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();
        assert_eq!(first, SubmissionResult::Confirmed(tx.signature()));
        ledger.advance_blocks(BLOCKHASH_VALIDITY_BLOCKS + 1);

        // The node refuses the expired blockhash before it looks at its status cache
        let second = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();
        assert_eq!(second, SubmissionResult::Confirmed(tx.signature()));
        assert_eq!(ledger.broadcast_count(), 2);
        assert_eq!(ledger.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_stale_token_recovers_with_new_run() {
        let ledger = Arc::new(LoopbackLedger::new());
        let pipeline = Pipeline::new(ledger.clone(), SubmitOptions::default());
        let payer = Keypair::new();
        let plan = noop_plan(&payer, Pubkey::new_unique());

        let stale = plan
            .prepare(pipeline.engine().fetch_lifetime(Commitment::Confirmed).await.unwrap())
            .unwrap();
        ledger.advance_blocks(BLOCKHASH_VALIDITY_BLOCKS + 1);
        assert!(!pipeline
            .engine()
            .submit(&stale, pipeline.options())
            .await
            .unwrap()
            .is_confirmed());

        // A new run fetches a fresh blockhash and signs again
        let outcome = pipeline.run(&plan).await.unwrap();
        assert!(outcome.is_confirmed());
        assert_ne!(outcome, SubmissionResult::Confirmed(stale.signature()));
    }

    #[tokio::test]
    async fn test_execution_failure_is_rejected() {
        let ledger = Arc::new(LoopbackLedger::new());
        let engine = SubmissionEngine::new(ledger.clone());
        let program = Pubkey::new_unique();
        ledger.fail_program(program);

        let tx = prepared(&engine, &Keypair::new(), program).await;
        let outcome = engine.submit(&tx, &SubmitOptions::default()).await.unwrap();
        assert!(matches!(
            outcome,
            SubmissionResult::Rejected(Rejection { stage: RejectionStage::Preflight, ref reason })
                if reason.contains("Custom(1)")
        ));

        let tx = prepared(&engine, &Keypair::new(), program).await;
        let options = SubmitOptions {
            skip_preflight: true,
            ..SubmitOptions::default()
        };
        let err = engine.submit(&tx, &options).await.unwrap().into_result().unwrap_err();
        assert!(matches!(err, TxPipelineError::ExecutionFailed(ref r) if r.contains("Custom(1)")));
    }

    #[tokio::test]
    async fn test_unreachable_transport() {
        let ledger = Arc::new(LoopbackLedger::new());
        let pipeline = Pipeline::new(ledger.clone(), SubmitOptions::default());
        let payer = Keypair::new();
        ledger.set_unreachable(true);

        let err = pipeline
            .run(&noop_plan(&payer, Pubkey::new_unique()))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "transport");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(ledger.broadcast_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_releases_subscription() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;

        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&tx, &SubmitOptions::default()).await })
        };
        while ledger.broadcast_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(ledger.active_subscriptions(), 1);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(ledger.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_dropped_future_releases_subscription() {
        let ledger = Arc::new(LoopbackLedger::manual());
        let engine = SubmissionEngine::new(ledger.clone());
        let tx = prepared(&engine, &Keypair::new(), Pubkey::new_unique()).await;

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            engine.submit(&tx, &SubmitOptions::default()),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(ledger.active_subscriptions(), 0);
    }
}
