//! End-to-end pipeline runs against the in-memory ledger
//!
//! Covers the enrollment flow over program-derived addresses, the token
//! transfer plan and many pipelines sharing one transport.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
    use tx_pipeline::programs::enrollment::{EnrollmentProgram, ENROLLMENT_SEED};
    use tx_pipeline::programs::token;
    use tx_pipeline::rpc_manager::{LedgerTransport, LoopbackLedger};
    use tx_pipeline::tx_builder::{derive, keygen, MessageVersion};
    use tx_pipeline::{Commitment, Pipeline, SubmissionResult, SubmitOptions, TransactionPlan};

    fn enrollment_program() -> EnrollmentProgram {
        EnrollmentProgram {
            program_id: Pubkey::new_unique(),
            collection: Pubkey::new_unique(),
            mpl_core_program: Pubkey::new_unique(),
        }
    }

    fn pipeline(ledger: &Arc<LoopbackLedger>) -> Pipeline {
        Pipeline::new(ledger.clone(), SubmitOptions::default())
    }

    #[tokio::test]
    async fn test_enroll_initialize_confirms() {
        let ledger = Arc::new(LoopbackLedger::new());
        let pipeline = pipeline(&ledger);
        let program = enrollment_program();
        let user = keygen::generate().unwrap().to_signer().unwrap();

        let account = program.enrollment_account(&user.pubkey()).unwrap();
        let (expected, bump) = Pubkey::find_program_address(
            &[ENROLLMENT_SEED, user.pubkey().as_ref()],
            &program.program_id,
        );
        assert_eq!(account.address, expected);
        assert_eq!(account.bump, bump);
        assert!(!derive::is_on_curve(&account.address.to_bytes()));

        let plan = TransactionPlan::new("enroll-initialize", &user)
            .with_version(MessageVersion::v0())
            .with_instruction(program.initialize("octocat", &user.pubkey()).unwrap());
        let outcome = pipeline.run(&plan).await.unwrap();

        let signature = match outcome {
            SubmissionResult::Confirmed(signature) => signature,
            other => panic!("Expected Confirmed, got {:?}", other),
        };
        assert_eq!(signature.as_ref().len(), 64);

        let status = ledger.signature_status(&signature).await.unwrap().unwrap();
        assert!(status.commitment.satisfies(Commitment::Confirmed));
        assert!(status.err.is_none());
        assert_eq!(ledger.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_enroll_submit_needs_mint_signature() {
        let ledger = Arc::new(LoopbackLedger::new());
        let pipeline = pipeline(&ledger);
        let program = enrollment_program();
        let user = Keypair::new();
        let mint = Keypair::new();
        let instruction = program.submit_ts(&user.pubkey(), &mint.pubkey()).unwrap();

        let unsigned = TransactionPlan::new("enroll-submit", &user)
            .with_version(MessageVersion::v0())
            .with_instruction(instruction.clone());
        let err = pipeline.run(&unsigned).await.unwrap_err();
        assert!(err.is_structural());
        assert_eq!(ledger.broadcast_count(), 0);

        let signed = TransactionPlan::new("enroll-submit", &user)
            .with_version(MessageVersion::v0())
            .with_instruction(instruction)
            .with_signer(&mint);
        let outcome = pipeline.run(&signed).await.unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(ledger.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_token_transfer_plan_confirms() {
        let ledger = Arc::new(LoopbackLedger::new());
        let pipeline = pipeline(&ledger);
        let owner = Keypair::new();
        let instructions =
            token::transfer_plan(&owner.pubkey(), &Pubkey::new_unique(), &Pubkey::new_unique(), 5_000_000)
                .unwrap();

        let plan = TransactionPlan::new("transfer", &owner).with_instructions(instructions);
        let prepared = plan
            .prepare(pipeline.engine().fetch_lifetime(Commitment::Confirmed).await.unwrap())
            .unwrap();
        assert_eq!(prepared.transaction().signatures.len(), 1);

        assert!(pipeline.run(&plan).await.unwrap().is_confirmed());
    }

    #[tokio::test]
    async fn test_concurrent_pipelines_share_transport() {
        let ledger = Arc::new(LoopbackLedger::new());
        let pipeline = pipeline(&ledger);
        let program = Pubkey::new_unique();

        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    let payer = Keypair::new();
                    let plan = TransactionPlan::new(format!("noop-{}", i), &payer).with_instruction(
                        solana_sdk::instruction::Instruction::new_with_bytes(program, &[i], vec![]),
                    );
                    pipeline.run(&plan).await
                })
            })
            .collect();

        let mut signatures = HashSet::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SubmissionResult::Confirmed(signature) => signatures.insert(signature),
                other => panic!("Expected Confirmed, got {:?}", other),
            };
        }
        assert_eq!(signatures.len(), 8);
        assert_eq!(ledger.active_subscriptions(), 0);
    }
}
