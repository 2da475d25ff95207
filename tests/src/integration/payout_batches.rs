//! Isolated payout semantics: KYC gating at creation, batch atomicity and
//! the shared batch transaction id.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use lucid_payouts::{
        AccountResources, PayoutContext, PayoutError, PayoutRouter, PayoutStatus, RouterType,
        Trc20Transfer, TronRpc, TronTxState,
    };
    use lucid_store::{Filter, FindOptions};

    use crate::helpers::memory_store;

    const RECIPIENT_A: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const RECIPIENT_B: &str = "TG3XXyExBkPp9nzdajDZsozEu4BkaSJozs";
    const RECIPIENT_C: &str = "TXLAQ63Xg1NAzckPwKHvzw7CSEmLMEqcdj";

    struct SingleTxTron {
        submitted: Mutex<Vec<Vec<Trc20Transfer>>>,
    }

    #[async_trait]
    impl TronRpc for SingleTxTron {
        async fn send_batch_transfer(
            &self,
            _router: RouterType,
            transfers: &[Trc20Transfer],
            _fee_limit_sun: u64,
        ) -> Result<String, PayoutError> {
            self.submitted.lock().unwrap().push(transfers.to_vec());
            Ok("tron-batch-tx-1".into())
        }

        async fn transaction_state(&self, _txid: &str) -> Result<TronTxState, PayoutError> {
            Ok(TronTxState::Confirmed)
        }

        async fn account_resources(&self) -> Result<AccountResources, PayoutError> {
            Ok(AccountResources {
                energy_available: 1_000_000,
                bandwidth_available: 10_000,
            })
        }
    }

    #[tokio::test]
    async fn kyc_reject_is_immediate_and_batch_is_atomic() {
        let store = memory_store();
        let tron = Arc::new(SingleTxTron {
            submitted: Mutex::new(Vec::new()),
        });
        let router = PayoutRouter::new(Arc::clone(&tron), Arc::clone(&store));
        router.initialize().await.unwrap();

        let first = router
            .create_payout(RECIPIENT_A, 10.0, RouterType::NonKyc, "session_reward", None, None, PayoutContext::default())
            .await
            .unwrap();
        let second = router
            .create_payout(RECIPIENT_B, 20.0, RouterType::NonKyc, "session_reward", None, None, PayoutContext::default())
            .await
            .unwrap();

        // The KYC request without a compliance signature never becomes part
        // of any batch: it fails at creation time.
        let err = router
            .create_payout(
                RECIPIENT_C,
                50.0,
                RouterType::KycGated,
                "node_reward",
                Some("kyc-digest".into()),
                Some(String::new()),
                PayoutContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::KycRejected { .. }));

        let processed = router.process_pending_payouts().await.unwrap();
        assert_eq!(processed, 2);

        // One grouped submission for the two survivors.
        let submitted = tron.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 2);
        assert_eq!(submitted[0][0].amount_micro, 10_000_000);
        drop(submitted);

        // PENDING → PROCESSING → COMPLETED collapsed into the terminal
        // state, with the batch txid inherited by both members.
        for id in [&first, &second] {
            let payout = router.get_payout(id).await.unwrap();
            assert_eq!(payout.status, PayoutStatus::Completed);
            assert_eq!(payout.txid.as_deref(), Some("tron-batch-tx-1"));
            assert!(payout.processed_at.is_some());
        }

        let batches = store
            .find("payout_batches", Filter::All, FindOptions::default())
            .await
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["status"], "completed");
        assert_eq!(batches[0]["txid"], "tron-batch-tx-1");
        assert_eq!(batches[0]["payout_ids"].as_array().unwrap().len(), 2);

        assert_eq!(
            router.check_payout_status(&first).await.unwrap(),
            TronTxState::Confirmed
        );
    }

    #[tokio::test]
    async fn address_schemes_never_mix() {
        let store = memory_store();
        let tron = Arc::new(SingleTxTron {
            submitted: Mutex::new(Vec::new()),
        });
        let router = PayoutRouter::new(tron, Arc::clone(&store));
        router.initialize().await.unwrap();

        router
            .create_payout(RECIPIENT_A, 10.0, RouterType::NonKyc, "r", None, None, PayoutContext::default())
            .await
            .unwrap();

        // Every stored payout recipient is TRON-shaped; the chain-core
        // collections stay untouched by the payout path.
        let payouts = store
            .find("payouts", Filter::All, FindOptions::default())
            .await
            .unwrap();
        assert!(payouts.iter().all(|p| {
            p["recipient_address"].as_str().unwrap().starts_with('T')
        }));
        assert_eq!(
            store
                .count("transactions", Filter::All)
                .await
                .unwrap(),
            0
        );
    }
}
