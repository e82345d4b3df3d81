//! Funds arrived on-chain for a SEP-24 deposit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ActionHandler, ActionMethod, ActionRequest, AmountAssetRequest};
use crate::asset::AssetCatalog;
use crate::domain::transaction::{
    Sep, SepTransaction, SepTransactionStatus, TransferFlow,
};
use crate::error::RpcError;
use crate::stellar::HorizonClient;
use crate::validation::amount::validate_amount_asset;
use crate::validation::sanitize_string;

#[derive(Debug, Deserialize)]
pub struct NotifyOnchainFundsReceivedRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stellar_transaction_id: Option<String>,
    #[serde(default)]
    pub amount_in: Option<AmountAssetRequest>,
    #[serde(default)]
    pub amount_out: Option<AmountAssetRequest>,
    #[serde(default)]
    pub amount_fee: Option<AmountAssetRequest>,
}

impl ActionRequest for NotifyOnchainFundsReceivedRequest {
    fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

pub struct NotifyOnchainFundsReceivedHandler {
    assets: Arc<AssetCatalog>,
    horizon: Option<HorizonClient>,
}

impl NotifyOnchainFundsReceivedHandler {
    pub fn new(assets: Arc<AssetCatalog>, horizon: Option<HorizonClient>) -> Self {
        Self { assets, horizon }
    }

    /// The instant the transfer was confirmed: Horizon's record when a
    /// client is configured, the local clock otherwise.
    async fn confirmation_time(&self, hash: &str) -> DateTime<Utc> {
        if let Some(horizon) = &self.horizon {
            match horizon.get_transaction(hash).await {
                Ok(record) => return record.created_at,
                Err(err) => {
                    tracing::warn!(%hash, "horizon lookup failed, using local clock: {err}");
                }
            }
        }
        Utc::now()
    }
}

#[async_trait]
impl ActionHandler for NotifyOnchainFundsReceivedHandler {
    type Request = NotifyOnchainFundsReceivedRequest;

    fn action(&self) -> ActionMethod {
        ActionMethod::NotifyOnchainFundsReceived
    }

    fn supported_protocols(&self) -> &'static [Sep] {
        &[Sep::Sep24]
    }

    fn supported_statuses(&self, txn: &SepTransaction) -> Vec<SepTransactionStatus> {
        match txn.flow() {
            Some(TransferFlow::Sep24Deposit) => {
                let mut statuses = vec![SepTransactionStatus::PendingUserTransferStart];
                if txn.transfer_received_at.is_none() {
                    statuses.push(SepTransactionStatus::PendingExternal);
                }
                statuses
            }
            _ => Vec::new(),
        }
    }

    fn validate(&self, txn: &SepTransaction, request: &Self::Request) -> Result<(), RpcError> {
        if request.stellar_transaction_id.is_none() && txn.stellar_transaction_id.is_none() {
            return Err(RpcError::InvalidParams(
                "stellar_transaction_id is required".to_string(),
            ));
        }

        let all_set = request.amount_in.is_some()
            && request.amount_out.is_some()
            && request.amount_fee.is_some();
        let none_set = request.amount_in.is_none()
            && request.amount_out.is_none()
            && request.amount_fee.is_none();
        if !all_set && !none_set {
            return Err(RpcError::InvalidParams(
                "All or none of the amount_in, amount_out, and amount_fee should be set"
                    .to_string(),
            ));
        }

        if let Some(amount_in) = &request.amount_in {
            validate_amount_asset(
                "amount_in",
                &amount_in.amount,
                &amount_in.asset,
                &self.assets,
                false,
            )?;
        }
        if let Some(amount_out) = &request.amount_out {
            validate_amount_asset(
                "amount_out",
                &amount_out.amount,
                &amount_out.asset,
                &self.assets,
                false,
            )?;
        }
        if let Some(amount_fee) = &request.amount_fee {
            validate_amount_asset(
                "amount_fee",
                &amount_fee.amount,
                &amount_fee.asset,
                &self.assets,
                true,
            )?;
        }

        Ok(())
    }

    fn next_status(
        &self,
        _txn: &SepTransaction,
        _request: &Self::Request,
    ) -> Result<SepTransactionStatus, RpcError> {
        Ok(SepTransactionStatus::PendingAnchor)
    }

    async fn update_transaction(
        &self,
        txn: &mut SepTransaction,
        request: &Self::Request,
    ) -> Result<(), RpcError> {
        if let Some(hash) = &request.stellar_transaction_id {
            txn.stellar_transaction_id = Some(hash.clone());
            txn.transfer_received_at = Some(self.confirmation_time(hash).await);
        }

        if let Some(amount_in) = &request.amount_in {
            txn.amount_in = Some(amount_in.amount.clone());
            txn.amount_in_asset = Some(amount_in.asset.clone());
        }
        if let Some(amount_out) = &request.amount_out {
            txn.amount_out = Some(amount_out.amount.clone());
            txn.amount_out_asset = Some(amount_out.asset.clone());
        }
        if let Some(amount_fee) = &request.amount_fee {
            txn.amount_fee = Some(amount_fee.amount.clone());
            txn.amount_fee_asset = Some(amount_fee.asset.clone());
        }

        if let Some(message) = &request.message {
            txn.message = Some(sanitize_string(message));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testutil::{
        assert_untouched, catalog, deposit_24, repository, seed, withdrawal_24,
    };
    use crate::handlers::handle;
    use serde_json::json;

    fn handler() -> NotifyOnchainFundsReceivedHandler {
        NotifyOnchainFundsReceivedHandler::new(catalog(), None)
    }

    #[tokio::test]
    async fn deposit_receive_fresh() {
        let repo = repository();
        let mut txn = deposit_24("T", SepTransactionStatus::PendingUserTransferStart);
        txn.amount_in_asset = Some("stellar:USDC:GABC".to_string());
        seed(&repo, txn).await;

        let before = Utc::now();
        let response = handle(
            &handler(),
            &repo,
            json!({"transaction_id": "T", "stellar_transaction_id": "abc"}),
        )
        .await
        .unwrap();

        assert_eq!(response.status, SepTransactionStatus::PendingAnchor);
        assert_eq!(response.stellar_transaction_id.as_deref(), Some("abc"));
        let received_at = response.transfer_received_at.unwrap();
        assert!(received_at >= before && received_at <= Utc::now());
        assert!(response.updated_at >= before);
    }

    #[tokio::test]
    async fn amounts_are_assigned_as_triples() {
        let repo = repository();
        seed(
            &repo,
            deposit_24("T", SepTransactionStatus::PendingUserTransferStart),
        )
        .await;

        let response = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "stellar_transaction_id": "abc",
                "amount_in": {"amount": "100", "asset": "stellar:USDC:GABC"},
                "amount_out": {"amount": "95", "asset": "iso4217:USD"},
                "amount_fee": {"amount": "5", "asset": "stellar:USDC:GABC"}
            }),
        )
        .await
        .unwrap();

        let amount_in = response.amount_in.unwrap();
        assert_eq!(amount_in.amount.as_deref(), Some("100"));
        assert_eq!(amount_in.asset.as_deref(), Some("stellar:USDC:GABC"));
        assert_eq!(response.amount_out.unwrap().amount.as_deref(), Some("95"));
        assert_eq!(response.amount_fee.unwrap().amount.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn mixed_amount_triple_is_rejected() {
        let repo = repository();
        let txn = deposit_24("T", SepTransactionStatus::PendingUserTransferStart);
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "stellar_transaction_id": "abc",
                "amount_in": {"amount": "100", "asset": "stellar:USDC:GABC"}
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            RpcError::InvalidParams(
                "All or none of the amount_in, amount_out, and amount_fee should be set"
                    .to_string()
            )
        );
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn stellar_transaction_id_is_required_when_unset() {
        let repo = repository();
        let txn = deposit_24("T", SepTransactionStatus::PendingUserTransferStart);
        seed(&repo, txn.clone()).await;

        let err = handle(&handler(), &repo, json!({"transaction_id": "T"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RpcError::InvalidParams("stellar_transaction_id is required".to_string())
        );
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn known_stellar_transaction_id_allows_omission() {
        let repo = repository();
        let mut txn = deposit_24("T", SepTransactionStatus::PendingUserTransferStart);
        txn.stellar_transaction_id = Some("abc".to_string());
        seed(&repo, txn).await;

        let response = handle(&handler(), &repo, json!({"transaction_id": "T"}))
            .await
            .unwrap();
        assert_eq!(response.status, SepTransactionStatus::PendingAnchor);
        // the handler did not touch the confirmation time
        assert!(response.transfer_received_at.is_none());
    }

    #[tokio::test]
    async fn pending_external_supported_only_before_first_receive() {
        let repo = repository();
        let mut txn = deposit_24("T", SepTransactionStatus::PendingExternal);
        txn.transfer_received_at = Some(Utc::now());
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({"transaction_id": "T", "stellar_transaction_id": "abc"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest(_)));
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn withdrawal_is_gated() {
        let repo = repository();
        let txn = withdrawal_24("T", SepTransactionStatus::PendingUserTransferStart);
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({"transaction_id": "T", "stellar_transaction_id": "abc"}),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            RpcError::InvalidRequest(
                "Action[notify_onchain_funds_received] is not supported for \
                 status[pending_user_transfer_start], kind[withdrawal] and protocol[24]"
                    .to_string()
            )
        );
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn missing_transaction_is_not_found() {
        let repo = repository();
        let err = handle(
            &handler(),
            &repo,
            json!({"transaction_id": "nope", "stellar_transaction_id": "abc"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err, RpcError::TransactionNotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn confirmation_time_comes_from_horizon_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex(r".*/transactions/.*".into()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"abc","hash":"abc","successful":true,"ledger":7,
                    "created_at":"2023-06-01T12:00:00Z"}"#,
            )
            .create_async()
            .await;

        let repo = repository();
        seed(
            &repo,
            deposit_24("T", SepTransactionStatus::PendingUserTransferStart),
        )
        .await;

        let handler = NotifyOnchainFundsReceivedHandler::new(
            catalog(),
            Some(HorizonClient::new(server.url())),
        );
        let response = handle(
            &handler,
            &repo,
            json!({"transaction_id": "T", "stellar_transaction_id": "abc"}),
        )
        .await
        .unwrap();

        assert_eq!(
            response.transfer_received_at.unwrap(),
            "2023-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
