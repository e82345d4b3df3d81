//! A refund payment has been sent back to the user.
//!
//! The post-status depends on how much of `amount_in` has been returned:
//! a total match is terminal (`refunded`), a partial refund parks the
//! transaction back at `pending_anchor`, and an overshoot is rejected.

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use serde::Deserialize;

use super::{
    amount_in, amount_in_asset, ActionHandler, ActionMethod, ActionRequest, RefundRequest,
};
use crate::asset::{asset_code, AssetCatalog};
use crate::domain::refunds::{decimal, RefundPayment, Refunds};
use crate::domain::transaction::{Sep, SepTransaction, SepTransactionStatus, TransferFlow};
use crate::error::RpcError;
use crate::validation::amount::validate_amount_asset;
use crate::validation::{sanitize_string, validate_required};

#[derive(Debug, Deserialize)]
pub struct NotifyRefundSentRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub refund: Option<RefundRequest>,
}

impl ActionRequest for NotifyRefundSentRequest {
    fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

pub struct NotifyRefundSentHandler {
    assets: Arc<AssetCatalog>,
}

impl NotifyRefundSentHandler {
    pub fn new(assets: Arc<AssetCatalog>) -> Self {
        Self { assets }
    }

    fn decimals(&self, txn: &SepTransaction) -> Result<i64, RpcError> {
        let asset = amount_in_asset(txn)?;
        let info = self
            .assets
            .get(asset_code(asset))
            .ok_or_else(|| RpcError::BadRequest("refund.amount.asset is not supported".into()))?;
        Ok(info.significant_decimals)
    }

    fn total_refunded_sep24(
        txn: &SepTransaction,
        refund: Option<&RefundRequest>,
    ) -> Result<BigDecimal, RpcError> {
        let Some(refunds) = &txn.refunds else {
            let refund = required(refund)?;
            return Ok(decimal(&refund.amount)? + decimal(&refund.amount_fee)?);
        };

        if txn.status == SepTransactionStatus::PendingAnchor {
            let refund = required(refund)?;
            return Ok(decimal(&refunds.amount_refunded)?
                + decimal(&refund.amount)?
                + decimal(&refund.amount_fee)?);
        }

        // The refund has already been sent; a payload, if present, replaces
        // the payment it was initiated as.
        match refund {
            None => decimal(&refunds.amount_refunded),
            Some(refund) => {
                if !refunds.payments.iter().any(|p| p.id == refund.id) {
                    return Err(RpcError::InvalidParams("Invalid refund id".to_string()));
                }
                let mut total = BigDecimal::from(0);
                for payment in &refunds.payments {
                    if payment.id == refund.id {
                        total += decimal(&refund.amount)? + decimal(&refund.amount_fee)?;
                    } else {
                        total += decimal(&payment.amount)? + decimal(&payment.fee)?;
                    }
                }
                Ok(total)
            }
        }
    }

    fn total_refunded_sep31(
        txn: &SepTransaction,
        refund: Option<&RefundRequest>,
    ) -> Result<BigDecimal, RpcError> {
        if txn.status == SepTransactionStatus::PendingReceiver {
            let refund = required(refund)?;
            return Ok(decimal(&refund.amount)? + decimal(&refund.amount_fee)?);
        }

        // pending_stellar: the custody payment recorded exactly one payment
        let refunds = txn
            .refunds
            .as_ref()
            .ok_or_else(custody_payment_missing)?;
        match refund {
            None => decimal(&refunds.amount_refunded),
            Some(refund) => {
                let payment = refunds.payments.first().ok_or_else(custody_payment_missing)?;
                if payment.id != refund.id {
                    return Err(RpcError::InvalidParams("Invalid refund id".to_string()));
                }
                Ok(decimal(&refund.amount)? + decimal(&refund.amount_fee)?)
            }
        }
    }
}

fn required(refund: Option<&RefundRequest>) -> Result<&RefundRequest, RpcError> {
    refund.ok_or_else(|| RpcError::InvalidParams("refund is required".to_string()))
}

fn custody_payment_missing() -> RpcError {
    RpcError::InvalidRequest("Custody payment hasn't been completed yet".to_string())
}

#[async_trait]
impl ActionHandler for NotifyRefundSentHandler {
    type Request = NotifyRefundSentRequest;

    fn action(&self) -> ActionMethod {
        ActionMethod::NotifyRefundSent
    }

    fn supported_protocols(&self) -> &'static [Sep] {
        &[Sep::Sep24, Sep::Sep31]
    }

    fn supported_statuses(&self, txn: &SepTransaction) -> Vec<SepTransactionStatus> {
        match txn.flow() {
            Some(TransferFlow::Sep24Deposit) if txn.transfer_received_at.is_some() => {
                vec![
                    SepTransactionStatus::PendingExternal,
                    SepTransactionStatus::PendingAnchor,
                ]
            }
            Some(TransferFlow::Sep24Deposit) => Vec::new(),
            Some(TransferFlow::Sep24Withdrawal) => {
                let mut statuses = vec![SepTransactionStatus::PendingStellar];
                if txn.transfer_received_at.is_some() {
                    statuses.push(SepTransactionStatus::PendingAnchor);
                }
                statuses
            }
            Some(TransferFlow::Sep31Receive) => vec![
                SepTransactionStatus::PendingStellar,
                SepTransactionStatus::PendingReceiver,
            ],
            None => Vec::new(),
        }
    }

    fn validate(&self, txn: &SepTransaction, request: &Self::Request) -> Result<(), RpcError> {
        let payments_empty = txn
            .refunds
            .as_ref()
            .map_or(true, |refunds| refunds.payments.is_empty());

        match txn.sep {
            Sep::Sep24 => {
                if request.refund.is_none() && txn.status == SepTransactionStatus::PendingAnchor {
                    return Err(RpcError::InvalidParams("refund is required".to_string()));
                }
            }
            Sep::Sep31 => {
                if request.refund.is_none() && txn.status == SepTransactionStatus::PendingReceiver
                {
                    return Err(RpcError::InvalidParams("refund is required".to_string()));
                }
                if txn.status == SepTransactionStatus::PendingReceiver && !payments_empty {
                    return Err(RpcError::InvalidRequest(format!(
                        "Multiple refunds aren't supported for kind[{}], protocol[{}] and action[{}]",
                        txn.kind,
                        txn.sep,
                        self.action(),
                    )));
                }
                if txn.status == SepTransactionStatus::PendingStellar && payments_empty {
                    return Err(custody_payment_missing());
                }
            }
        }

        if let Some(refund) = &request.refund {
            validate_required("refund.id", &refund.id)?;
            let asset = amount_in_asset(txn)?;
            validate_amount_asset("refund.amount", &refund.amount, asset, &self.assets, false)?;
            validate_amount_asset(
                "refund.amount_fee",
                &refund.amount_fee,
                asset,
                &self.assets,
                true,
            )?;
        }

        Ok(())
    }

    fn next_status(
        &self,
        txn: &SepTransaction,
        request: &Self::Request,
    ) -> Result<SepTransactionStatus, RpcError> {
        let refund = request.refund.as_ref();
        let total = match txn.sep {
            Sep::Sep24 => Self::total_refunded_sep24(txn, refund)?,
            Sep::Sep31 => Self::total_refunded_sep31(txn, refund)?,
        };

        let decimals = self.decimals(txn)?;
        let total = total.with_scale_round(decimals, RoundingMode::HalfEven);
        let amount_in = decimal(amount_in(txn)?)?;

        if total == amount_in {
            Ok(SepTransactionStatus::Refunded)
        } else if total < amount_in {
            Ok(SepTransactionStatus::PendingAnchor)
        } else {
            Err(RpcError::InvalidParams(
                "Refund amount exceeds amount_in".to_string(),
            ))
        }
    }

    async fn update_transaction(
        &self,
        txn: &mut SepTransaction,
        request: &Self::Request,
    ) -> Result<(), RpcError> {
        if let Some(refund) = &request.refund {
            let decimals = self.decimals(txn)?;
            let mut refunds: Refunds = txn
                .refunds
                .take()
                .unwrap_or_default()
                .with_payment(RefundPayment {
                    id: refund.id.clone(),
                    amount: refund.amount.clone(),
                    fee: refund.amount_fee.clone(),
                });
            refunds.recalculate(decimals)?;
            txn.refunds = Some(refunds);
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
    use crate::handlers::handle;
    use crate::handlers::testutil::{
        assert_untouched, catalog, deposit_24, receive_31, repository, seed, withdrawal_24,
    };
    use chrono::Utc;
    use serde_json::json;

    fn handler() -> NotifyRefundSentHandler {
        NotifyRefundSentHandler::new(catalog())
    }

    fn with_amount_in(mut txn: SepTransaction, amount_in: &str) -> SepTransaction {
        txn.amount_in = Some(amount_in.to_string());
        txn.amount_in_asset = Some("stellar:USDC:GABC".to_string());
        txn
    }

    fn with_refund_payment(mut txn: SepTransaction, id: &str, amount: &str, fee: &str) -> SepTransaction {
        let mut refunds = Refunds::default().with_payment(RefundPayment {
            id: id.to_string(),
            amount: amount.to_string(),
            fee: fee.to_string(),
        });
        refunds.recalculate(7).unwrap();
        txn.refunds = Some(refunds);
        txn
    }

    #[tokio::test]
    async fn sep31_full_refund_completes() {
        let repo = repository();
        let txn = with_refund_payment(
            with_amount_in(
                receive_31("T", SepTransactionStatus::PendingStellar),
                "10",
            ),
            "r",
            "9",
            "1",
        );
        seed(&repo, txn).await;

        let response = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r", "amount": "9", "amount_fee": "1"}
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.status, SepTransactionStatus::Refunded);
        let refunds = response.refunds.unwrap();
        assert_eq!(refunds.amount_refunded, "10");
        assert_eq!(refunds.amount_fee, "1");
    }

    #[tokio::test]
    async fn sep31_pending_stellar_rejects_foreign_refund_id() {
        let repo = repository();
        let txn = with_refund_payment(
            with_amount_in(
                receive_31("T", SepTransactionStatus::PendingStellar),
                "10",
            ),
            "r",
            "9",
            "1",
        );
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "other", "amount": "9", "amount_fee": "1"}
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, RpcError::InvalidParams("Invalid refund id".to_string()));
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn sep31_pending_stellar_requires_custody_payment() {
        let repo = repository();
        let txn = with_amount_in(receive_31("T", SepTransactionStatus::PendingStellar), "10");
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r", "amount": "9", "amount_fee": "1"}
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            RpcError::InvalidRequest("Custody payment hasn't been completed yet".to_string())
        );
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn sep31_pending_receiver_forbids_second_refund() {
        let repo = repository();
        let txn = with_refund_payment(
            with_amount_in(
                receive_31("T", SepTransactionStatus::PendingReceiver),
                "10",
            ),
            "r",
            "3",
            "0",
        );
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r2", "amount": "4", "amount_fee": "0"}
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            RpcError::InvalidRequest(
                "Multiple refunds aren't supported for kind[receive], protocol[31] \
                 and action[notify_refund_sent]"
                    .to_string()
            )
        );
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn sep31_partial_refund_returns_to_pending_anchor() {
        let repo = repository();
        let txn = with_amount_in(receive_31("T", SepTransactionStatus::PendingReceiver), "10");
        seed(&repo, txn).await;

        let response = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r", "amount": "3", "amount_fee": "1"}
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status, SepTransactionStatus::PendingAnchor);
    }

    #[tokio::test]
    async fn sep24_first_refund_without_initiation_completes() {
        let repo = repository();
        let mut txn = with_amount_in(
            withdrawal_24("T", SepTransactionStatus::PendingStellar),
            "5",
        );
        txn.transfer_received_at = None;
        seed(&repo, txn).await;

        let response = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "w1", "amount": "5", "amount_fee": "0"}
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status, SepTransactionStatus::Refunded);
    }

    #[tokio::test]
    async fn sep24_pending_external_without_payload_uses_recorded_total() {
        let repo = repository();
        let mut txn = with_refund_payment(
            with_amount_in(deposit_24("T", SepTransactionStatus::PendingExternal), "10"),
            "r1",
            "4",
            "0",
        );
        txn.transfer_received_at = Some(Utc::now());
        seed(&repo, txn).await;

        let response = handle(&handler(), &repo, json!({"transaction_id": "T"}))
            .await
            .unwrap();
        // 4 of 10 refunded so far
        assert_eq!(response.status, SepTransactionStatus::PendingAnchor);
    }

    #[tokio::test]
    async fn sep24_pending_external_replaces_initiated_payment() {
        let repo = repository();
        let mut txn = with_refund_payment(
            with_amount_in(deposit_24("T", SepTransactionStatus::PendingExternal), "10"),
            "r1",
            "4",
            "0",
        );
        txn.transfer_received_at = Some(Utc::now());
        seed(&repo, txn).await;

        // the amount actually sent differs from the initiated amount
        let response = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r1", "amount": "9", "amount_fee": "1"}
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status, SepTransactionStatus::Refunded);
        let refunds = response.refunds.unwrap();
        assert_eq!(refunds.payments.len(), 1);
        assert_eq!(refunds.amount_refunded, "10");
    }

    #[tokio::test]
    async fn sep24_pending_external_rejects_unknown_refund_id() {
        let repo = repository();
        let mut txn = with_refund_payment(
            with_amount_in(deposit_24("T", SepTransactionStatus::PendingExternal), "10"),
            "r1",
            "4",
            "0",
        );
        txn.transfer_received_at = Some(Utc::now());
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r9", "amount": "4", "amount_fee": "0"}
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, RpcError::InvalidParams("Invalid refund id".to_string()));
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn sep24_pending_anchor_requires_refund_payload() {
        let repo = repository();
        let mut txn = with_refund_payment(
            with_amount_in(deposit_24("T", SepTransactionStatus::PendingAnchor), "10"),
            "r1",
            "4",
            "0",
        );
        txn.transfer_received_at = Some(Utc::now());
        seed(&repo, txn.clone()).await;

        let err = handle(&handler(), &repo, json!({"transaction_id": "T"}))
            .await
            .unwrap_err();
        assert_eq!(err, RpcError::InvalidParams("refund is required".to_string()));
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn sep24_pending_anchor_accumulates_prior_refunds() {
        let repo = repository();
        let mut txn = with_refund_payment(
            with_amount_in(deposit_24("T", SepTransactionStatus::PendingAnchor), "10"),
            "r1",
            "4",
            "0",
        );
        txn.transfer_received_at = Some(Utc::now());
        seed(&repo, txn.clone()).await;

        // 4 already refunded + 6 now = 10 -> refunded
        let response = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r2", "amount": "6", "amount_fee": "0"}
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status, SepTransactionStatus::Refunded);
        assert_eq!(response.refunds.unwrap().payments.len(), 2);

        // an overshoot instead is rejected
        let repo = repository();
        seed(&repo, txn.clone()).await;
        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r2", "amount": "7", "amount_fee": "0"}
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            RpcError::InvalidParams("Refund amount exceeds amount_in".to_string())
        );
        assert_untouched(&repo, &txn).await;
    }

    #[tokio::test]
    async fn sep24_deposit_without_received_transfer_is_gated() {
        let repo = repository();
        let txn = with_amount_in(deposit_24("T", SepTransactionStatus::PendingAnchor), "10");
        seed(&repo, txn.clone()).await;

        let err = handle(
            &handler(),
            &repo,
            json!({
                "transaction_id": "T",
                "refund": {"id": "r", "amount": "10", "amount_fee": "0"}
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest(_)));
        assert_untouched(&repo, &txn).await;
    }
}
