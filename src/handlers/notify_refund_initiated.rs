//! A refund of a SEP-24 deposit has been initiated off-chain.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    amount_in, amount_in_asset, ActionHandler, ActionMethod, ActionRequest, RefundRequest,
};
use crate::asset::{asset_code, AssetCatalog};
use crate::domain::refunds::{decimal, RefundPayment};
use crate::domain::transaction::{Sep, SepTransaction, SepTransactionStatus, TransferFlow};
use crate::error::RpcError;
use crate::validation::amount::validate_amount_asset;
use crate::validation::{sanitize_string, validate_required};

#[derive(Debug, Deserialize)]
pub struct NotifyRefundInitiatedRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub refund: Option<RefundRequest>,
}

impl ActionRequest for NotifyRefundInitiatedRequest {
    fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

pub struct NotifyRefundInitiatedHandler {
    assets: Arc<AssetCatalog>,
}

impl NotifyRefundInitiatedHandler {
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
}

#[async_trait]
impl ActionHandler for NotifyRefundInitiatedHandler {
    type Request = NotifyRefundInitiatedRequest;

    fn action(&self) -> ActionMethod {
        ActionMethod::NotifyRefundInitiated
    }

    fn supported_protocols(&self) -> &'static [Sep] {
        &[Sep::Sep24]
    }

    fn supported_statuses(&self, txn: &SepTransaction) -> Vec<SepTransactionStatus> {
        match txn.flow() {
            Some(TransferFlow::Sep24Deposit) if txn.transfer_received_at.is_some() => {
                vec![SepTransactionStatus::PendingAnchor]
            }
            _ => Vec::new(),
        }
    }

    fn validate(&self, txn: &SepTransaction, request: &Self::Request) -> Result<(), RpcError> {
        let refund = request
            .refund
            .as_ref()
            .ok_or_else(|| RpcError::InvalidParams("refund is required".to_string()))?;
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

        // Project the aggregate as if this payment were applied; a re-initiation
        // with an existing id replaces the previous payment rather than stacking.
        let projected = txn
            .refunds
            .clone()
            .unwrap_or_default()
            .with_payment(RefundPayment {
                id: refund.id.clone(),
                amount: refund.amount.clone(),
                fee: refund.amount_fee.clone(),
            })
            .total_refunded(self.decimals(txn)?)?;

        if projected > decimal(amount_in(txn)?)? {
            return Err(RpcError::InvalidParams(
                "Refund amount exceeds amount_in".to_string(),
            ));
        }

        Ok(())
    }

    fn next_status(
        &self,
        _txn: &SepTransaction,
        _request: &Self::Request,
    ) -> Result<SepTransactionStatus, RpcError> {
        Ok(SepTransactionStatus::PendingExternal)
    }

    async fn update_transaction(
        &self,
        txn: &mut SepTransaction,
        request: &Self::Request,
    ) -> Result<(), RpcError> {
        let Some(refund) = &request.refund else {
            return Ok(());
        };

        let decimals = self.decimals(txn)?;
        let mut refunds = txn
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

        if let Some(message) = &request.message {
            txn.message = Some(sanitize_string(message));
        }

        Ok(())
    }
}
