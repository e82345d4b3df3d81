//! Public projection of a transaction.
//!
//! The JSON shape is stable: null scalars are omitted, except that
//! `amount_expected` keeps its asset hint even while the amount is unknown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::refunds::Refunds;
use crate::domain::transaction::{Kind, Sep, SepTransaction, SepTransactionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTransactionResponse {
    pub id: String,
    pub sep: Sep,
    pub kind: Kind,
    pub status: SepTransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_expected: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_in: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_fee: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stellar_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunds: Option<Refunds>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_received_at: Option<DateTime<Utc>>,
}

impl From<&SepTransaction> for GetTransactionResponse {
    fn from(txn: &SepTransaction) -> Self {
        let amount_expected =
            if txn.amount_expected.is_some() || txn.request_asset_code.is_some() {
                Some(Amount {
                    amount: txn.amount_expected.clone(),
                    asset: txn.request_asset_code.clone(),
                })
            } else {
                None
            };

        Self {
            id: txn.id.clone(),
            sep: txn.sep,
            kind: txn.kind,
            status: txn.status,
            amount_expected,
            amount_in: pair(&txn.amount_in, &txn.amount_in_asset),
            amount_out: pair(&txn.amount_out, &txn.amount_out_asset),
            amount_fee: pair(&txn.amount_fee, &txn.amount_fee_asset),
            stellar_transaction_id: txn.stellar_transaction_id.clone(),
            message: txn.message.clone(),
            refunds: txn.refunds.clone(),
            started_at: txn.started_at,
            updated_at: txn.updated_at,
            transfer_received_at: txn.transfer_received_at,
        }
    }
}

fn pair(amount: &Option<String>, asset: &Option<String>) -> Option<Amount> {
    amount.as_ref().map(|value| Amount {
        amount: Some(value.clone()),
        asset: asset.clone(),
    })
}
