//! Action handlers.
//!
//! Every operator-initiated state mutation goes through the same skeleton:
//! lookup, structural validation, protocol/status gates, domain validation,
//! next-status computation, mutation, save, projection. Handlers supply the
//! per-action pieces; [`handle`] owns the ordering, and nothing is persisted
//! unless every step before save succeeds.

pub mod notify_onchain_funds_received;
pub mod notify_refund_initiated;
pub mod notify_refund_sent;
pub mod notify_transaction_error;
pub mod notify_transaction_expired;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::transaction::{Sep, SepTransaction, SepTransactionStatus};
use crate::error::RpcError;
use crate::rpc::response::GetTransactionResponse;
use crate::store::TransactionRepository;
use crate::validation::{validate_required, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMethod {
    NotifyOnchainFundsReceived,
    NotifyRefundInitiated,
    NotifyRefundSent,
    NotifyTransactionExpired,
    NotifyTransactionError,
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionMethod::NotifyOnchainFundsReceived => "notify_onchain_funds_received",
            ActionMethod::NotifyRefundInitiated => "notify_refund_initiated",
            ActionMethod::NotifyRefundSent => "notify_refund_sent",
            ActionMethod::NotifyTransactionExpired => "notify_transaction_expired",
            ActionMethod::NotifyTransactionError => "notify_transaction_error",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ActionMethod {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "notify_onchain_funds_received" => Ok(ActionMethod::NotifyOnchainFundsReceived),
            "notify_refund_initiated" => Ok(ActionMethod::NotifyRefundInitiated),
            "notify_refund_sent" => Ok(ActionMethod::NotifyRefundSent),
            "notify_transaction_expired" => Ok(ActionMethod::NotifyTransactionExpired),
            "notify_transaction_error" => Ok(ActionMethod::NotifyTransactionError),
            _ => Err(()),
        }
    }
}

/// An amount/asset pair as carried by action requests.
#[derive(Debug, Clone, Deserialize)]
pub struct AmountAssetRequest {
    pub amount: String,
    pub asset: String,
}

/// Refund payment parameters shared by the refund actions.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub id: String,
    pub amount: String,
    pub amount_fee: String,
}

/// Common surface of every action request payload.
pub trait ActionRequest: DeserializeOwned + Send + Sync {
    fn transaction_id(&self) -> &str;

    /// Structural checks; these run to completion before any domain
    /// validation.
    fn validate_structure(&self) -> ValidationResult {
        validate_required("transaction_id", self.transaction_id())
    }
}

/// Per-action behavior plugged into the shared [`handle`] skeleton.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    type Request: ActionRequest;

    fn action(&self) -> ActionMethod;

    fn supported_protocols(&self) -> &'static [Sep];

    /// Statuses from which this action may fire, given the transaction's
    /// kind, protocol and auxiliary state.
    fn supported_statuses(&self, txn: &SepTransaction) -> Vec<SepTransactionStatus>;

    fn validate(&self, txn: &SepTransaction, request: &Self::Request) -> Result<(), RpcError>;

    /// Pure function of `(txn, request)` computing the post-status.
    fn next_status(
        &self,
        txn: &SepTransaction,
        request: &Self::Request,
    ) -> Result<SepTransactionStatus, RpcError>;

    /// Apply mutations in memory; persistence happens centrally afterwards.
    async fn update_transaction(
        &self,
        txn: &mut SepTransaction,
        request: &Self::Request,
    ) -> Result<(), RpcError>;
}

/// Drive one action invocation end to end. Any error before save leaves the
/// store untouched.
pub async fn handle<H: ActionHandler>(
    handler: &H,
    repository: &TransactionRepository,
    params: Value,
) -> Result<GetTransactionResponse, RpcError> {
    let request: H::Request =
        serde_json::from_value(params).map_err(|err| RpcError::InvalidParams(err.to_string()))?;

    let mut txn = repository
        .lookup(request.transaction_id())
        .await?
        .ok_or_else(|| RpcError::TransactionNotFound(request.transaction_id().to_string()))?;
    let seen_updated_at = txn.updated_at;

    request.validate_structure()?;

    if !handler.supported_protocols().contains(&txn.sep)
        || !handler.supported_statuses(&txn).contains(&txn.status)
    {
        return Err(unsupported(handler.action(), &txn));
    }

    handler.validate(&txn, &request)?;
    let next = handler.next_status(&txn, &request)?;
    handler.update_transaction(&mut txn, &request).await?;
    txn.status = next;

    let saved = repository.save(txn, seen_updated_at).await?;
    tracing::info!(
        id = %saved.id,
        action = %handler.action(),
        status = %saved.status,
        "transaction transitioned"
    );
    Ok(GetTransactionResponse::from(&saved))
}

fn unsupported(action: ActionMethod, txn: &SepTransaction) -> RpcError {
    RpcError::InvalidRequest(format!(
        "Action[{action}] is not supported for status[{status}], kind[{kind}] and protocol[{protocol}]",
        status = txn.status,
        kind = txn.kind,
        protocol = txn.sep,
    ))
}

/// The asset every refund amount is denominated in.
fn amount_in_asset(txn: &SepTransaction) -> Result<&str, RpcError> {
    txn.amount_in_asset.as_deref().ok_or_else(|| {
        RpcError::Internal(format!("transaction[{}] has no amount_in asset", txn.id))
    })
}

fn amount_in(txn: &SepTransaction) -> Result<&str, RpcError> {
    txn.amount_in
        .as_deref()
        .ok_or_else(|| RpcError::Internal(format!("transaction[{}] has no amount_in", txn.id)))
}
