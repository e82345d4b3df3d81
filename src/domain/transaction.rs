//! Transaction domain entity.
//! Framework-agnostic representation of a SEP-24/SEP-31 transfer transaction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::refunds::Refunds;

/// SEP family of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sep {
    #[serde(rename = "24")]
    Sep24,
    #[serde(rename = "31")]
    Sep31,
}

impl fmt::Display for Sep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sep::Sep24 => write!(f, "24"),
            Sep::Sep31 => write!(f, "31"),
        }
    }
}

/// Transfer direction. `deposit`/`withdrawal` belong to SEP-24, `receive` to SEP-31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Deposit,
    Withdrawal,
    Receive,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Deposit => "deposit",
            Kind::Withdrawal => "withdrawal",
            Kind::Receive => "receive",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SepTransactionStatus {
    Incomplete,
    PendingUserTransferStart,
    PendingUserTransferComplete,
    PendingExternal,
    PendingAnchor,
    PendingStellar,
    PendingReceiver,
    PendingCustomerInfoUpdate,
    PendingTrust,
    Completed,
    Refunded,
    Expired,
    Error,
}

impl SepTransactionStatus {
    pub const ALL: [SepTransactionStatus; 13] = [
        SepTransactionStatus::Incomplete,
        SepTransactionStatus::PendingUserTransferStart,
        SepTransactionStatus::PendingUserTransferComplete,
        SepTransactionStatus::PendingExternal,
        SepTransactionStatus::PendingAnchor,
        SepTransactionStatus::PendingStellar,
        SepTransactionStatus::PendingReceiver,
        SepTransactionStatus::PendingCustomerInfoUpdate,
        SepTransactionStatus::PendingTrust,
        SepTransactionStatus::Completed,
        SepTransactionStatus::Refunded,
        SepTransactionStatus::Expired,
        SepTransactionStatus::Error,
    ];

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SepTransactionStatus::Completed
                | SepTransactionStatus::Refunded
                | SepTransactionStatus::Expired
                | SepTransactionStatus::Error
        )
    }
}

impl fmt::Display for SepTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SepTransactionStatus::Incomplete => "incomplete",
            SepTransactionStatus::PendingUserTransferStart => "pending_user_transfer_start",
            SepTransactionStatus::PendingUserTransferComplete => "pending_user_transfer_complete",
            SepTransactionStatus::PendingExternal => "pending_external",
            SepTransactionStatus::PendingAnchor => "pending_anchor",
            SepTransactionStatus::PendingStellar => "pending_stellar",
            SepTransactionStatus::PendingReceiver => "pending_receiver",
            SepTransactionStatus::PendingCustomerInfoUpdate => "pending_customer_info_update",
            SepTransactionStatus::PendingTrust => "pending_trust",
            SepTransactionStatus::Completed => "completed",
            SepTransactionStatus::Refunded => "refunded",
            SepTransactionStatus::Expired => "expired",
            SepTransactionStatus::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Valid (protocol, kind) combinations, projected from a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFlow {
    Sep24Deposit,
    Sep24Withdrawal,
    Sep31Receive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepTransaction {
    pub id: String,
    pub sep: Sep,
    pub kind: Kind,
    pub status: SepTransactionStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub amount_expected: Option<String>,
    pub request_asset_code: Option<String>,
    pub amount_in: Option<String>,
    pub amount_in_asset: Option<String>,
    pub amount_out: Option<String>,
    pub amount_out_asset: Option<String>,
    pub amount_fee: Option<String>,
    pub amount_fee_asset: Option<String>,
    pub stellar_transaction_id: Option<String>,
    pub transfer_received_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub refunds: Option<Refunds>,
}

impl SepTransaction {
    pub fn new(id: impl Into<String>, sep: Sep, kind: Kind, status: SepTransactionStatus) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            sep,
            kind,
            status,
            started_at: now,
            updated_at: now,
            amount_expected: None,
            request_asset_code: None,
            amount_in: None,
            amount_in_asset: None,
            amount_out: None,
            amount_out_asset: None,
            amount_fee: None,
            amount_fee_asset: None,
            stellar_transaction_id: None,
            transfer_received_at: None,
            message: None,
            refunds: None,
        }
    }

    /// The (protocol, kind) combination, or `None` when the pair is invalid
    /// by construction (e.g. a `receive` stored under SEP-24).
    pub fn flow(&self) -> Option<TransferFlow> {
        match (self.sep, self.kind) {
            (Sep::Sep24, Kind::Deposit) => Some(TransferFlow::Sep24Deposit),
            (Sep::Sep24, Kind::Withdrawal) => Some(TransferFlow::Sep24Withdrawal),
            (Sep::Sep31, Kind::Receive) => Some(TransferFlow::Sep31Receive),
            _ => None,
        }
    }
}
