//! The transaction failed for an unrecoverable reason.

use async_trait::async_trait;
use serde::Deserialize;

use super::notify_transaction_expired::required_message;
use super::{ActionHandler, ActionMethod, ActionRequest};
use crate::domain::transaction::{Sep, SepTransaction, SepTransactionStatus};
use crate::error::RpcError;
use crate::validation::sanitize_string;

#[derive(Debug, Deserialize)]
pub struct NotifyTransactionErrorRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionRequest for NotifyTransactionErrorRequest {
    fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

#[derive(Default)]
pub struct NotifyTransactionErrorHandler;

impl NotifyTransactionErrorHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for NotifyTransactionErrorHandler {
    type Request = NotifyTransactionErrorRequest;

    fn action(&self) -> ActionMethod {
        ActionMethod::NotifyTransactionError
    }

    fn supported_protocols(&self) -> &'static [Sep] {
        &[Sep::Sep24, Sep::Sep31]
    }

    fn supported_statuses(&self, _txn: &SepTransaction) -> Vec<SepTransactionStatus> {
        SepTransactionStatus::ALL
            .into_iter()
            .filter(|status| !status.is_terminal())
            .collect()
    }

    fn validate(&self, _txn: &SepTransaction, request: &Self::Request) -> Result<(), RpcError> {
        required_message(request.message.as_deref()).map(|_| ())
    }

    fn next_status(
        &self,
        _txn: &SepTransaction,
        _request: &Self::Request,
    ) -> Result<SepTransactionStatus, RpcError> {
        Ok(SepTransactionStatus::Error)
    }

    async fn update_transaction(
        &self,
        txn: &mut SepTransaction,
        request: &Self::Request,
    ) -> Result<(), RpcError> {
        let message = required_message(request.message.as_deref())?;
        txn.message = Some(sanitize_string(message));
        Ok(())
    }
}
