//! The transaction ran out of time and is being closed out.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ActionHandler, ActionMethod, ActionRequest};
use crate::domain::transaction::{Sep, SepTransaction, SepTransactionStatus};
use crate::error::RpcError;
use crate::validation::sanitize_string;

#[derive(Debug, Deserialize)]
pub struct NotifyTransactionExpiredRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionRequest for NotifyTransactionExpiredRequest {
    fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

/// Pull the mandatory operator explanation out of a terminal-transition
/// request.
pub(super) fn required_message(message: Option<&str>) -> Result<&str, RpcError> {
    match message {
        Some(m) if !m.trim().is_empty() => Ok(m),
        _ => Err(RpcError::InvalidParams("message is required".to_string())),
    }
}

#[derive(Default)]
pub struct NotifyTransactionExpiredHandler;

impl NotifyTransactionExpiredHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for NotifyTransactionExpiredHandler {
    type Request = NotifyTransactionExpiredRequest;

    fn action(&self) -> ActionMethod {
        ActionMethod::NotifyTransactionExpired
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
        Ok(SepTransactionStatus::Expired)
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
