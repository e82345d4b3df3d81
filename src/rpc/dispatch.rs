//! Method registry and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{RpcRequest, RpcResponse, JSONRPC_VERSION};
use crate::asset::AssetCatalog;
use crate::error::RpcError;
use crate::handlers::notify_onchain_funds_received::NotifyOnchainFundsReceivedHandler;
use crate::handlers::notify_refund_initiated::NotifyRefundInitiatedHandler;
use crate::handlers::notify_refund_sent::NotifyRefundSentHandler;
use crate::handlers::notify_transaction_error::NotifyTransactionErrorHandler;
use crate::handlers::notify_transaction_expired::NotifyTransactionExpiredHandler;
use crate::handlers::{handle, ActionHandler, ActionMethod};
use crate::rpc::response::GetTransactionResponse;
use crate::stellar::HorizonClient;
use crate::store::TransactionRepository;

/// Object-safe view of an [`ActionHandler`], so the registry can hold
/// handlers with different request types.
#[async_trait]
trait DynActionHandler: Send + Sync {
    fn action(&self) -> ActionMethod;

    async fn handle(
        &self,
        repository: &TransactionRepository,
        params: Value,
    ) -> Result<GetTransactionResponse, RpcError>;
}

#[async_trait]
impl<H: ActionHandler> DynActionHandler for H {
    fn action(&self) -> ActionMethod {
        ActionHandler::action(self)
    }

    async fn handle(
        &self,
        repository: &TransactionRepository,
        params: Value,
    ) -> Result<GetTransactionResponse, RpcError> {
        handle(self, repository, params).await
    }
}

pub struct Dispatcher {
    repository: TransactionRepository,
    handlers: HashMap<ActionMethod, Box<dyn DynActionHandler>>,
}

impl Dispatcher {
    pub fn new(
        repository: TransactionRepository,
        assets: Arc<AssetCatalog>,
        horizon: Option<HorizonClient>,
    ) -> Self {
        let handlers: Vec<Box<dyn DynActionHandler>> = vec![
            Box::new(NotifyOnchainFundsReceivedHandler::new(
                assets.clone(),
                horizon,
            )),
            Box::new(NotifyRefundInitiatedHandler::new(assets.clone())),
            Box::new(NotifyRefundSentHandler::new(assets)),
            Box::new(NotifyTransactionExpiredHandler::new()),
            Box::new(NotifyTransactionErrorHandler::new()),
        ];

        Self {
            repository,
            handlers: handlers
                .into_iter()
                .map(|handler| (handler.action(), handler))
                .collect(),
        }
    }

    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        match self.dispatch_inner(request).await {
            Ok(result) => RpcResponse::result(id, result),
            Err(err) => {
                tracing::warn!(code = err.code(), "rpc call failed: {err}");
                RpcResponse::error(id, &err)
            }
        }
    }

    async fn dispatch_inner(
        &self,
        request: RpcRequest,
    ) -> Result<GetTransactionResponse, RpcError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(RpcError::InvalidRequest(format!(
                "unsupported JSON-RPC version [{}]",
                request.jsonrpc
            )));
        }

        let handler = request
            .method
            .parse::<ActionMethod>()
            .ok()
            .and_then(|method| self.handlers.get(&method))
            .ok_or_else(|| {
                RpcError::MethodNotFound(format!("method [{}] is not found", request.method))
            })?;

        handler.handle(&self.repository, request.params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::SepTransactionStatus;
    use crate::error::codes;
    use crate::handlers::testutil::{deposit_24, repository, seed};
    use serde_json::json;

    fn dispatcher(repository: &TransactionRepository) -> Dispatcher {
        Dispatcher::new(
            repository.clone(),
            Arc::new(AssetCatalog::builtin()),
            None,
        )
    }

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn dispatches_to_the_named_action() {
        let repo = repository();
        seed(
            &repo,
            deposit_24("T", SepTransactionStatus::PendingUserTransferStart),
        )
        .await;

        let response = dispatcher(&repo)
            .dispatch(request(
                "notify_onchain_funds_received",
                json!({"transaction_id": "T", "stellar_transaction_id": "abc"}),
            ))
            .await;

        assert!(response.error.is_none());
        assert_eq!(
            response.result.unwrap().status,
            SepTransactionStatus::PendingAnchor
        );
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let repo = repository();
        let response = dispatcher(&repo)
            .dispatch(request("notify_nothing", json!({})))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_version_is_an_invalid_request() {
        let repo = repository();
        let mut req = request("notify_transaction_expired", json!({}));
        req.jsonrpc = "1.0".to_string();
        let response = dispatcher(&repo).dispatch(req).await;

        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn id_is_echoed_back() {
        let repo = repository();
        let mut req = request("notify_nothing", json!({}));
        req.id = json!("request-77");
        let response = dispatcher(&repo).dispatch(req).await;
        assert_eq!(response.id, json!("request-77"));
    }
}
