use thiserror::Error;

use crate::store::StoreError;
use crate::validation::ValidationError;

/// JSON-RPC error codes used by the dispatcher.
/// These codes are stable and should never be renamed or reused.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const TRANSACTION_NOT_FOUND: i32 = -32001;
    pub const BAD_REQUEST: i32 = -32002;
    pub const CONFLICT: i32 = -32003;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("{0}")]
    Internal(String),

    #[error("transaction[{0}] is not found")]
    TransactionNotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),
}

impl RpcError {
    /// Get the stable JSON-RPC code for this error.
    pub fn code(&self) -> i32 {
        match self {
            RpcError::Parse(_) => codes::PARSE_ERROR,
            RpcError::InvalidRequest(_) => codes::INVALID_REQUEST,
            RpcError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => codes::INVALID_PARAMS,
            RpcError::Internal(_) => codes::INTERNAL_ERROR,
            RpcError::TransactionNotFound(_) => codes::TRANSACTION_NOT_FOUND,
            RpcError::BadRequest(_) => codes::BAD_REQUEST,
            RpcError::Conflict(_) => codes::CONFLICT,
        }
    }
}

impl From<ValidationError> for RpcError {
    fn from(err: ValidationError) -> Self {
        RpcError::InvalidParams(err.to_string())
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => RpcError::Conflict(err.to_string()),
            StoreError::Backend(detail) => {
                tracing::error!("transaction store failure: {detail}");
                RpcError::Internal("transaction store failure".to_string())
            }
        }
    }
}
