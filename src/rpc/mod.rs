//! JSON-RPC 2.0 transport for the action dispatcher.

pub mod dispatch;
pub mod response;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::JwtAudience;
use crate::error::RpcError;
use crate::AppState;
use response::GetTransactionResponse;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GetTransactionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorResponse>,
}

impl RpcResponse {
    pub fn result(id: Value, result: GetTransactionResponse) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, err: &RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorResponse {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }
}

/// The single RPC endpoint. The body is read raw so that malformed JSON can
/// still be answered with a well-formed JSON-RPC parse error.
pub async fn rpc(State(state): State<AppState>, body: String) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            return Json(RpcResponse::error(
                Value::Null,
                &RpcError::Parse(err.to_string()),
            ));
        }
    };

    Json(state.dispatcher.dispatch(request).await)
}

/// Bearer-token guard for the RPC endpoint. Enabled only when a platform
/// secret is configured; dev setups run open.
pub async fn require_platform_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(jwt) = &state.jwt else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    jwt.decode(JwtAudience::Platform, token)
        .map_err(|err| {
            tracing::warn!("rejected platform token: {err}");
            StatusCode::UNAUTHORIZED
        })?;

    Ok(next.run(req).await)
}
