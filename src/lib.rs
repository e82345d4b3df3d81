pub mod asset;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod rpc;
pub mod stellar;
pub mod store;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::auth::JwtService;
use crate::rpc::dispatch::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub jwt: Option<Arc<JwtService>>,
    pub start_time: Instant,
}

pub fn create_app(state: AppState) -> Router {
    let rpc_router = Router::new()
        .route("/", post(rpc::rpc))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rpc::require_platform_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(rpc_router)
        .with_state(state)
}
