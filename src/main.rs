use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anchor_dispatcher::asset::AssetCatalog;
use anchor_dispatcher::auth::JwtService;
use anchor_dispatcher::config::Config;
use anchor_dispatcher::rpc::dispatch::Dispatcher;
use anchor_dispatcher::stellar::HorizonClient;
use anchor_dispatcher::store::memory::InMemoryTransactionStore;
use anchor_dispatcher::store::TransactionRepository;
use anchor_dispatcher::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let assets = match &config.assets_file {
        Some(path) => Arc::new(AssetCatalog::from_file(path)?),
        None => Arc::new(AssetCatalog::builtin()),
    };

    let horizon = config.horizon_url.clone().map(HorizonClient::new);
    if let Some(url) = &config.horizon_url {
        tracing::info!("Horizon client initialized with URL: {url}");
    }

    let repository = TransactionRepository::new(
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(InMemoryTransactionStore::new()),
    );
    let dispatcher = Arc::new(Dispatcher::new(repository, assets, horizon));

    let secrets = config.jwt_secrets();
    let jwt = if secrets.is_empty() {
        tracing::warn!("no auth secrets configured, RPC endpoint is open");
        None
    } else {
        Some(Arc::new(JwtService::new(secrets)))
    };

    let state = AppState {
        dispatcher,
        jwt,
        start_time: Instant::now(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Action dispatcher listening on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
