// TRANSACTION REQUEST SERVICE
// Handles: transaction-request review, fee/nonce resolution, send-form
// validation, account and network state for Bitcoin and Stacks wallets.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;
use tokio::time;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod analytics;
mod chain_api;
mod error;
mod flow;
mod handlers;
mod inpage;
mod money;
mod networks;
mod nonce;
mod post_conditions;
mod state;
mod transaction_error;
mod types;
mod validators;

use analytics::AnalyticsBus;
use chain_api::ChainApiClient;
use networks::NetworkStore;
use state::{current_timestamp, AppState, Config, Metrics};

// Fulfilled requests are removed on the spot; abandoned ones are swept out
// here once their TTL passes.
async fn request_expiry_task(state: AppState) {
    let mut interval = time::interval(state.config.sweep_interval);
    let ttl = state.config.request_ttl.as_secs();

    loop {
        interval.tick().await;

        let now = current_timestamp();
        let expired: Vec<String> = state
            .requests
            .iter()
            .filter(|entry| now.saturating_sub(entry.created_at) > ttl)
            .map(|entry| entry.id.clone())
            .collect();

        for id in expired {
            state.requests.remove(&id);
            state.flows.remove(&id);
            let mut metrics = state.metrics.write().await;
            metrics.total_expired += 1;
            info!("[REVIEW] Request {} expired unanswered", id);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    info!("Starting Transaction Request Service v2.0");

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;
    info!("Connected to Redis");

    let state = AppState {
        chain: ChainApiClient::new(
            redis_conn.clone(),
            config.bitcoin_api_url.clone(),
            config.upstream_timeout,
        ),
        requests: Arc::new(DashMap::new()),
        flows: Arc::new(DashMap::new()),
        accounts: Arc::new(DashMap::new()),
        current_account_address: Arc::new(RwLock::new(None)),
        networks: Arc::new(NetworkStore::with_defaults(config.stacks_api_url.as_deref())),
        analytics: AnalyticsBus::new(redis_conn),
        metrics: Arc::new(RwLock::new(Metrics::new())),
        config: config.clone(),
    };

    tokio::spawn(request_expiry_task(state.clone()));

    let app = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/nonce/:address", get(handlers::get_nonce_handler))
        .route("/balance/:address", get(handlers::get_balance_handler))
        .route("/inpage/event", post(handlers::inpage_event_handler))
        .route("/request", post(handlers::register_request_handler))
        .route(
            "/request/:id",
            get(handlers::get_request_handler).delete(handlers::reject_request_handler),
        )
        .route("/request/:id/submit", post(handlers::submit_request_handler))
        .route("/send/validate", post(handlers::validate_send_form_handler))
        .route(
            "/networks",
            get(handlers::list_networks_handler).post(handlers::add_network_handler),
        )
        .route("/networks/current", put(handlers::change_network_handler))
        .route("/networks/:id", delete(handlers::remove_network_handler))
        .route(
            "/accounts",
            get(handlers::list_accounts_handler).post(handlers::add_account_handler),
        )
        .route("/accounts/current", put(handlers::select_account_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Transaction Request Service running on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
