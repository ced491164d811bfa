//! Seller back-office service

use std::sync::Arc;

use anyhow::Result;
use seller_backoffice::api::{self, AppState};
use seller_backoffice::config::Config;
use seller_backoffice::locks::LockManager;
use seller_backoffice::marketplace::MarketplaceClient;
use seller_backoffice::publisher::{EventPublisher, NatsPublisher, NoopPublisher};
use seller_backoffice::storage::PgStore;
use seller_backoffice::sync::spawn_scheduler;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, "backoffice")),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will not be published");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let state = AppState {
        store: Arc::new(PgStore::new(db)),
        api: Arc::new(MarketplaceClient::new(config.marketplace.clone())?),
        publisher,
        locks: Arc::new(LockManager::new(config.lock_timeout)),
        sync: config.sync.clone(),
        webhook: config.webhook.clone(),
    };
    if spawn_scheduler(state.jobs()).is_none() {
        tracing::info!("SYNC_INTERVAL_SECS not set, syncing only on request");
    }

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("🚀 Seller back-office listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
