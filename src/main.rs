//! OpenSASE Inventory - stock ledger service

use anyhow::Result;
use opensase_inventory::config::InventoryConfig;
use opensase_inventory::http::{router, AppState};
use opensase_inventory::{EventSink, InventoryStore, MemoryStore, NatsSink, NoopSink, PgStore, StockMutator};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = InventoryConfig::from_env()?;

    let store: Arc<dyn InventoryStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db, config.lock_timeout))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping inventory in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let sink: Arc<dyn EventSink> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsSink::new(client, "inventory")),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable, inventory events will not be published");
                Arc::new(NoopSink)
            }
        },
        None => Arc::new(NoopSink),
    };

    let mutator = Arc::new(StockMutator::new(store, sink, config.lock_timeout, config.default_alert_threshold));
    let app = router(AppState::new(mutator))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!(port = config.port, lock_timeout_ms = config.lock_timeout.as_millis() as u64, "OpenSASE Inventory listening");
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
