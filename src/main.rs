mod broadcast;
mod db;
mod error;
mod health;
mod notification;
mod routes;
mod state;
mod websocket;

use anyhow::Context;
use db::{create_pool, run_migrations};
use notification::{InMemoryNotificationBackend, NotificationBackend, PgNotificationBackend};
use routes::create_router;
use state::{AppState, Config, StorageBackend};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notification_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env().context("invalid configuration")?);

    let backend: Arc<dyn NotificationBackend> = match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            tracing::info!("Connecting to database...");
            let db = create_pool(database_url, config.database_max_connections).await?;

            tracing::info!("Running migrations...");
            run_migrations(&db).await?;

            Arc::new(PgNotificationBackend::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; notifications are lost on restart");
            match &config.memory_recipients {
                Some(recipients) => {
                    tracing::info!("Accepting notifications for {} recipients", recipients.len());
                    Arc::new(InMemoryNotificationBackend::with_recipients(recipients.iter().copied()))
                }
                None => Arc::new(InMemoryNotificationBackend::new()),
            }
        }
    };

    let state = AppState::new(config.clone(), backend);
    let app = create_router(state);

    // Start server
    let addr = config.address();
    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
