//! Letter approval server

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use approval::config::Config;
use approval::workflow::{NotificationHub, WebhookClient};
use approval::{api, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "approval=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Database connection
    let pool = store::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    // Run migrations
    store::migrate(&pool).await?;

    let mut hub = NotificationHub::new(config.notify_inbox_capacity);
    if let Some(url) = &config.notify_webhook_url {
        tracing::info!("Forwarding rejection notices to {}", url);
        hub = hub.with_webhook(WebhookClient::new(url));
    }
    let state = AppState::with_notifications(pool, hub);

    // Build router
    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
