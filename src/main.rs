use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use collabdrive::{config::Config, create_app, database::Database, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collabdrive=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let database = Database::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    database.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Database ready");

    let store = storage::create_store(&config)
        .await
        .context("Failed to initialize object storage")?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let app = create_app(database, store, config);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
