use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adlm_backend::{
    app,
    config::{mask_secret, Config},
    db::connection::create_pool,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adlm_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_secret(&config.database_url),
        jwt_secret = %mask_secret(&config.jwt_secret),
        license_secret = %mask_secret(&config.license_secret),
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_token_ttl_days = config.refresh_token_ttl_days,
        license_token_ttl_days = config.license_token_ttl_days,
        currency = %config.currency,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let bind_addr = config.bind_addr.clone();
    let app = app(AppState::postgres(pool, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
