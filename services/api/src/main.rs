use anyhow::{Context, Result};
use std::{env, sync::Arc};
use tracing::info;

mod error;
mod middleware;
mod models;
mod routes;
mod state;

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use dispatch::{DispatchConfig, Marketplace, store::PgStore};
use tokio::net::TcpListener;

use crate::{
    middleware::{JwtConfig, JwtVerifier},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init_tracing("info");

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let dispatch_config = DispatchConfig::from_env().context("invalid DISPATCH__ configuration")?;
    let jwt_config = JwtConfig::from_env().map_err(anyhow::Error::msg)?;
    let jwt = JwtVerifier::new(&jwt_config).map_err(anyhow::Error::msg)?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let marketplace = Marketplace::with_defaults(store, dispatch_config);

    let app_state = AppState {
        db_pool: pool,
        marketplace,
        jwt,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr = env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("API service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
