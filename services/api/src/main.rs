use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{
    context::{PgSnapshotSource, SessionContext},
    middleware::TokenVerifier,
    repositories::{ContributionRepository, ProfileRepository, RoleRepository},
    routes,
    state::AppState,
};
use common::database;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting application service");

    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let token_verifier = TokenVerifier::from_env()?;

    let contributions = ContributionRepository::new(pool.clone());
    let profiles = ProfileRepository::new(pool.clone());
    let roles = RoleRepository::new(pool);

    let context = SessionContext::new(PgSnapshotSource::new(profiles.clone(), roles));

    let app_state = AppState {
        contributions,
        profiles,
        context,
        token_verifier,
    };

    let app = routes::create_router(app_state);

    let bind_addr = std::env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Application service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
