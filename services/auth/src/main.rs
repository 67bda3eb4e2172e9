use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::{
    AppState,
    jwt::{JwtConfig, JwtService},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{ProfileRepository, RoleRepository, UserRepository},
    routes,
    session::SessionManager,
};
use common::cache::{RedisConfig, RedisPool};
use common::database;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting identity service");

    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let jwt_config = JwtConfig::from_env()?;
    let jwt_service = JwtService::new(jwt_config)?;

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;

    let session_manager = SessionManager::new(redis_pool.clone(), jwt_service.clone());
    let users = UserRepository::new(pool.clone());
    let profiles = ProfileRepository::new(pool.clone());
    let roles = RoleRepository::new(pool);
    let rate_limiter = RateLimiter::new(RateLimiterConfig::default());

    let app_state = AppState {
        redis_pool,
        jwt_service,
        session_manager,
        users,
        profiles,
        roles,
        rate_limiter,
    };

    let app = routes::create_router(app_state);

    let bind_addr = std::env::var("AUTH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Identity service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
