//! Common test utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use momo_backoffice::services::TokenService;
use momo_backoffice::{db, Config};

/// Connect to the database named by DATABASE_URL with the schema applied.
/// Returns `None` when no usable database is configured so DB-backed suites
/// skip instead of failing.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .ok()?;

    if !db::check_schema(&pool).await.ok()? {
        return None;
    }

    Some(pool)
}

pub fn test_tokens() -> TokenService {
    TokenService::new(&Config {
        database_url: String::new(),
        database_max_connections: 5,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        jwt_secret: "db-test-secret".to_string(),
        jwt_access_expiration: 900,
        jwt_refresh_expiration: 604_800,
        jwt_reset_password_expiration: 3_600,
    })
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Phone numbers unique across tests and runs, so suites do not need to
/// truncate shared tables and can run in parallel.
pub fn unique_phone(prefix: &str) -> String {
    format!("{}{}", prefix, unique_suffix())
}

pub fn unique_suffix() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_micros();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", micros, n)
}

/// Insert a network with a unique name, returning its id
pub async fn seed_network(pool: &PgPool) -> i64 {
    sqlx::query_scalar("INSERT INTO networks (name) VALUES ($1) RETURNING id")
        .bind(format!("net-{}", unique_suffix()))
        .fetch_one(pool)
        .await
        .expect("Failed to seed network")
}
