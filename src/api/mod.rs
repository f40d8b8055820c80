//! API module
//!
//! HTTP endpoints, middleware and shared request state.

pub mod middleware;
pub mod routes;

use sqlx::PgPool;

use crate::services::TokenService;
use crate::Config;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            tokens: TokenService::new(config),
        }
    }
}

pub use routes::create_router;
