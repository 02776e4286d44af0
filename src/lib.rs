//! Multi-tenant test-results backend.
//!
//! CI pipelines push sessions, labels and testcases through the API-key
//! authenticated ingress; users browse them over a JWT-authenticated
//! query API with a small filter/grouping DSL compiled to SQL.

pub mod api;
pub mod query;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::Router;

use crate::services::tokens::TokenService;
use crate::storage::database::Database;

/// Application state shared across all handlers
pub struct AppState {
    /// Database connection pool
    pub db: Database,
    /// JWT issuance and verification
    pub tokens: TokenService,
}

/// Build the application router, rooted at `/api/v1`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api::routes::create_routes(state.clone()))
        .with_state(state)
}
