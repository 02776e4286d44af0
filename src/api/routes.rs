//! API route definitions

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use super::handlers::{api_keys, auth, groups, ingress, labels, ready, sessions, testcases};
use super::middleware::auth::require_auth;
use crate::AppState;

/// Create all API routes
pub fn create_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes - no bearer token required. Ingress authenticates
    // with an API key inside the handlers.
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/ingress/sessions", post(ingress::create_session))
        .route("/ingress/testcases", post(ingress::create_testcases))
        .route("/ready", get(ready::ready_check));

    // Protected routes - require a JWT access token.
    let protected_routes = Router::new()
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        .route("/api-keys", post(api_keys::create).get(api_keys::list))
        .route("/api-keys/:id", get(api_keys::get).delete(api_keys::delete))
        .route("/sessions", get(sessions::list))
        .route("/sessions/:id", get(sessions::get))
        .route("/labels", get(labels::list))
        .route("/testcases", get(testcases::list))
        .route("/testcases/:id", get(testcases::get))
        .route("/groups/validate-query", get(groups::validate_query))
        .route("/groups", get(groups::list))
        .layer(from_fn_with_state(state, require_auth));

    Router::new().merge(public_routes).merge(protected_routes)
}
