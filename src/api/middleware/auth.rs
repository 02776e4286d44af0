//! Bearer-token authentication middleware

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::api::error::ApiError;
use crate::services::tokens::TokenError;
use crate::AppState;

/// The authenticated subject, inserted into request extensions for
/// handlers to pick up.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Require a valid access token. Refresh tokens are explicitly rejected
/// here: their kind claim only opens the refresh endpoint.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(ApiError::NotAuthorized(
                "Missing or invalid Authorization header".to_string(),
            ))
        }
    };

    let claims = state.tokens.verify_access(token).map_err(|e| match e {
        TokenError::WrongKind => {
            ApiError::NotAuthorized("Refresh token cannot be used for resource access".to_string())
        }
        _ => ApiError::NotAuthorized("Invalid or expired token".to_string()),
    })?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
    });

    Ok(next.run(request).await)
}
