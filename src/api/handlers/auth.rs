//! Login, token refresh and password management

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidJson;
use crate::api::middleware::auth::AuthUser;
use crate::services::credentials::{generate_salt, hash_secret, verify_secret};
use crate::services::tokens::TokenError;
use crate::storage::database::DatabaseError;
use crate::storage::models::{
    ChangePasswordRequest, LoginRequest, RefreshRequest, TokenPairResponse,
};
use crate::AppState;

pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> ApiResult<(StatusCode, Json<TokenPairResponse>)> {
    let user = state
        .db
        .get_user_by_username(&request.username)
        .await
        .map_err(|e| match e {
            DatabaseError::NotFound => invalid_credentials(),
            other => ApiError::from(other),
        })?;

    let password = request.password;
    let salt = user.password_salt.clone();
    let expected = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || verify_secret(&password, &salt, &expected))
            .await
            .map_err(|_| ApiError::Internal)?;
    if !verified {
        return Err(invalid_credentials());
    }

    let pair = issue_pair(&state, &user.id)?;
    Ok((StatusCode::CREATED, Json(pair)))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<RefreshRequest>,
) -> ApiResult<(StatusCode, Json<TokenPairResponse>)> {
    let claims = state
        .tokens
        .verify_refresh(&request.refresh_token)
        .map_err(|e| match e {
            TokenError::WrongKind => ApiError::NotAuthorized("Invalid token type".to_string()),
            _ => ApiError::NotAuthorized("Invalid refresh token".to_string()),
        })?;

    let pair = issue_pair(&state, &claims.sub)?;
    Ok((StatusCode::CREATED, Json(pair)))
}

pub async fn change_password(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    if !password_is_acceptable(&request.password_new) {
        return Err(ApiError::Validation(
            "Password must be 6-32 characters from [a-zA-Z0-9@_.!-]".to_string(),
        ));
    }

    let user = state.db.get_user(&auth.user_id).await?;

    let old_password = request.password_old;
    let salt = user.password_salt.clone();
    let expected = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || verify_secret(&old_password, &salt, &expected))
            .await
            .map_err(|_| ApiError::Internal)?;
    if !verified {
        return Err(ApiError::NotAuthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_password = request.password_new;
    let new_salt = generate_salt();
    let new_hash = tokio::task::spawn_blocking(move || hash_secret(&new_password, &new_salt))
        .await
        .map_err(|_| ApiError::Internal)?;
    state
        .db
        .update_user_password(&user.id, &new_salt, &new_hash)
        .await?;

    Ok(StatusCode::CREATED)
}

/// Tokens carry no server-side state, so logout is a client-side discard.
pub async fn logout() -> StatusCode {
    StatusCode::CREATED
}

fn issue_pair(state: &AppState, user_id: &str) -> ApiResult<TokenPairResponse> {
    state.tokens.issue_pair(user_id).map_err(|e| {
        tracing::error!(error = %e, "token issuance failed");
        ApiError::Internal
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::NotAuthorized("Invalid credentials".to_string())
}

fn password_is_acceptable(password: &str) -> bool {
    (6..=32).contains(&password.chars().count())
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | '.' | '!' | '-'))
}

#[cfg(test)]
mod tests {
    use super::password_is_acceptable;

    #[test]
    fn password_rules() {
        assert!(password_is_acceptable("abc123"));
        assert!(password_is_acceptable("A@_.!-9"));
        assert!(!password_is_acceptable("short"));
        assert!(!password_is_acceptable(&"x".repeat(33)));
        assert!(!password_is_acceptable("has space"));
        assert!(!password_is_acceptable("bad#char"));
    }
}
