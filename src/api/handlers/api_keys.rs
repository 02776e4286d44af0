//! API key management

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use super::PageParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{ValidJson, ValidQuery};
use crate::api::middleware::auth::AuthUser;
use crate::services::credentials::{generate_api_key_secret, generate_salt, hash_secret};
use crate::storage::models::{
    ApiKeyCreatedResponse, ApiKeyResponse, CreateApiKeyRequest, OffsetPagination,
};
use crate::AppState;

pub async fn create(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<CreateApiKeyRequest>,
) -> ApiResult<(StatusCode, Json<ApiKeyCreatedResponse>)> {
    let secret = generate_api_key_secret();
    let salt = generate_salt();

    let hash_input = secret.clone();
    let hash = tokio::task::spawn_blocking(move || hash_secret(&hash_input, &salt))
        .await
        .map_err(|_| ApiError::Internal)?;

    let row = state
        .db
        .create_api_key(&auth.user_id, request.description, &salt, &hash)
        .await?;

    // The only time the plaintext secret leaves the service.
    let key_json = serde_json::json!({ "apiKeyId": row.id, "apiKeySecret": secret });
    let key = STANDARD.encode(key_json.to_string());

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            id: row.id,
            key,
            description: row.description,
            created_at: row.created_at,
        }),
    ))
}

pub async fn list(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageParams>,
) -> ApiResult<Json<OffsetPagination<ApiKeyResponse>>> {
    let (items, total) = state
        .db
        .list_api_keys(&auth.user_id, page.offset, page.limit)
        .await?;

    Ok(Json(OffsetPagination {
        items: items.into_iter().map(ApiKeyResponse::from).collect(),
        total,
        offset: page.offset,
        limit: page.limit,
    }))
}

pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiKeyResponse>> {
    let row = state
        .db
        .get_api_key_for_user(&id.to_string(), &auth.user_id)
        .await?;
    Ok(Json(ApiKeyResponse::from(row)))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state
        .db
        .delete_api_key(&id.to_string(), &auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
