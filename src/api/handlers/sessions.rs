//! Session read endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use super::PageParams;
use crate::api::error::ApiResult;
use crate::api::extract::ValidQuery;
use crate::api::middleware::auth::AuthUser;
use crate::storage::models::{OffsetPagination, SessionResponse};
use crate::AppState;

pub async fn list(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PageParams>,
) -> ApiResult<Json<OffsetPagination<SessionResponse>>> {
    let (items, total) = state
        .db
        .list_sessions(&auth.user_id, page.offset, page.limit)
        .await?;

    Ok(Json(OffsetPagination {
        items: items.into_iter().map(SessionResponse::from).collect(),
        total,
        offset: page.offset,
        limit: page.limit,
    }))
}

pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SessionResponse>> {
    let row = state
        .db
        .get_session_for_user(&id.to_string(), &auth.user_id)
        .await?;
    Ok(Json(SessionResponse::from(row)))
}
