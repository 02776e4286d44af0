//! Label read endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::default_limit;
use crate::api::error::ApiResult;
use crate::api::extract::ValidQuery;
use crate::api::middleware::auth::AuthUser;
use crate::storage::models::{LabelResponse, OffsetPagination};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListLabelsParams {
    pub session_id: Uuid,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn list(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListLabelsParams>,
) -> ApiResult<Json<OffsetPagination<LabelResponse>>> {
    // Ownership gate; labels themselves are fetched by session.
    let session = state
        .db
        .get_session_for_user(&params.session_id.to_string(), &auth.user_id)
        .await?;

    let (items, total) = state
        .db
        .list_labels(&session.id, params.offset, params.limit)
        .await?;

    Ok(Json(OffsetPagination {
        items: items.into_iter().map(LabelResponse::from).collect(),
        total,
        offset: params.offset,
        limit: params.limit,
    }))
}
