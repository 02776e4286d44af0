//! Grouping query endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidQuery;
use crate::api::middleware::auth::AuthUser;
use crate::query::{expected_keys, QueryParser};
use crate::storage::database::DateWindow;
use crate::storage::models::{GroupPage, QueryValidationResponse};
use crate::AppState;

fn default_group_limit() -> i64 {
    10
}

fn default_query_str() -> String {
    String::new()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQueryParams {
    #[serde(default = "default_query_str")]
    pub query_str: String,
}

pub async fn validate_query(
    ValidQuery(params): ValidQuery<ValidateQueryParams>,
) -> ApiResult<Json<QueryValidationResponse>> {
    let parsed = QueryParser::parse(&params.query_str)
        .map_err(|e| ApiError::Validation(format!("Invalid query: {e}")))?;
    Ok(Json(QueryValidationResponse {
        is_grouping: parsed.is_grouping(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGroupsParams {
    #[serde(default = "default_query_str")]
    pub query_str: String,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_group_limit")]
    pub limit: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub async fn list(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListGroupsParams>,
) -> ApiResult<Json<GroupPage>> {
    let parsed = QueryParser::parse(&params.query_str)
        .map_err(|e| ApiError::Validation(format!("Invalid query: {e}")))?;

    // A non-grouping query yields an empty envelope, not an error.
    let Some(group_by) = parsed.group_by else {
        return Ok(Json(GroupPage {
            items: Vec::new(),
            total: 0,
            offset: params.offset,
            limit: params.limit,
            header: None,
            aggregated_status: None,
        }));
    };

    let window = DateWindow {
        start: params.start_date,
        end: params.end_date,
    };

    let (items, total, aggregated_status) = state
        .db
        .list_groups(
            &auth.user_id,
            &group_by.tokens,
            &parsed.main,
            window,
            params.offset,
            params.limit,
        )
        .await?;

    let header = if items.is_empty() {
        None
    } else {
        Some(expected_keys(&group_by.tokens))
    };

    Ok(Json(GroupPage {
        items,
        total,
        offset: params.offset,
        limit: params.limit,
        header,
        aggregated_status,
    }))
}
