//! Testcase read endpoints, including group drill-down

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::default_limit;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidQuery;
use crate::api::middleware::auth::AuthUser;
use crate::query::sql::GroupColumnFilter;
use crate::query::{expected_keys, GroupIdentifier, ParsedQuery, Query as DslQuery, QueryParser};
use crate::storage::database::DateWindow;
use crate::storage::models::{TestcasePage, TestcaseResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTestcasesParams {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub query_str: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub group: Option<String>,
}

pub async fn list(
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListTestcasesParams>,
) -> ApiResult<Json<TestcasePage>> {
    let parsed = match params.query_str.as_deref() {
        Some(query_str) => Some(
            QueryParser::parse(query_str)
                .map_err(|e| ApiError::Validation(format!("Invalid query: {e}")))?,
        ),
        None => None,
    };

    let drilldown = resolve_group_filter(parsed.as_ref(), params.group.as_deref())?;

    let main = parsed.map(|p| p.main).unwrap_or(DslQuery::Empty);
    let window = DateWindow {
        start: params.start_date,
        end: params.end_date,
    };

    let (items, total, aggregated_status) = state
        .db
        .list_testcases(
            &auth.user_id,
            &main,
            window,
            drilldown.as_deref(),
            params.offset,
            params.limit,
        )
        .await?;

    Ok(Json(TestcasePage {
        items: items.into_iter().map(TestcaseResponse::from).collect(),
        total,
        offset: params.offset,
        limit: params.limit,
        aggregated_status,
    }))
}

pub async fn get(
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<TestcaseResponse>> {
    let row = state
        .db
        .get_testcase_for_user(&id.to_string(), &auth.user_id)
        .await?;
    Ok(Json(TestcaseResponse::from(row)))
}

/// A grouping query and the `group` parameter come and go together: the
/// parameter's keys must match the columns the grouping query induces, in
/// order. Returns the per-column filters to apply, or `None` for a plain
/// listing.
fn resolve_group_filter(
    parsed: Option<&ParsedQuery>,
    group: Option<&str>,
) -> ApiResult<Option<Vec<GroupColumnFilter>>> {
    let group = group.map(str::trim).filter(|g| !g.is_empty());
    let group_by = parsed.and_then(|p| p.group_by.as_ref());

    match (group_by, group) {
        (Some(_), None) => Err(ApiError::Validation(
            "Group parameter is required when using a grouping query".to_string(),
        )),
        (None, Some(_)) => Err(ApiError::Validation(
            "Group parameter can only be used with grouping queries".to_string(),
        )),
        (None, None) => Ok(None),
        (Some(group_by), Some(raw)) => {
            let identifier = GroupIdentifier::parse(raw)
                .map_err(|e| ApiError::Validation(format!("Invalid group identifier: {e}")))?;
            let expected = expected_keys(&group_by.tokens);
            if identifier.keys != expected {
                return Err(ApiError::Validation(format!(
                    "Group keys {:?} do not match the grouping query keys {:?}",
                    identifier.keys, expected
                )));
            }
            Ok(Some(identifier.column_filters(&group_by.tokens)))
        }
    }
}
