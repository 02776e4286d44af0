//! CI ingress endpoints, authenticated by API key

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::{extract::State, http::StatusCode, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ValidJson;
use crate::services::credentials::verify_secret;
use crate::storage::database::DatabaseError;
use crate::storage::models::{ApiKeyRow, NewTestcase, StatusWire};
use crate::AppState;

/// Decoded `X-API-Key` payload: `base64(JSON{apiKeyId, apiKeySecret})`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyCredentials {
    api_key_id: String,
    api_key_secret: String,
}

/// Resolve and verify the caller's API key.
async fn authenticate_api_key(
    state: &AppState,
    headers: &HeaderMap,
) -> ApiResult<ApiKeyRow> {
    let header = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::NotAuthorized("Missing X-API-Key header".to_string()))?;

    let credentials = STANDARD
        .decode(header)
        .ok()
        .and_then(|raw| serde_json::from_slice::<ApiKeyCredentials>(&raw).ok())
        .filter(|credentials| Uuid::parse_str(&credentials.api_key_id).is_ok())
        .ok_or_else(|| ApiError::NotAuthorized("Invalid API key format".to_string()))?;

    let api_key = state
        .db
        .get_api_key(&credentials.api_key_id)
        .await?
        .ok_or_else(invalid_api_key)?;

    let secret = credentials.api_key_secret;
    let salt = api_key.secret_salt.clone();
    let expected = api_key.secret_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_secret(&secret, &salt, &expected))
        .await
        .map_err(|_| ApiError::Internal)?;
    if !verified {
        return Err(invalid_api_key());
    }

    Ok(api_key)
}

fn invalid_api_key() -> ApiError {
    ApiError::NotAuthorized("Invalid API key".to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngressLabel {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngressSessionRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub baggage: Option<serde_json::Value>,
    #[serde(default)]
    pub labels: Option<Vec<IngressLabel>>,
}

#[derive(Debug, Serialize)]
pub struct IngressSessionResponse {
    pub id: String,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<IngressSessionRequest>,
) -> ApiResult<(StatusCode, Json<IngressSessionResponse>)> {
    let api_key = authenticate_api_key(&state, &headers).await?;

    let session_id = match request.id.as_deref() {
        Some(id) if !id.is_empty() => Uuid::parse_str(id)
            .map_err(|_| ApiError::Validation("Cannot parse session ID".to_string()))?,
        _ => Uuid::new_v4(),
    };

    let baggage = request
        .baggage
        .as_ref()
        .map(serde_json::Value::to_string);

    let session = state
        .db
        .create_session(
            &session_id.to_string(),
            request.description,
            baggage,
            &api_key.user_id,
        )
        .await
        .map_err(|e| match e {
            DatabaseError::AlreadyExists => {
                ApiError::Validation("Session with this ID already exists".to_string())
            }
            other => ApiError::from(other),
        })?;

    // Labels land in a second statement; a failure here leaves the
    // session created. Accepted relaxation.
    if let Some(labels) = request.labels {
        let entries: Vec<(String, Option<String>)> = labels
            .into_iter()
            .map(|label| (label.key, label.value))
            .collect();
        state
            .db
            .insert_labels(&session.id, &api_key.user_id, &entries)
            .await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(IngressSessionResponse { id: session.id }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngressTestcase {
    pub session_id: String,
    pub testcase_name: String,
    pub status: StatusWire,
    #[serde(default)]
    pub testcase_classname: Option<String>,
    #[serde(default)]
    pub testcase_file: Option<String>,
    #[serde(default)]
    pub testsuite: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub baggage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngressTestcasesRequest {
    pub testcases: Vec<IngressTestcase>,
}

pub async fn create_testcases(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<IngressTestcasesRequest>,
) -> ApiResult<StatusCode> {
    let api_key = authenticate_api_key(&state, &headers).await?;

    if request.testcases.is_empty() {
        return Ok(StatusCode::CREATED);
    }

    let mut rows = Vec::with_capacity(request.testcases.len());
    for testcase in request.testcases {
        let session_id = Uuid::parse_str(&testcase.session_id)
            .map_err(|_| ApiError::Validation("Cannot parse session ID".to_string()))?;

        let session = state
            .db
            .get_session(&session_id.to_string())
            .await?
            .ok_or_else(|| ApiError::Validation("Unknown session ID".to_string()))?;
        if session.user_id != api_key.user_id {
            return Err(ApiError::Validation("Session not found".to_string()));
        }

        rows.push(NewTestcase {
            session_id: session.id,
            user_id: api_key.user_id.clone(),
            status: testcase.status.into(),
            name: testcase.testcase_name,
            classname: testcase.testcase_classname,
            file: testcase.testcase_file,
            testsuite: testcase.testsuite,
            output: testcase.output,
            baggage: testcase.baggage.as_ref().map(serde_json::Value::to_string),
        });
    }

    state.db.insert_testcases(&rows).await?;

    Ok(StatusCode::CREATED)
}
