//! API key rows and payloads

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRow {
    pub id: String,
    pub description: Option<String>,
    pub secret_salt: Vec<u8>,
    pub secret_hash: Vec<u8>,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateApiKeyRequest {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub id: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<ApiKeyRow> for ApiKeyResponse {
    fn from(row: ApiKeyRow) -> Self {
        ApiKeyResponse {
            id: row.id,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// Returned exactly once at creation; `key` carries the plaintext secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreatedResponse {
    pub id: String,
    pub key: String,
    pub description: Option<String>,
    pub created_at: String,
}
