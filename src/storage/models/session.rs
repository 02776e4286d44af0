//! Test session rows and payloads

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub description: Option<String>,
    pub baggage: Option<String>,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub description: Option<String>,
    pub baggage: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<SessionRow> for SessionResponse {
    fn from(row: SessionRow) -> Self {
        SessionResponse {
            id: row.id,
            description: row.description,
            baggage: row.baggage.and_then(|raw| serde_json::from_str(&raw).ok()),
            created_at: row.created_at,
        }
    }
}
