//! Session label rows and payloads

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct LabelRow {
    pub id: i64,
    pub key: String,
    pub value: Option<String>,
    pub session_id: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelResponse {
    pub key: String,
    pub value: Option<String>,
    pub session_id: String,
    pub created_at: String,
}

impl From<LabelRow> for LabelResponse {
    fn from(row: LabelRow) -> Self {
        LabelResponse {
            key: row.key,
            value: row.value,
            session_id: row.session_id,
            created_at: row.created_at,
        }
    }
}
