//! Readiness probe

use axum::Json;

pub async fn ready_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
