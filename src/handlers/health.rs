use axum::response::Json;

use crate::errors::Result;

pub async fn liveness() -> Result<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
