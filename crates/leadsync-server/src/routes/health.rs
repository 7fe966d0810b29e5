use axum::Json;

/// GET / — liveness probe.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "message": "service is running" }))
}
