use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use leadsync_core::webhook;
use leadsync_core::SyncError;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// POST /webhook/amocrm — accept a change notification and acknowledge
/// immediately. The body is normalized here (JSON or bracketed form) and
/// handed to the single consumer task; the caller never observes
/// reconciliation outcomes.
pub async fn amocrm_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload = parse_body(&headers, &body).map_err(|e| {
        tracing::warn!(
            error = %e,
            raw = %String::from_utf8_lossy(&body),
            "unparseable webhook body"
        );
        AppError(e.into())
    })?;

    app.queue
        .send(payload)
        .await
        .map_err(|_| AppError(anyhow::anyhow!("inbound queue closed")))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    ))
}

/// Normalize the body by transport. amoCRM sends JSON or form-encoded
/// bracketed keys depending on webhook configuration; with no usable
/// content type we try JSON first and fall back to form only when the body
/// plausibly is one.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> leadsync_core::Result<Value> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.contains("json") {
        return webhook::parse_json(body);
    }

    let as_text = || {
        std::str::from_utf8(body)
            .map_err(|e| SyncError::MalformedPayload(format!("body is not UTF-8: {e}")))
    };

    if content_type.contains("x-www-form-urlencoded") {
        return webhook::parse_form(as_text()?);
    }

    webhook::parse_json(body).or_else(|json_err| {
        let text = as_text()?;
        if text.contains('=') {
            webhook::parse_form(text)
        } else {
            Err(json_err)
        }
    })
}
