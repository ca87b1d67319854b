use {
    axum::{
        Json,
        body::Bytes,
        extract::State,
        http::{HeaderMap, HeaderValue, Method, StatusCode, header},
        response::{IntoResponse, Response},
    },
    serde_json::Value,
    tracing::debug,
};

use crate::{error::ApiError, server::AppState};

pub const CACHE_CONTROL: &str = "s-maxage=10, stale-while-revalidate";

/// `POST { "id": "..." }` (or `id=...` as a urlencoded form) resolves; any
/// other verb is a CORS preflight-style no-op answered with an empty 200.
pub async fn resolve_handler(
    method: Method,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if method != Method::POST {
        return Ok(StatusCode::OK.into_response());
    }

    let id = if is_form(&headers) {
        extract_form_id(&body)
    } else {
        extract_id(&body)
    }
    .ok_or(ApiError::InvalidRequest)?;
    debug!(stream_id = %id, "resolve request");

    let outcome = state.resolver.resolve(&id).await?;
    let mut response = Json(outcome.result).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    Ok(response)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// JSON bodies need a non-empty string `id`. Numbers and other JSON types
/// are rejected rather than coerced.
fn extract_id(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let id = value.get("id")?.as_str()?;
    non_blank(id)
}

fn extract_form_id(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "id")
        .and_then(|(_, id)| non_blank(&id))
}

fn non_blank(id: &str) -> Option<String> {
    (!id.trim().is_empty()).then(|| id.to_string())
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "cache": state.resolver.cache().map(|c| c.backend()),
    }))
}
