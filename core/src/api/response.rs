use reqwest::{header::CONTENT_TYPE, Response, StatusCode};
use serde_json::{json, Value};

use super::ApiError;

/// Reads a response into JSON, turning non-success statuses into
/// [`ApiError::Server`].
///
/// Successful bodies are parsed as JSON when the content type says so, raw
/// text is wrapped as `{"message": text}` and an empty body becomes `{}`.
pub(crate) async fn read_json(resp: Response) -> Result<Value, ApiError> {
    let status = resp.status();
    let is_json = is_json_response(&resp);
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(failure(status, &body));
    }
    success_body(is_json, &body)
}

/// The error for a non-success `status` with `body`.
pub(crate) fn failure(status: StatusCode, body: &str) -> ApiError {
    let extracted = extract_message(body);
    let from_body = extracted.is_some();
    let message = extracted.unwrap_or_else(|| status_line(status));
    tracing::debug!(status = status.as_u16(), %message, "request failed");
    ApiError::Server {
        status: status.as_u16(),
        message,
        from_body,
    }
}

fn is_json_response(resp: &Response) -> bool {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("json"))
        .unwrap_or(false)
}

fn success_body(is_json: bool, body: &str) -> Result<Value, ApiError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    if is_json {
        serde_json::from_str(trimmed).map_err(|err| ApiError::Decode(err.to_string()))
    } else {
        Ok(json!({ "message": trimmed }))
    }
}

/// Best-effort message for a failed request.
///
/// Looks for a `message` or `error` field in a JSON body, then a JSON string
/// body, then raw text. An empty body yields `"{status} {reason}"`.
pub fn error_message(status: StatusCode, body: &str) -> String {
    extract_message(body).unwrap_or_else(|| status_line(status))
}

pub(crate) fn status_line(status: StatusCode) -> String {
    format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let extracted = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(text_of)),
        Ok(Value::String(text)) => Some(text),
        Ok(_) | Err(_) => Some(trimmed.to_owned()),
    };
    extracted
        .map(|text| strip_quotes(&text).to_owned())
        .filter(|text| !text.is_empty())
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Drops one pair of matching quotes wrapping the whole text.
pub fn strip_quotes(text: &str) -> &str {
    let text = text.trim();
    ['"', '\'']
        .into_iter()
        .find_map(|quote| text.strip_prefix(quote)?.strip_suffix(quote))
        .map(str::trim)
        .unwrap_or(text)
}
