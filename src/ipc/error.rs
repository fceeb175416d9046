use serde::Serialize;
use serde_json::json;

/// Error codes a bulletind reply can carry. Data defects are not errors;
/// they travel inside a successful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadJson,
    BadParams,
    BadConfig,
    NotImplemented,
    Internal,
}

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({ "id": id, "ok": true, "result": result })
}

pub fn err(
    id: &str,
    code: ErrorCode,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut reply = rejected(code, message);
    reply["id"] = json!(id);
    if let Some(d) = details {
        reply["error"]["details"] = d;
    }
    reply
}

/// Reply for a line that never became a request, so there is no id to echo.
pub fn rejected(code: ErrorCode, message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": { "code": code, "message": message.into() },
    })
}
