use crate::config::EngineConfig;
use crate::ipc::error::{err, ok, ErrorCode};
use crate::ipc::types::{AppState, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

pub fn required<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key).filter(|v| !v.is_null()) else {
        return Err(err(&req.id, ErrorCode::BadParams, format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            ErrorCode::BadParams,
            format!("invalid {}: {}", key, e),
            None,
        )
    })
}

/// Missing or null params fall back to `T::default()`.
pub fn optional<T: DeserializeOwned + Default>(
    req: &Request,
    key: &str,
) -> Result<T, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(T::default()),
        Some(v) if v.is_null() => Ok(T::default()),
        Some(_) => required(req, key),
    }
}

pub fn effective_config(state: &AppState, req: &Request) -> Result<EngineConfig, serde_json::Value> {
    state
        .config
        .with_overrides(req.params.get("config"))
        .map_err(|e| {
            err(
                &req.id,
                ErrorCode::BadConfig,
                e.message,
                req.params.get("config").map(|c| json!({ "config": c })),
            )
        })
}

pub fn ok_value<T: Serialize>(req: &Request, result: &T) -> serde_json::Value {
    match serde_json::to_value(result) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, ErrorCode::Internal, format!("serialize result: {e}"), None),
    }
}
