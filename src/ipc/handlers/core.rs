use crate::ipc::error::ok;
use crate::ipc::helpers::{effective_config, ok_value};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "config": state.config,
        }),
    )
}

fn handle_config_get(state: &AppState, req: &Request) -> serde_json::Value {
    match effective_config(state, req) {
        Ok(cfg) => ok_value(req, &cfg),
        Err(e) => e,
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "config.get" => Some(handle_config_get(state, req)),
        _ => None,
    }
}
