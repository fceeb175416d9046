use crate::ipc::error::ok;
use crate::ipc::helpers::{effective_config, required};
use crate::ipc::types::{AppState, Request};
use crate::ranking::{self, StudentAverage};
use serde_json::json;

fn handle_ranking_compute(state: &AppState, req: &Request) -> serde_json::Value {
    let cfg = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let averages: Vec<StudentAverage> = match required(req, "averages") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let ranks = ranking::rank_period(&averages, cfg.tie_epsilon);
    let stats = ranking::class_period_stats(&averages);
    ok(&req.id, json!({ "ranks": ranks, "stats": stats }))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ranking.compute" => Some(handle_ranking_compute(state, req)),
        _ => None,
    }
}
