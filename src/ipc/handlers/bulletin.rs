use crate::bulletin;
use crate::ipc::error::ok;
use crate::ipc::helpers::{effective_config, ok_value, optional, required};
use crate::ipc::types::{AppState, Request};
use crate::model::BulletinRecord;
use crate::ranking::RankingSnapshot;
use serde_json::json;

fn handle_bulletin_assemble(state: &AppState, req: &Request) -> serde_json::Value {
    let cfg = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let record: BulletinRecord = match required(req, "bulletin") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let peers: Vec<BulletinRecord> = match optional(req, "classBulletins") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snapshots: Vec<RankingSnapshot> = match optional(req, "rankings") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let view = bulletin::assemble(&record, &peers, &snapshots, &cfg);
    ok_value(req, &view)
}

fn handle_bulletin_assemble_class(state: &AppState, req: &Request) -> serde_json::Value {
    let cfg = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records: Vec<BulletinRecord> = match required(req, "bulletins") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let snapshots: Vec<RankingSnapshot> = match optional(req, "rankings") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let views = bulletin::assemble_class(&records, &snapshots, &cfg);
    ok(&req.id, json!({ "bulletins": views }))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "bulletin.assemble" => Some(handle_bulletin_assemble(state, req)),
        "bulletin.assembleClass" => Some(handle_bulletin_assemble_class(state, req)),
        _ => None,
    }
}
