use crate::calc::{self, CoefficientTable};
use crate::ipc::error::{err, ok, ErrorCode};
use crate::ipc::helpers::{effective_config, ok_value, optional, required};
use crate::ipc::types::{AppState, Request};
use crate::model::{PeriodKey, RawGradeEntry, Scheme, Subject};
use crate::normalize::{self, SubjectResults};
use serde_json::json;

fn handle_grades_normalize(_state: &AppState, req: &Request) -> serde_json::Value {
    let period: PeriodKey = match required(req, "period") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grades: Vec<RawGradeEntry> = match required(req, "grades") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects: Vec<Subject> = match optional(req, "subjects") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let normalized = normalize::normalize_period(period, &grades, &subjects);
    ok_value(req, &normalized)
}

fn handle_averages_period(_state: &AppState, req: &Request) -> serde_json::Value {
    let results: SubjectResults = match required(req, "results") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects: Vec<Subject> = match optional(req, "subjects") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut defects = Vec::new();
    let table = CoefficientTable::from_subjects(&subjects, &mut defects);
    let avg = calc::compute_period_average(&results, &table);
    ok(
        &req.id,
        json!({
            "totalWeighted": avg.total_weighted,
            "totalCoefficient": avg.total_coefficient,
            "average": avg.average,
            "gradedSubjects": avg.graded_subjects,
            "defects": defects,
        }),
    )
}

fn handle_averages_annual(state: &AppState, req: &Request) -> serde_json::Value {
    let cfg = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scheme: Scheme = match required(req, "scheme") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let period_averages: Vec<Option<f64>> = match required(req, "periodAverages") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let max_periods = PeriodKey::all(scheme).len();
    if period_averages.len() > max_periods {
        return err(
            &req.id,
            ErrorCode::BadParams,
            format!("periodAverages has more than {} entries", max_periods),
            Some(json!({ "count": period_averages.len() })),
        );
    }

    let annual =
        calc::compute_annual_average(&period_averages, scheme, cfg.primary_annual_divisor);
    ok(&req.id, json!({ "annualAverage": annual }))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.normalize" => Some(handle_grades_normalize(state, req)),
        "averages.period" => Some(handle_averages_period(state, req)),
        "averages.annual" => Some(handle_averages_annual(state, req)),
        _ => None,
    }
}
