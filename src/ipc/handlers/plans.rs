use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{api, optional_i64, required_i64, respond};
use crate::ipc::types::{AppState, ImportSession, Request};
use serde_json::json;
use tracing::{info, warn};

const NO_PREVIOUS_PLANS: &str = "ไม่พบแผนการสอนเดิมสำหรับวิชานี้";
const SEARCH_FAILED: &str = "ไม่สามารถค้นหาแผนเดิมได้";
const LOGS_FAILED: &str = "ไม่สามารถโหลดบันทึกหลังสอนได้";

fn workspace_path(plan_id: i64) -> String {
    format!("/teacher/plan/{}/workspace", plan_id)
}

fn previous(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = required_i64(&req.params, "subjectId")?;
    let target_year_id = required_i64(&req.params, "targetYearId")?;
    let api = api(state)?;

    // A new search always drops the previous selection.
    state.import = Some(ImportSession {
        subject_id,
        target_year_id,
        plans: Vec::new(),
        selected: None,
    });

    let plans = api
        .previous_plans(subject_id, target_year_id)
        .map_err(|e| {
            warn!(subject_id, error = %e, "previous plan search failed");
            HandlerErr::load_failed(SEARCH_FAILED, &e)
        })?;

    let empty_message = if plans.is_empty() {
        Some(NO_PREVIOUS_PLANS)
    } else {
        None
    };
    let out = json!({
        "plans": plans,
        "emptyMessage": empty_message,
        "canImport": false,
    });
    if let Some(session) = state.import.as_mut() {
        session.plans = plans;
    }
    Ok(out)
}

fn select_source(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let plan_id = required_i64(&req.params, "planId")?;
    let session = state
        .import
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_session", "search previous plans first"))?;
    if !session.plans.iter().any(|p| p.plan_id == plan_id) {
        return Err(HandlerErr::new("not_found", format!("plan {} is not in the list", plan_id)));
    }
    session.selected = Some(plan_id);
    Ok(json!({ "selected": plan_id, "canImport": true }))
}

fn teaching_logs(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let plan_id = required_i64(&req.params, "planId")?;
    let html = api(state)?
        .teaching_logs(plan_id)
        .map_err(|e| HandlerErr::load_failed(LOGS_FAILED, &e))?;
    Ok(json!({ "planId": plan_id, "html": html }))
}

fn create(
    state: &mut AppState,
    req: &Request,
    from_source: bool,
) -> Result<serde_json::Value, HandlerErr> {
    let (subject_id, target_year_id, source) = match state.import.as_ref() {
        Some(s) => (s.subject_id, s.target_year_id, s.selected),
        None => (
            required_i64(&req.params, "subjectId")?,
            required_i64(&req.params, "targetYearId")?,
            None,
        ),
    };
    let source = if from_source {
        Some(source.ok_or_else(|| HandlerErr::bad_params("no source plan selected"))?)
    } else {
        None
    };
    let subject_id = optional_i64(&req.params, "subjectId").unwrap_or(subject_id);
    let target_year_id = optional_i64(&req.params, "targetYearId").unwrap_or(target_year_id);

    // On failure the session (and its selection) stays so the user can retry.
    let new_plan_id = api(state)?
        .import_plan(subject_id, target_year_id, source)
        .map_err(|e| {
            warn!(subject_id, source = ?source, error = %e, "plan creation failed");
            HandlerErr::from(e)
        })?;

    info!(subject_id, source = ?source, new_plan_id, "plan created");
    state.import = None;
    Ok(json!({
        "newPlanId": new_plan_id,
        "redirect": workspace_path(new_plan_id),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "plans.previous" => previous(state, req),
        "plans.selectSource" => select_source(state, req),
        "plans.teachingLogs" => teaching_logs(state, req),
        "plans.import" => create(state, req, true),
        "plans.createBlank" => create(state, req, false),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
