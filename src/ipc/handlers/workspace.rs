use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::calc::{cumulative_periods, summary_panel, RatioTarget};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{api, optional_i64, required_i64, respond, save_id, score_input};
use crate::ipc::types::{AppState, Notification, PlanWorkspace, Request};
use crate::model::{ExamSlot, UnitAssessment};
use crate::outbox::{SaveEntry, SaveTarget};

const RATIO_SAVED: &str = "บันทึกเป้าหมายสัดส่วนคะแนนเรียบร้อยแล้ว";

fn plan(state: &AppState) -> Result<&PlanWorkspace, HandlerErr> {
    state
        .plan
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "no plan workspace open"))
}

fn plan_mut(state: &mut AppState) -> Result<&mut PlanWorkspace, HandlerErr> {
    state
        .plan
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "no plan workspace open"))
}

fn ratio_json(ws: &PlanWorkspace) -> Value {
    let effective = ws.ratio.unwrap_or_default();
    json!({
        "mid": effective.mid,
        "final": effective.final_ratio,
        "display": effective.display(),
        "isSet": ws.ratio.is_some(),
    })
}

fn summary_json(ws: &PlanWorkspace) -> Value {
    let panel = summary_panel(&ws.units, Some(ws.ratio.unwrap_or_default()));
    json!({
        "panel": panel,
        "ratio": ratio_json(ws),
    })
}

fn units_json(ws: &PlanWorkspace) -> Value {
    let hours: Vec<(i64, i64)> = ws.units.iter().map(|u| (u.unit_id, u.hours)).collect();
    let periods = cumulative_periods(&hours);
    let units: Vec<Value> = ws
        .units
        .iter()
        .zip(periods)
        .map(|(u, (_, label))| {
            json!({
                "unitId": u.unit_id,
                "title": u.title,
                "hours": u.hours,
                "periods": label,
                "collectedMax": u.collected_max,
                "midterm": u.midterm,
                "final": u.final_exam,
            })
        })
        .collect();
    Value::Array(units)
}

fn workspace_json(ws: &PlanWorkspace) -> Value {
    json!({
        "planId": ws.plan_id,
        "units": units_json(ws),
        "summary": summary_json(ws),
    })
}

fn open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let plan_id = required_i64(&req.params, "planId")?;
    let units: Vec<UnitAssessment> = match req.params.get("units") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid units: {}", e)))?,
        None => Vec::new(),
    };
    let units = units
        .into_iter()
        .map(|mut u| {
            u.hours = u.hours.max(0);
            u.midterm = u.midterm.normalized();
            u.final_exam = u.final_exam.normalized();
            u
        })
        .collect();

    // A target that cannot be loaded shows as unset; the panel keeps working.
    let ratio = match state.api.as_ref() {
        Some(api) => api.ratio_target(plan_id).unwrap_or_else(|e| {
            warn!(plan_id, error = %e, "ratio target could not be loaded");
            None
        }),
        None => None,
    };

    let ws = PlanWorkspace {
        plan_id,
        units,
        ratio,
    };
    let out = workspace_json(&ws);
    info!(plan_id, units = ws.units.len(), "plan workspace opened");
    state.plan = Some(ws);
    Ok(out)
}

fn set_hours(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let unit_id = save_id(&req.params, "unitId", "unitHours")?;
    let hours = required_i64(&req.params, "hours")?;
    if hours < 0 {
        return Err(HandlerErr::bad_params("hours must not be negative"));
    }
    let ws = plan_mut(state)?;
    let unit = ws
        .units
        .iter_mut()
        .find(|u| u.unit_id == unit_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unit {} is not in this plan", unit_id)))?;
    unit.hours = hours;
    let out = json!({ "units": units_json(ws) });

    state.outbox.queue(
        SaveTarget::UnitHours { unit: unit_id },
        vec![SaveEntry::UnitHours { hours }],
        Instant::now(),
    );
    Ok(out)
}

fn parse_slot(v: Option<&Value>, current: ExamSlot) -> Result<ExamSlot, HandlerErr> {
    let Some(v) = v else {
        return Ok(current);
    };
    let enabled = v
        .get("enabled")
        .and_then(|e| e.as_bool())
        .unwrap_or(current.enabled);
    let score = match v.get("score") {
        Some(s) => score_input(Some(s))?,
        None => current.score,
    };
    if score.map(|s| s < 0.0).unwrap_or(false) {
        return Err(HandlerErr::bad_params("exam score must not be negative"));
    }
    Ok(ExamSlot { enabled, score }.normalized())
}

fn set_exam_scores(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let unit_id = save_id(&req.params, "unitId", "unitExamScores")?;
    let ws = plan_mut(state)?;
    let unit = ws
        .units
        .iter_mut()
        .find(|u| u.unit_id == unit_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("unit {} is not in this plan", unit_id)))?;
    unit.midterm = parse_slot(req.params.get("midterm"), unit.midterm)?;
    unit.final_exam = parse_slot(req.params.get("final"), unit.final_exam)?;
    let entry = SaveEntry::UnitExamScores {
        midterm: unit.midterm.score,
        final_score: unit.final_exam.score,
    };
    let out = summary_json(ws);

    state.outbox.queue(
        SaveTarget::UnitExamScores { unit: unit_id },
        vec![entry],
        Instant::now(),
    );
    Ok(out)
}

fn ratio_load(state: &mut AppState) -> Result<Value, HandlerErr> {
    let plan_id = plan(state)?.plan_id;
    let ratio = api(state)?.ratio_target(plan_id)?;
    let ws = plan_mut(state)?;
    ws.ratio = ratio;
    Ok(summary_json(ws))
}

fn ratio_save(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let mid = required_i64(&req.params, "mid")?;
    let target = match optional_i64(&req.params, "final") {
        Some(fin) => RatioTarget::new(mid, fin),
        None => RatioTarget::from_mid(mid),
    }
    .map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let plan_id = plan(state)?.plan_id;
    api(state)?.save_ratio_target(plan_id, target)?;
    info!(plan_id, ratio = %target.display(), "ratio target saved");
    state.notify(Notification::success(RATIO_SAVED, Some(format!("ratio:plan={}", plan_id))));
    let ws = plan_mut(state)?;
    ws.ratio = Some(target);
    Ok(summary_json(ws))
}

fn ratio_clear(state: &mut AppState) -> Result<Value, HandlerErr> {
    let plan_id = plan(state)?.plan_id;
    api(state)?.delete_ratio_target(plan_id)?;
    info!(plan_id, "ratio target cleared");
    let ws = plan_mut(state)?;
    ws.ratio = None;
    Ok(summary_json(ws))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "workspace.open" => open(state, req),
        "units.setHours" => set_hours(state, req),
        "units.setExamScores" => set_exam_scores(state, req),
        "summary.get" => plan(state).map(summary_json),
        "ratio.load" => ratio_load(state),
        "ratio.save" => ratio_save(state, req),
        "ratio.clear" => ratio_clear(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
