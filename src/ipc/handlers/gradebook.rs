use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{api, gradebook, gradebook_mut, optional_i64, required_i64, respond, save_id, score_input};
use crate::ipc::types::{AppState, GradebookSession, Request};
use crate::model::{value_to_text, ExamType, Gradebook};
use crate::outbox::{SaveEntry, SaveTarget};
use crate::propagate::{self, Batch, BatchKind, CellRef, CellValue, Edit, PropagationError, ToggleBoard, ToggleKey, ToggleMode};
use crate::view::{cell_key, gradebook_view};

const LOAD_FAILED: &str = "ไม่สามารถโหลดข้อมูลสมุดคะแนนได้";

fn view_json(session: &GradebookSession) -> Result<Value, HandlerErr> {
    let view = gradebook_view(&session.book, &session.toggles, session.active_unit);
    serde_json::to_value(view).map_err(|e| HandlerErr::new("server_error", e.to_string()))
}

fn propagation_err(e: PropagationError) -> HandlerErr {
    let code = match e {
        PropagationError::UnknownStudent(_)
        | PropagationError::UnknownItem(_)
        | PropagationError::UnknownTopic(_) => "not_found",
        _ => "bad_params",
    };
    HandlerErr::new(code, e.to_string())
}

/// `{"kind": "item"|"topic", "id": n}` or `{"kind": "exam", "examType": "midterm"|"final"}`.
fn parse_cell(v: Option<&Value>, save: &str) -> Result<CellRef, HandlerErr> {
    let v = v.ok_or_else(|| HandlerErr::bad_params("missing cell"))?;
    let kind = v.get("kind").and_then(|k| k.as_str()).unwrap_or("");
    match kind {
        "item" => Ok(CellRef::Item(save_id(v, "id", save)?)),
        "topic" => Ok(CellRef::Topic(save_id(v, "id", save)?)),
        "exam" => {
            let raw = v.get("examType").and_then(|t| t.as_str()).unwrap_or("");
            ExamType::parse(raw).map(CellRef::Exam).ok_or_else(|| {
                error!(save = save, "save aborted: missing exam type");
                HandlerErr::bad_params("missing cell.examType")
            })
        }
        other => Err(HandlerErr::bad_params(format!("unknown cell kind: {}", other))),
    }
}

fn toggle_key(book: &Gradebook, cell: CellRef) -> Result<ToggleKey, HandlerErr> {
    match cell {
        CellRef::Item(id) => {
            book.item(id)
                .ok_or_else(|| propagation_err(PropagationError::UnknownItem(id)))?;
            Ok(ToggleKey::Item(id))
        }
        CellRef::Topic(id) => book
            .topic_slot(id)
            .map(|slot| ToggleKey::Topic(slot.main.id))
            .ok_or_else(|| propagation_err(PropagationError::UnknownTopic(id))),
        CellRef::Exam(exam) => Ok(ToggleKey::Exam(exam)),
    }
}

fn cell_value_json(v: &CellValue) -> Value {
    match v {
        CellValue::Number(n) => json!(n),
        CellValue::Category(c) => json!(c),
    }
}

/// Outbox target and entries for one propagation batch.
pub fn batch_entries(course_id: i64, batch: &Batch) -> (SaveTarget, Vec<SaveEntry>) {
    let target = match batch.kind {
        BatchKind::Scores => SaveTarget::Scores { course: course_id },
        BatchKind::ExamScores => SaveTarget::ExamScores { course: course_id },
        BatchKind::Qualitative => SaveTarget::Qualitative { course: course_id },
    };
    let entries = batch
        .changes
        .iter()
        .filter_map(|c| match (c.cell, &c.value) {
            (CellRef::Item(item), CellValue::Number(score)) => Some(SaveEntry::Score {
                student: c.student,
                item,
                score: *score,
            }),
            (CellRef::Exam(exam), CellValue::Number(score)) => Some(SaveEntry::Exam {
                student: c.student,
                exam,
                score: *score,
            }),
            (CellRef::Topic(topic), CellValue::Category(value)) => Some(SaveEntry::Qualitative {
                student: c.student,
                topic,
                value: value.clone(),
            }),
            _ => None,
        })
        .collect();
    (target, entries)
}

fn open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = required_i64(&req.params, "courseId")?;
    let classroom_id = required_i64(&req.params, "classroomId")?;
    let requested_unit = optional_i64(&req.params, "unitId");
    let plan_id = optional_i64(&req.params, "planId");

    let raw = api(state)?
        .gradebook_data(course_id, classroom_id)
        .map_err(|e| HandlerErr::load_failed(LOAD_FAILED, &e))?;
    let book = Gradebook::from_json(course_id, classroom_id, &raw).map_err(|e| {
        error!(course_id, classroom_id, error = %e, "gradebook payload rejected");
        HandlerErr::new("load_failed", LOAD_FAILED).with_details(json!({ "cause": e.to_string() }))
    })?;

    let active_unit = requested_unit
        .filter(|u| book.has_unit(*u))
        .or_else(|| book.first_unit_id());
    info!(course_id, classroom_id, rows = book.rows.len(), "gradebook loaded");

    let session = GradebookSession {
        book,
        toggles: ToggleBoard::default(),
        active_unit,
        plan_id,
    };
    let out = view_json(&session)?;
    state.gradebook = Some(session);
    Ok(out)
}

fn select_unit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let unit = optional_i64(&req.params, "unitId");
    let session = gradebook_mut(state)?;
    if let Some(u) = unit {
        if !session.book.has_unit(u) {
            return Err(HandlerErr::new("not_found", format!("unit {} is not in this gradebook", u)));
        }
    }
    session.active_unit = unit;
    view_json(session)
}

fn set_toggle(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let cell = parse_cell(req.params.get("column"), "toggle")?;
    let raw_mode = req.params.get("mode").and_then(|m| m.as_str()).unwrap_or("");
    let mode = ToggleMode::parse(raw_mode)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown toggle mode: {}", raw_mode)))?;
    let session = gradebook_mut(state)?;
    let key = toggle_key(&session.book, cell)?;
    session.toggles.set(key, mode).map_err(propagation_err)?;
    debug!(?key, ?mode, "toggle set");
    Ok(json!({ "mode": mode }))
}

fn edit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student = save_id(&req.params, "studentId", "gradebook")?;
    let cell = parse_cell(req.params.get("cell"), "gradebook")?;
    let raw = req.params.get("value");
    let value = match cell {
        CellRef::Item(_) | CellRef::Exam(_) => CellValue::Number(score_input(raw)?),
        CellRef::Topic(_) => CellValue::Category(raw.and_then(value_to_text)),
    };

    let session = gradebook_mut(state)?;
    let course_id = session.book.course_id;
    let batch = propagate::apply_edit(
        &mut session.book,
        &session.toggles,
        session.active_unit,
        &Edit { student, cell, value },
    )
    .map_err(propagation_err)?;

    let view = gradebook_view(&session.book, &session.toggles, session.active_unit);
    let rows: Vec<_> = view
        .rows
        .into_iter()
        .filter(|r| batch.affected.contains(&r.student_id))
        .collect();
    let changed: Vec<Value> = batch
        .changes
        .iter()
        .map(|c| {
            json!({
                "studentId": c.student,
                "key": cell_key(&c.cell),
                "value": cell_value_json(&c.value),
            })
        })
        .collect();

    let (target, entries) = batch_entries(course_id, &batch);
    state.outbox.queue(target, entries, Instant::now());

    Ok(json!({
        "changed": changed,
        "rows": rows,
        "queued": target.label(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "gradebook.open" => open(state, req),
        "gradebook.view" => gradebook(state).and_then(view_json),
        "gradebook.selectUnit" => select_unit(state, req),
        "gradebook.setToggle" => set_toggle(state, req),
        "gradebook.edit" => edit(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
