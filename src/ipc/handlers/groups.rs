use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::grouping::{GroupDraft, GroupError};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{api, optional_i64, optional_str, required_i64, required_str, respond};
use crate::ipc::types::{AppState, Notification, Request};
use crate::model::Gradebook;

const LOAD_FAILED: &str = "ไม่สามารถโหลดข้อมูลกลุ่มได้";
const SAVED: &str = "บันทึกข้อมูลกลุ่มเรียบร้อยแล้ว";

fn group_err(e: GroupError) -> HandlerErr {
    let code = match e {
        GroupError::UnknownGroup(_) | GroupError::UnknownEnrollment(_) => "not_found",
        GroupError::EmptyName | GroupError::NoGroups | GroupError::TooManyGroups { .. } => {
            "bad_params"
        }
    };
    HandlerErr::new(code, e.to_string())
}

fn draft_mut(state: &mut AppState) -> Result<&mut GroupDraft, HandlerErr> {
    state
        .groups
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_session", "group manager is not open"))
}

fn draft_json(d: &GroupDraft) -> Result<Value, HandlerErr> {
    serde_json::to_value(d.view()).map_err(|e| HandlerErr::new("server_error", e.to_string()))
}

/// Ids default to the open gradebook and its active unit.
fn open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let session = state.gradebook.as_ref();
    let plan_id = optional_i64(&req.params, "planId")
        .or_else(|| session.and_then(|s| s.plan_id))
        .ok_or_else(|| HandlerErr::bad_params("missing planId"))?;
    let course_id = optional_i64(&req.params, "courseId")
        .or_else(|| session.map(|s| s.book.course_id))
        .ok_or_else(|| HandlerErr::bad_params("missing courseId"))?;
    let classroom_id = optional_i64(&req.params, "classroomId")
        .or_else(|| session.map(|s| s.book.classroom_id))
        .ok_or_else(|| HandlerErr::bad_params("missing classroomId"))?;
    let unit_id = optional_i64(&req.params, "unitId")
        .or_else(|| session.and_then(|s| s.active_unit))
        .ok_or_else(|| HandlerErr::bad_params("select a unit before managing groups"))?;

    let api = api(state)?;
    let enrollments = api
        .classroom_enrollments(classroom_id)
        .map_err(|e| HandlerErr::load_failed(LOAD_FAILED, &e))?;
    let groups = api
        .plan_groups(plan_id, unit_id, course_id)
        .map_err(|e| HandlerErr::load_failed(LOAD_FAILED, &e))?;

    let draft = GroupDraft::from_server(plan_id, course_id, unit_id, enrollments, groups);
    let out = draft_json(&draft)?;
    state.groups = Some(draft);
    Ok(out)
}

fn add(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let name = optional_str(&req.params, "name");
    let d = draft_mut(state)?;
    let key = d.add_group(name.as_deref());
    Ok(json!({ "key": key, "draft": draft_json(d)? }))
}

fn rename(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let key = required_str(&req.params, "key")?;
    let name = req.params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let d = draft_mut(state)?;
    d.rename(&key, name).map_err(group_err)?;
    draft_json(d)
}

fn delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let key = required_str(&req.params, "key")?;
    let d = draft_mut(state)?;
    let released = d.delete(&key).map_err(group_err)?;
    Ok(json!({ "released": released, "draft": draft_json(d)? }))
}

fn move_member(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let enrollment = required_i64(&req.params, "enrollmentId")?;
    let to = optional_str(&req.params, "to");
    let d = draft_mut(state)?;
    d.move_member(enrollment, to.as_deref()).map_err(group_err)?;
    draft_json(d)
}

fn auto_generate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let count = required_i64(&req.params, "count")?;
    let count = usize::try_from(count).map_err(|_| group_err(GroupError::NoGroups))?;
    let seed = optional_i64(&req.params, "seed");
    let d = draft_mut(state)?;
    match seed {
        Some(s) => d.auto_generate(count, &mut StdRng::seed_from_u64(s as u64)),
        None => d.auto_generate(count, &mut rand::thread_rng()),
    }
    .map_err(group_err)?;
    draft_json(d)
}

fn save(state: &mut AppState) -> Result<Value, HandlerErr> {
    let api = api(state)?;
    let d = state
        .groups
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_session", "group manager is not open"))?;
    api.save_plan_groups(d.plan_id, d.unit_id, d.course_id, &d.submission())?;
    info!(plan_id = d.plan_id, unit_id = d.unit_id, groups = d.groups.len(), "groups saved");
    let course_id = d.course_id;
    state.groups = None;
    state.notify(Notification::success(SAVED, None));

    // Group ids in the table are stale now; reload the open gradebook for the same course.
    let mut reloaded = false;
    if let Some(session) = state.gradebook.as_mut() {
        if session.book.course_id == course_id {
            let classroom_id = session.book.classroom_id;
            match api
                .gradebook_data(course_id, classroom_id)
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    Gradebook::from_json(course_id, classroom_id, &raw).map_err(|e| e.to_string())
                }) {
                Ok(book) => {
                    session.book = book;
                    reloaded = true;
                }
                Err(e) => warn!(course_id, error = %e, "gradebook reload after group save failed"),
            }
        }
    }
    Ok(json!({ "saved": true, "gradebookReloaded": reloaded }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "groups.open" => open(state, req),
        "groups.view" => draft_mut(state).and_then(|d| draft_json(d)),
        "groups.add" => add(state, req),
        "groups.rename" => rename(state, req),
        "groups.delete" => delete(state, req),
        "groups.move" => move_member(state, req),
        "groups.autoGenerate" => auto_generate(state, req),
        "groups.save" => save(state),
        "groups.close" => {
            state.groups = None;
            Ok(json!({ "closed": true }))
        }
        _ => return None,
    };
    Some(respond(&req.id, result))
}
