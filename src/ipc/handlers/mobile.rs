use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::calc::format_score;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{api, optional_i64, required_i64, required_str, respond, save_id, score_input};
use crate::ipc::types::{AppState, MobileSession, MobileStudent, Request};
use crate::model::{value_to_f64, value_to_i64, value_to_text, ItemId, StudentId};
use crate::outbox::{SaveEntry, SaveTarget};

pub const ATTENDANCE_STATUSES: [&str; 4] = ["PRESENT", "LATE", "ABSENT", "LEAVE"];
const NO_ITEM_SELECTED: &str = "ยังไม่เลือกรายการ";

fn session_mut(state: &mut AppState) -> Result<&mut MobileSession, HandlerErr> {
    state
        .mobile
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_session", "mobile session is not open"))
}

fn parse_status(raw: &str) -> Result<String, HandlerErr> {
    let s = raw.trim().to_ascii_uppercase();
    if ATTENDANCE_STATUSES.contains(&s.as_str()) {
        Ok(s)
    } else {
        Err(HandlerErr::bad_params(format!("unknown attendance status: {}", raw)))
    }
}

/// `{student: {item: score}}`. Anything else is dropped with a logged error.
pub fn parse_score_map(raw: Option<&Value>) -> HashMap<StudentId, HashMap<ItemId, f64>> {
    let mut out = HashMap::new();
    let Some(raw) = raw else {
        return out;
    };
    let Some(obj) = raw.as_object() else {
        error!("mobile score data is not an object; starting empty");
        return out;
    };
    for (student_key, items) in obj {
        let (Ok(student), Some(items)) = (student_key.trim().parse::<StudentId>(), items.as_object()) else {
            error!(student = %student_key, "malformed mobile score row; starting empty");
            return HashMap::new();
        };
        let mut row = HashMap::new();
        for (item_key, score) in items {
            if let (Ok(item), Some(v)) = (item_key.trim().parse::<ItemId>(), value_to_f64(score)) {
                row.insert(item, v);
            }
        }
        out.insert(student, row);
    }
    out
}

fn score_display(session: &MobileSession) -> Vec<Value> {
    session
        .students
        .iter()
        .map(|s| {
            let display = session
                .selected_item
                .and_then(|item| session.score(s.student_id, item))
                .map(format_score)
                .unwrap_or_else(|| "-".to_string());
            json!({
                "studentId": s.student_id,
                "display": display,
                "saveFailed": s.save_failed,
            })
        })
        .collect()
}

fn session_json(session: &MobileSession) -> Value {
    json!({
        "entryId": session.entry_id,
        "courseId": session.course_id,
        "date": session.date,
        "selectedItem": session.selected_item,
        "students": session.students,
        "scores": score_display(session),
    })
}

fn open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let entry_id = required_i64(&req.params, "entryId")?;
    let course_id = required_i64(&req.params, "courseId")?;
    let date = required_str(&req.params, "date")?;
    chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))?;

    let students = req
        .params
        .get("students")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params("missing students"))?
        .iter()
        .map(|s| {
            let student_id = required_i64(s, "studentId")?;
            Ok(MobileStudent {
                student_id,
                enrollment_id: optional_i64(s, "enrollmentId"),
                name: s.get("name").and_then(value_to_text).unwrap_or_default(),
                number: s.get("number").and_then(value_to_i64),
                status: s
                    .get("status")
                    .and_then(|v| v.as_str())
                    .and_then(|raw| parse_status(raw).ok()),
                group_id: optional_i64(s, "groupId"),
                save_failed: false,
            })
        })
        .collect::<Result<Vec<_>, HandlerErr>>()?;

    let session = MobileSession {
        entry_id,
        course_id,
        date,
        students,
        saved: parse_score_map(req.params.get("scores")),
        drafts: HashMap::new(),
        selected_item: None,
    };
    let out = session_json(&session);
    info!(entry_id, course_id, students = session.students.len(), "mobile session opened");
    state.mobile = Some(session);
    Ok(out)
}

fn select_item(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let item = optional_i64(&req.params, "itemId");
    let session = session_mut(state)?;
    session.selected_item = item;
    Ok(json!({ "selectedItem": item, "scores": score_display(session) }))
}

fn set_attendance(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student_id = save_id(&req.params, "studentId", "attendance")?;
    let raw = req.params.get("status").and_then(|v| v.as_str()).unwrap_or("");
    let status = parse_status(raw)?;
    let session = session_mut(state)?;
    let (entry, date) = (session.entry_id, session.date.clone());
    let card = session
        .student_mut(student_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("student {} is not in this class", student_id)))?;
    card.status = Some(status.clone());
    card.save_failed = false;
    let out = json!({ "studentId": student_id, "status": status });

    state.outbox.queue(
        SaveTarget::Attendance { entry, student: student_id },
        vec![SaveEntry::Attendance {
            student: student_id,
            entry,
            date,
            status,
        }],
        Instant::now(),
    );
    Ok(out)
}

fn set_all_attendance(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let raw = req.params.get("status").and_then(|v| v.as_str()).unwrap_or("");
    let status = parse_status(raw)?;
    let entry_id = session_mut(state)?.entry_id;
    api(state)?.save_attendance_bulk(entry_id, &status)?;
    let session = session_mut(state)?;
    for s in &mut session.students {
        s.status = Some(status.clone());
        s.save_failed = false;
    }
    Ok(json!({ "status": status, "students": session.students.len() }))
}

fn set_score(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student_id = save_id(&req.params, "studentId", "scores")?;
    let session = session_mut(state)?;
    let item = session
        .selected_item
        .ok_or_else(|| HandlerErr::bad_params(NO_ITEM_SELECTED))?;
    let score = score_input(req.params.get("score"))?;
    let course = session.course_id;
    let card = session
        .student_mut(student_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("student {} is not in this class", student_id)))?;
    card.save_failed = false;
    match score {
        Some(v) => {
            session.drafts.insert((student_id, item), v);
        }
        None => {
            session.drafts.remove(&(student_id, item));
            if let Some(row) = session.saved.get_mut(&student_id) {
                row.remove(&item);
            }
        }
    }
    let display = score.map(format_score).unwrap_or_else(|| "-".to_string());

    state.outbox.queue(
        SaveTarget::Scores { course },
        vec![SaveEntry::Score {
            student: student_id,
            item,
            score,
        }],
        Instant::now(),
    );
    Ok(json!({ "studentId": student_id, "itemId": item, "display": display }))
}

fn create_group(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let name = required_str(&req.params, "name")?;
    let course_id = match optional_i64(&req.params, "courseId") {
        Some(c) => c,
        None => session_mut(state)?.course_id,
    };
    let group = api(state)?.create_student_group(&name, course_id)?;
    info!(course_id, group_id = group.id, "student group created");
    Ok(json!({ "id": group.id, "name": group.name }))
}

fn assign_group(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let enrollment_id = required_i64(&req.params, "enrollmentId")?;
    let group_id = optional_i64(&req.params, "groupId");
    api(state)?.assign_group(&[enrollment_id], group_id)?;
    if let Some(session) = state.mobile.as_mut() {
        for s in session
            .students
            .iter_mut()
            .filter(|s| s.enrollment_id == Some(enrollment_id))
        {
            s.group_id = group_id;
        }
    }
    Ok(json!({ "enrollmentId": enrollment_id, "groupId": group_id }))
}

fn pick_student(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let seed = optional_i64(&req.params, "seed");
    let session = session_mut(state)?;
    let picked = match seed {
        Some(s) => session.students.choose(&mut StdRng::seed_from_u64(s as u64)),
        None => session.students.choose(&mut rand::thread_rng()),
    };
    match picked {
        Some(s) => Ok(json!({ "studentId": s.student_id, "name": s.name, "number": s.number })),
        None => Err(HandlerErr::new("not_found", "no students to pick from")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "mobile.open" => open(state, req),
        "mobile.view" => session_mut(state).map(|s| session_json(s)),
        "mobile.selectItem" => select_item(state, req),
        "mobile.setAttendance" => set_attendance(state, req),
        "mobile.setAllAttendance" => set_all_attendance(state, req),
        "mobile.setScore" => set_score(state, req),
        "mobile.createGroup" => create_group(state, req),
        "mobile.assignGroup" => assign_group(state, req),
        "mobile.pickStudent" => pick_student(state, req),
        "mobile.close" => {
            state.mobile = None;
            Ok(json!({ "closed": true }))
        }
        _ => return None,
    };
    Some(respond(&req.id, result))
}
