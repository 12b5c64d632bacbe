use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::types::SaveReply;
use crate::api::{batch_request, ApiError};
use crate::db::{self, JournalEntry};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{optional_i64, respond};
use crate::ipc::types::{AppState, Notification, Request};
use crate::outbox::{PendingBatch, SaveEntry, SaveTarget};

const SAVE_FAILED: &str = "บันทึกข้อมูลไม่สำเร็จ";
const DEFAULT_HISTORY_LIMIT: i64 = 50;

fn journal(state: &AppState, batch: &PendingBatch, error: Option<&str>) {
    let Some(conn) = state.db.as_ref() else {
        debug!(save = %batch.target.label(), "no workspace; save not journaled");
        return;
    };
    let entry = JournalEntry {
        id: uuid::Uuid::new_v4().to_string(),
        target: batch.target.label(),
        kind: batch.target.kind().to_string(),
        entries: batch.entries.len() as i64,
        payload: batch_request(batch).map(|(_, body)| body),
        status: if error.is_some() { "failed" } else { "ok" }.to_string(),
        error: error.map(str::to_string),
        queued_at: batch.queued_at.clone(),
        completed_at: chrono::Utc::now().to_rfc3339(),
    };
    if let Err(e) = db::journal_insert(conn, &entry) {
        warn!(error = %e, "failed to journal save outcome");
    }
}

fn mobile_saved(state: &mut AppState, batch: &PendingBatch) {
    let Some(session) = state.mobile.as_mut() else {
        return;
    };
    if batch.target != (SaveTarget::Scores { course: session.course_id }) {
        return;
    }
    for e in &batch.entries {
        if let SaveEntry::Score { student, item, score } = e {
            // A newer draft entered while this batch was in flight stays a draft.
            let draft = session.drafts.get(&(*student, *item)).copied();
            if draft == *score {
                session.drafts.remove(&(*student, *item));
            }
            if let Some(v) = score {
                session.saved.entry(*student).or_default().insert(*item, *v);
            }
        }
    }
}

fn mobile_failed(state: &mut AppState, batch: &PendingBatch) {
    let Some(session) = state.mobile.as_mut() else {
        return;
    };
    let relevant = match batch.target {
        SaveTarget::Scores { course } => course == session.course_id,
        SaveTarget::Attendance { entry, .. } => entry == session.entry_id,
        _ => false,
    };
    if !relevant {
        return;
    }
    let students = batch.students();
    for card in session
        .students
        .iter_mut()
        .filter(|s| students.contains(&s.student_id))
    {
        card.save_failed = true;
    }
}

/// Applies the outcome of one sent batch. Local values are never rolled back.
pub fn complete_save(state: &mut AppState, batch: PendingBatch, result: Result<SaveReply, ApiError>) -> Value {
    let label = batch.target.label();
    match result {
        Ok(reply) => {
            let mut updated = 0;
            if let Some(session) = state.gradebook.as_mut() {
                for (student, alerts) in reply.alerts {
                    if session.book.apply_alerts(student, alerts) {
                        updated += 1;
                    }
                }
            }
            mobile_saved(state, &batch);
            journal(state, &batch, None);
            info!(save = %label, entries = batch.entries.len(), alerts = updated, "save completed");
            json!({ "target": label, "kind": batch.target.kind(), "ok": true, "alertsUpdated": updated })
        }
        Err(e) => {
            let message = e.user_message();
            warn!(save = %label, error = %message, "save failed");
            mobile_failed(state, &batch);
            journal(state, &batch, Some(&message));
            state.notify(Notification::error(format!("{}: {}", SAVE_FAILED, message), Some(label.clone())));
            json!({ "target": label, "kind": batch.target.kind(), "ok": false, "error": message })
        }
    }
}

fn flush(state: &mut AppState) -> Result<Value, HandlerErr> {
    let batches = state.outbox.take_all();
    let api = state.api.clone();
    let mut outcomes = Vec::with_capacity(batches.len());
    for batch in batches {
        let result = match api.as_ref() {
            Some(api) => api.send_batch(&batch),
            None => Err(ApiError::NotConfigured),
        };
        outcomes.push(complete_save(state, batch, result));
    }
    Ok(json!({ "outcomes": outcomes }))
}

fn pending(state: &AppState) -> Value {
    json!({
        "pending": state.outbox.pending(Instant::now()),
        "inFlight": state.in_flight,
    })
}

fn history(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let limit = optional_i64(&req.params, "limit")
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, 500);
    let entries = db::journal_recent(conn, limit)?;
    Ok(json!({ "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "saves.flush" => flush(state),
        "saves.pending" => Ok(pending(state)),
        "saves.history" => history(state, req),
        "notifications.take" => Ok(json!({
            "notifications": std::mem::take(&mut state.notifications),
        })),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ipc::types::{MobileSession, MobileStudent, MAX_NOTIFICATIONS};
    use crate::outbox::Outbox;
    use std::collections::HashMap;

    fn state_with_mobile() -> AppState {
        let mut state = AppState::new(Config::default());
        state.mobile = Some(MobileSession {
            entry_id: 9,
            course_id: 4,
            date: "2024-06-01".into(),
            students: vec![MobileStudent {
                student_id: 1,
                enrollment_id: Some(11),
                name: "A".into(),
                number: Some(1),
                status: None,
                group_id: None,
                save_failed: false,
            }],
            saved: HashMap::new(),
            drafts: HashMap::from([((1, 100), 7.0)]),
            selected_item: Some(100),
        });
        state
    }

    fn score_batch() -> PendingBatch {
        let mut ob = Outbox::new(Default::default());
        ob.queue(
            SaveTarget::Scores { course: 4 },
            vec![SaveEntry::Score { student: 1, item: 100, score: Some(7.0) }],
            Instant::now(),
        );
        ob.take_all().remove(0)
    }

    #[test]
    fn failure_flags_card_and_notifies() {
        let mut state = state_with_mobile();
        let out = complete_save(
            &mut state,
            score_batch(),
            Err(ApiError::Status { status: 500, body: "{}".into() }),
        );
        assert_eq!(out["ok"], false);
        let session = state.mobile.as_ref().expect("session");
        assert!(session.students[0].save_failed);
        assert_eq!(session.score(1, 100), Some(7.0));
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.notifications[0].level, "error");
    }

    #[test]
    fn repeated_failures_do_not_grow_notifications_without_bound() {
        let mut state = state_with_mobile();
        for _ in 0..MAX_NOTIFICATIONS + 3 {
            let _ = complete_save(
                &mut state,
                score_batch(),
                Err(ApiError::Status { status: 500, body: "{}".into() }),
            );
        }
        assert_eq!(state.notifications.len(), MAX_NOTIFICATIONS);
    }

    #[test]
    fn success_moves_draft_into_saved() {
        let mut state = state_with_mobile();
        let out = complete_save(&mut state, score_batch(), Ok(SaveReply::default()));
        assert_eq!(out["ok"], true);
        let session = state.mobile.as_ref().expect("session");
        assert!(session.drafts.is_empty());
        assert_eq!(session.saved[&1][&100], 7.0);
        assert!(state.notifications.is_empty());
    }
}
