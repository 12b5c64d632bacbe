mod http;
pub mod types;

pub use http::HttpTransport;

use crate::calc::RatioTarget;
use crate::config::Config;
use crate::model::value_to_i64;
use crate::outbox::{PendingBatch, SaveEntry, SaveTarget};
use serde_json::{json, Value};
use types::{Enrollment, GroupSubmission, PlanGroup, PreviousPlan, SaveReply, StudentGroup};

pub const API_PREFIX: &str = "/teacher/api";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("server reported an error: {message}")]
    Server { message: String },

    #[error("response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no server configured")]
    NotConfigured,
}

impl ApiError {
    /// Best human-readable message, preferring the server's own `message` field.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { body, status } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| server_message(&v))
                .unwrap_or_else(|| format!("server returned {}", status)),
            ApiError::Server { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Moves one request to the server and hands back the raw body of a 2xx response.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, ApiError>;
}

/// Typed client for the teacher API.
pub struct ServerApi {
    transport: Box<dyn Transport>,
}

impl ServerApi {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        let base = cfg.server_url.as_deref().ok_or(ApiError::NotConfigured)?;
        let transport = HttpTransport::new(
            base,
            cfg.csrf_token.clone(),
            cfg.session_cookie.clone(),
            cfg.http_timeout,
        )?;
        Ok(Self::new(Box::new(transport)))
    }

    /// JSON call under the API prefix. A body with `"status": "error"` is an error.
    pub fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let full = format!("{}{}", API_PREFIX, path);
        self.call_raw_path(method, &full, query, body)
    }

    fn call_raw_path(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let raw = self.transport.send(method, path, query, body)?;
        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }
        let v: Value = serde_json::from_str(&raw)?;
        if v.get("status").and_then(|s| s.as_str()) == Some("error") {
            return Err(ApiError::Server {
                message: server_message(&v).unwrap_or_else(|| "unknown server error".to_string()),
            });
        }
        Ok(v)
    }

    /// Text (HTML partial) call under the API prefix.
    pub fn text(&self, path: &str) -> Result<String, ApiError> {
        let full = format!("{}{}", API_PREFIX, path);
        self.transport.send(Method::Get, &full, &[], None)
    }

    pub fn previous_plans(
        &self,
        subject_id: i64,
        target_year_id: i64,
    ) -> Result<Vec<PreviousPlan>, ApiError> {
        let v = self.call(
            Method::Get,
            &format!("/subject/{}/previous-plans", subject_id),
            &[("target_year_id", target_year_id.to_string())],
            None,
        )?;
        Ok(serde_json::from_value(v)?)
    }

    pub fn teaching_logs(&self, plan_id: i64) -> Result<String, ApiError> {
        self.text(&format!("/plan/{}/teaching-logs", plan_id))
    }

    /// Imports `source_plan_id` into the target year, or creates a blank plan. Returns the new plan id.
    pub fn import_plan(
        &self,
        subject_id: i64,
        target_year_id: i64,
        source_plan_id: Option<i64>,
    ) -> Result<i64, ApiError> {
        let body = json!({
            "subject_id": subject_id,
            "target_academic_year_id": target_year_id,
            "source_plan_id": source_plan_id,
        });
        let v = self.call(Method::Post, "/lesson-plan/import", &[], Some(&body))?;
        ensure_success(&v)?;
        v.get("new_plan_id")
            .and_then(value_to_i64)
            .ok_or_else(|| ApiError::Server {
                message: "import response carried no new_plan_id".to_string(),
            })
    }

    pub fn gradebook_data(&self, course_id: i64, classroom_id: i64) -> Result<Value, ApiError> {
        self.call(
            Method::Get,
            &format!("/course/{}/gradebook-data", course_id),
            &[("classroom_id", classroom_id.to_string())],
            None,
        )
    }

    pub fn classroom_enrollments(&self, classroom_id: i64) -> Result<Vec<Enrollment>, ApiError> {
        let v = self.call(
            Method::Get,
            &format!("/classrooms/{}/enrollments", classroom_id),
            &[],
            None,
        )?;
        Ok(serde_json::from_value(v)?)
    }

    pub fn plan_groups(
        &self,
        plan_id: i64,
        unit_id: i64,
        course_id: i64,
    ) -> Result<Vec<PlanGroup>, ApiError> {
        let v = self.call(
            Method::Get,
            &format!("/plan/{}/groups", plan_id),
            &[
                ("unit_id", unit_id.to_string()),
                ("course_id", course_id.to_string()),
            ],
            None,
        )?;
        Ok(serde_json::from_value(v)?)
    }

    pub fn save_plan_groups(
        &self,
        plan_id: i64,
        unit_id: i64,
        course_id: i64,
        groups: &[GroupSubmission],
    ) -> Result<(), ApiError> {
        let body = json!({ "groups": groups, "course_id": course_id });
        let v = self.call(
            Method::Post,
            &format!("/plan/{}/groups", plan_id),
            &[("unit_id", unit_id.to_string())],
            Some(&body),
        )?;
        ensure_success(&v)
    }

    /// `None` when the plan has no target stored.
    pub fn ratio_target(&self, plan_id: i64) -> Result<Option<RatioTarget>, ApiError> {
        let v = self.call(Method::Get, &format!("/plan/{}/ratio-target", plan_id), &[], None)?;
        let mid = v.get("mid_ratio").and_then(value_to_i64);
        let fin = v.get("final_ratio").and_then(value_to_i64);
        Ok(match (mid, fin) {
            (Some(m), Some(f)) => RatioTarget::new(m, f).ok(),
            _ => None,
        })
    }

    pub fn save_ratio_target(&self, plan_id: i64, target: RatioTarget) -> Result<(), ApiError> {
        let body = json!({ "mid_ratio": target.mid, "final_ratio": target.final_ratio });
        self.call(
            Method::Post,
            &format!("/plan/{}/ratio-target", plan_id),
            &[],
            Some(&body),
        )?;
        Ok(())
    }

    pub fn delete_ratio_target(&self, plan_id: i64) -> Result<(), ApiError> {
        self.call(Method::Delete, &format!("/plan/{}/ratio-target", plan_id), &[], None)?;
        Ok(())
    }

    pub fn create_student_group(&self, name: &str, course_id: i64) -> Result<StudentGroup, ApiError> {
        let body = json!({ "name": name, "course_id": course_id });
        let v = self.call(Method::Post, "/student-groups", &[], Some(&body))?;
        if v.get("success").and_then(|s| s.as_bool()) == Some(false) {
            return Err(ApiError::Server {
                message: v
                    .get("error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("group was not created")
                    .to_string(),
            });
        }
        Ok(serde_json::from_value(v)?)
    }

    pub fn assign_group(&self, enrollment_ids: &[i64], group_id: Option<i64>) -> Result<(), ApiError> {
        let body = json!({ "enrollment_ids": enrollment_ids, "group_id": group_id });
        let v = self.call(Method::Post, "/enrollments/assign-group", &[], Some(&body))?;
        ensure_success(&v)
    }

    /// Marks every student of the entry's classroom with one status.
    pub fn save_attendance_bulk(&self, entry_id: i64, status: &str) -> Result<(), ApiError> {
        let body = json!({ "entry_id": entry_id, "status": status });
        let v = self.call(Method::Post, "/attendance/save-bulk", &[], Some(&body))?;
        ensure_success(&v)
    }

    pub fn search_indicators(&self, query: &str) -> Result<Value, ApiError> {
        self.call_raw_path(
            Method::Get,
            "/teacher/search-indicators",
            &[("q", query.to_string())],
            None,
        )
    }

    /// Sends one flushed outbox batch to its endpoint.
    pub fn send_batch(&self, batch: &PendingBatch) -> Result<SaveReply, ApiError> {
        let (path, body) = batch_request(batch).ok_or_else(|| ApiError::Server {
            message: format!("nothing to send for {}", batch.target.label()),
        })?;
        let v = self.call(Method::Post, &path, &[], Some(&body))?;
        ensure_success(&v)?;
        Ok(SaveReply::from_response(&v, &batch.students()))
    }
}

fn server_message(v: &Value) -> Option<String> {
    v.get("message")
        .or_else(|| v.get("error"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

fn ensure_success(v: &Value) -> Result<(), ApiError> {
    match v.get("status").and_then(|s| s.as_str()) {
        Some("success") => Ok(()),
        _ => Err(ApiError::Server {
            message: server_message(v).unwrap_or_else(|| "server did not confirm the save".to_string()),
        }),
    }
}

/// Endpoint path and JSON body for a batch; `None` for an empty batch.
pub fn batch_request(batch: &PendingBatch) -> Option<(String, Value)> {
    match batch.target {
        SaveTarget::Scores { course } => {
            let scores: Vec<Value> = batch
                .entries
                .iter()
                .filter_map(|e| match e {
                    SaveEntry::Score {
                        student,
                        item,
                        score,
                    } => Some(json!({
                        "student_id": student,
                        "graded_item_id": item,
                        "score": score,
                    })),
                    _ => None,
                })
                .collect();
            non_empty(scores).map(|s| {
                (
                    "/scores/save-bulk".to_string(),
                    json!({ "scores": s, "course_id": course }),
                )
            })
        }
        SaveTarget::Qualitative { course } => {
            let scores: Vec<Value> = batch
                .entries
                .iter()
                .filter_map(|e| match e {
                    SaveEntry::Qualitative {
                        student,
                        topic,
                        value,
                    } => Some(json!({
                        "student_id": student,
                        "topic_id": topic,
                        "score": value,
                    })),
                    _ => None,
                })
                .collect();
            non_empty(scores).map(|s| {
                (
                    "/qualitative-scores/save-bulk".to_string(),
                    json!({ "scores": s, "course_id": course }),
                )
            })
        }
        SaveTarget::ExamScores { course } => {
            let scores: Vec<Value> = batch
                .entries
                .iter()
                .filter_map(|e| match e {
                    SaveEntry::Exam {
                        student,
                        exam,
                        score,
                    } => Some(json!({
                        "student_id": student,
                        "exam_type": exam.as_str(),
                        "score": score,
                    })),
                    _ => None,
                })
                .collect();
            non_empty(scores).map(|s| {
                (
                    "/enrollments/save-exam-score-bulk".to_string(),
                    json!({ "scores": s, "course_id": course }),
                )
            })
        }
        SaveTarget::Attendance { .. } => batch.entries.iter().rev().find_map(|e| match e {
            SaveEntry::Attendance {
                student,
                entry,
                date,
                status,
            } => Some((
                "/attendance/save".to_string(),
                json!({
                    "student_id": student,
                    "entry_id": entry,
                    "date": date,
                    "status": status,
                }),
            )),
            _ => None,
        }),
        SaveTarget::UnitHours { unit } => batch.entries.iter().rev().find_map(|e| match e {
            SaveEntry::UnitHours { hours } => {
                Some((format!("/units/{}/hours", unit), json!({ "hours": hours })))
            }
            _ => None,
        }),
        SaveTarget::UnitExamScores { unit } => batch.entries.iter().rev().find_map(|e| match e {
            SaveEntry::UnitExamScores {
                midterm,
                final_score,
            } => Some((
                format!("/units/{}/exam-scores", unit),
                json!({ "midterm_score": midterm, "final_score": final_score }),
            )),
            _ => None,
        }),
    }
}

fn non_empty(v: Vec<Value>) -> Option<Vec<Value>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub struct Recorded {
        pub method: Method,
        pub path: String,
        pub query: Vec<(String, String)>,
        pub body: Option<Value>,
    }

    /// Replays canned responses in order and records every request.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        pub requests: Arc<Mutex<Vec<Recorded>>>,
        pub responses: Arc<Mutex<VecDeque<Result<String, (u16, String)>>>>,
    }

    impl FakeTransport {
        pub fn reply(&self, body: Value) -> &Self {
            self.responses
                .lock()
                .expect("lock")
                .push_back(Ok(body.to_string()));
            self
        }

        pub fn fail(&self, status: u16, body: &str) -> &Self {
            self.responses
                .lock()
                .expect("lock")
                .push_back(Err((status, body.to_string())));
            self
        }

        pub fn recorded(&self) -> Vec<Recorded> {
            self.requests.lock().expect("lock").clone()
        }
    }

    impl Transport for FakeTransport {
        fn send(
            &self,
            method: Method,
            path: &str,
            query: &[(&str, String)],
            body: Option<&Value>,
        ) -> Result<String, ApiError> {
            self.requests.lock().expect("lock").push(Recorded {
                method,
                path: path.to_string(),
                query: query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                body: body.cloned(),
            });
            match self.responses.lock().expect("lock").pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err((status, body))) => Err(ApiError::Status { status, body }),
                None => Ok("{}".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTransport;
    use super::*;
    use crate::config::SaveWindows;
    use crate::model::ExamType;
    use crate::outbox::Outbox;
    use std::time::Instant;

    fn api() -> (ServerApi, FakeTransport) {
        let fake = FakeTransport::default();
        (ServerApi::new(Box::new(fake.clone())), fake)
    }

    fn batch(target: SaveTarget, entries: Vec<SaveEntry>) -> PendingBatch {
        let mut ob = Outbox::new(SaveWindows::default());
        ob.queue(target, entries, Instant::now());
        ob.take_all().remove(0)
    }

    #[test]
    fn score_batch_posts_bulk_body_and_reads_alerts() {
        let (api, fake) = api();
        fake.reply(json!({"status": "success", "updated_alerts_map": {"1": {"0": "x"}}}));
        let b = batch(
            SaveTarget::Scores { course: 42 },
            vec![
                SaveEntry::Score { student: 1, item: 100, score: Some(5.0) },
                SaveEntry::Score { student: 2, item: 100, score: None },
            ],
        );
        let reply = api.send_batch(&b).expect("save");
        assert_eq!(reply.alerts.len(), 1);

        let req = &fake.recorded()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "/teacher/api/scores/save-bulk");
        let body = req.body.clone().expect("body");
        assert_eq!(body["course_id"], 42);
        assert_eq!(body["scores"][0]["graded_item_id"], 100);
        assert!(body["scores"][1]["score"].is_null());
    }

    #[test]
    fn exam_and_unit_batches_use_their_endpoints() {
        let b = batch(
            SaveTarget::ExamScores { course: 1 },
            vec![SaveEntry::Exam { student: 3, exam: ExamType::Final, score: Some(20.0) }],
        );
        let (path, body) = batch_request(&b).expect("request");
        assert_eq!(path, "/enrollments/save-exam-score-bulk");
        assert_eq!(body["scores"][0]["exam_type"], "final");

        let b = batch(
            SaveTarget::UnitExamScores { unit: 8 },
            vec![SaveEntry::UnitExamScores { midterm: Some(20.0), final_score: None }],
        );
        let (path, body) = batch_request(&b).expect("request");
        assert_eq!(path, "/units/8/exam-scores");
        assert!(body["final_score"].is_null());
    }

    #[test]
    fn error_status_in_body_is_a_server_error() {
        let (api, fake) = api();
        fake.reply(json!({"status": "error", "message": "จำนวนคาบไม่ถูกต้อง"}));
        let b = batch(SaveTarget::UnitHours { unit: 2 }, vec![SaveEntry::UnitHours { hours: 3 }]);
        let err = api.send_batch(&b).expect_err("should fail");
        assert_eq!(err.user_message(), "จำนวนคาบไม่ถูกต้อง");
    }

    #[test]
    fn http_failure_surfaces_server_message() {
        let (api, fake) = api();
        fake.fail(400, r#"{"status":"error","message":"ข้อมูลไม่ครบถ้วน"}"#);
        let err = api.import_plan(1, 2, None).expect_err("should fail");
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
        assert_eq!(err.user_message(), "ข้อมูลไม่ครบถ้วน");
    }

    #[test]
    fn import_returns_new_plan_id() {
        let (api, fake) = api();
        fake.reply(json!({"status": "success", "new_plan_id": 77}));
        assert_eq!(api.import_plan(5, 6, Some(3)).expect("import"), 77);
        let body = fake.recorded()[0].body.clone().expect("body");
        assert_eq!(body["source_plan_id"], 3);
        assert_eq!(body["target_academic_year_id"], 6);
    }

    #[test]
    fn ratio_target_with_nulls_is_unset() {
        let (api, fake) = api();
        fake.reply(json!({"mid_ratio": null, "final_ratio": null}));
        fake.reply(json!({"mid_ratio": 70, "final_ratio": 30}));
        assert_eq!(api.ratio_target(1).expect("load"), None);
        assert_eq!(
            api.ratio_target(1).expect("load"),
            Some(RatioTarget { mid: 70, final_ratio: 30 })
        );
    }

    #[test]
    fn plan_groups_query_carries_unit_and_course() {
        let (api, fake) = api();
        fake.reply(json!([{"id": 1, "name": "A", "enrollments": [10, 11]}]));
        let groups = api.plan_groups(5, 6, 7).expect("groups");
        assert_eq!(groups[0].enrollments, vec![10, 11]);
        let req = &fake.recorded()[0];
        assert_eq!(req.path, "/teacher/api/plan/5/groups");
        assert_eq!(
            req.query,
            vec![("unit_id".to_string(), "6".to_string()), ("course_id".to_string(), "7".to_string())]
        );
    }
}
