use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::api::types::PreviousPlan;
use crate::api::ServerApi;
use crate::calc::RatioTarget;
use crate::config::Config;
use crate::grouping::GroupDraft;
use crate::model::{Gradebook, ItemId, StudentId, UnitAssessment, UnitId};
use crate::outbox::Outbox;
use crate::propagate::ToggleBoard;

/// Undrained notifications kept for the shell; older ones are dropped first.
pub const MAX_NOTIFICATIONS: usize = 50;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Transient message for the shell to show, drained by `notifications.take`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: &'static str,
    pub message: String,
    pub target: Option<String>,
    pub at: String,
}

impl Notification {
    pub fn error(message: impl Into<String>, target: Option<String>) -> Self {
        Self {
            level: "error",
            message: message.into(),
            target,
            at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn success(message: impl Into<String>, target: Option<String>) -> Self {
        Self {
            level: "success",
            message: message.into(),
            target,
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// The gradebook tab: loaded table plus the toggles and unit filter applied to it.
pub struct GradebookSession {
    pub book: Gradebook,
    pub toggles: ToggleBoard,
    pub active_unit: Option<UnitId>,
    pub plan_id: Option<i64>,
}

pub struct PlanWorkspace {
    pub plan_id: i64,
    pub units: Vec<UnitAssessment>,
    /// `None` until the user stores a target; the panel then shows the default.
    pub ratio: Option<RatioTarget>,
}

pub struct ImportSession {
    pub subject_id: i64,
    pub target_year_id: i64,
    pub plans: Vec<PreviousPlan>,
    pub selected: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileStudent {
    pub student_id: StudentId,
    pub enrollment_id: Option<i64>,
    pub name: String,
    pub number: Option<i64>,
    pub status: Option<String>,
    pub group_id: Option<i64>,
    pub save_failed: bool,
}

pub struct MobileSession {
    pub entry_id: i64,
    pub course_id: i64,
    pub date: String,
    pub students: Vec<MobileStudent>,
    /// Scores the server has confirmed.
    pub saved: HashMap<StudentId, HashMap<ItemId, f64>>,
    /// Entered but not yet confirmed.
    pub drafts: HashMap<(StudentId, ItemId), f64>,
    pub selected_item: Option<ItemId>,
}

impl MobileSession {
    pub fn student_mut(&mut self, id: StudentId) -> Option<&mut MobileStudent> {
        self.students.iter_mut().find(|s| s.student_id == id)
    }

    pub fn score(&self, student: StudentId, item: ItemId) -> Option<f64> {
        self.drafts
            .get(&(student, item))
            .copied()
            .or_else(|| self.saved.get(&student).and_then(|m| m.get(&item)).copied())
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    pub api: Option<Arc<ServerApi>>,
    pub outbox: Outbox,
    pub in_flight: usize,
    pub notifications: Vec<Notification>,
    pub gradebook: Option<GradebookSession>,
    pub plan: Option<PlanWorkspace>,
    pub import: Option<ImportSession>,
    pub groups: Option<GroupDraft>,
    pub mobile: Option<MobileSession>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let api = ServerApi::from_config(&config).ok().map(Arc::new);
        Self {
            workspace: None,
            db: None,
            outbox: Outbox::new(config.save_windows),
            config,
            api,
            in_flight: 0,
            notifications: Vec::new(),
            gradebook: None,
            plan: None,
            import: None,
            groups: None,
            mobile: None,
        }
    }

    pub fn notify(&mut self, notification: Notification) {
        if self.notifications.len() >= MAX_NOTIFICATIONS {
            let excess = self.notifications.len() + 1 - MAX_NOTIFICATIONS;
            self.notifications.drain(..excess);
        }
        self.notifications.push(notification);
    }
}
