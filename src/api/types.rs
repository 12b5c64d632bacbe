use crate::model::{Alerts, StudentId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct PreviousPlan {
    pub plan_id: i64,
    #[serde(default)]
    pub year: Option<serde_json::Value>,
    #[serde(default)]
    pub teacher_names: Option<String>,
    #[serde(default)]
    pub has_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Enrollment {
    pub id: i64,
    pub student_id: StudentId,
    #[serde(default)]
    pub roll_number: Option<i64>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanGroup {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enrollments: Vec<i64>,
}

/// Group as posted back to the plan groups endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSubmission {
    pub id: String,
    pub name: String,
    pub members: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentGroup {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Server-side alert updates carried by a save response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReply {
    pub alerts: Vec<(StudentId, Alerts)>,
}

impl SaveReply {
    /// Reads `updated_alerts_map`, or `updated_alerts` when the batch wrote a single student.
    pub fn from_response(v: &serde_json::Value, students: &[StudentId]) -> Self {
        let mut alerts = Vec::new();
        if let Some(map) = v.get("updated_alerts_map").and_then(|m| m.as_object()) {
            for (key, value) in map {
                if let Ok(student) = key.trim().parse::<StudentId>() {
                    alerts.push((student, Alerts::from_value(value)));
                }
            }
        } else if let Some(value) = v.get("updated_alerts") {
            if let [only] = students {
                alerts.push((*only, Alerts::from_value(value)));
            }
        }
        SaveReply { alerts }
    }
}
