use crate::calc::{self, RowTotals};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

pub type StudentId = i64;
pub type ItemId = i64;
pub type TopicId = i64;
pub type UnitId = i64;
pub type GroupId = i64;

const DEFAULT_GRAND_MAX: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("gradebook payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Midterm,
    Final,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Midterm => "midterm",
            ExamType::Final => "final",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "midterm" => Some(ExamType::Midterm),
            "final" => Some(ExamType::Final),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedItem {
    pub id: ItemId,
    pub name: String,
    pub max_score: f64,
    pub unit_id: UnitId,
    pub is_group_assignment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitColumns {
    pub unit_id: UnitId,
    pub title: String,
    pub items: Vec<GradedItem>,
}

impl UnitColumns {
    pub fn max_total(&self) -> f64 {
        self.items.iter().map(|i| i.max_score).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RubricLevel {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubTopic {
    pub id: TopicId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MainTopic {
    pub id: TopicId,
    pub name: String,
    pub unit_id: Option<UnitId>,
    pub sub_topics: Vec<SubTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitativeTemplate {
    pub id: Option<i64>,
    pub name: String,
    pub rubrics: Vec<RubricLevel>,
    pub main_topics: Vec<MainTopic>,
}

impl QualitativeTemplate {
    pub fn accepts(&self, value: &str) -> bool {
        self.rubrics.iter().any(|r| r.value == value)
    }
}

/// How a qualitative cell relates to its main topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRole {
    /// Main topic that has sub-topics; its value is derived from them.
    Summary,
    Sub,
    /// Main topic without sub-topics.
    Standalone,
}

#[derive(Debug, Clone, Copy)]
pub struct TopicSlot<'a> {
    pub template: &'a QualitativeTemplate,
    pub main: &'a MainTopic,
    pub role: TopicRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertCode {
    Incomplete,
    Fail,
    MissingScores,
    Other(String),
}

impl AlertCode {
    pub fn parse(key: &str) -> Self {
        match key.trim() {
            "ร" => AlertCode::Incomplete,
            "0" | "ติด 0" => AlertCode::Fail,
            "กรอกคะแนน" => AlertCode::MissingScores,
            other => AlertCode::Other(other.to_string()),
        }
    }
}

/// Alert badges keyed by code, in server order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Alerts(pub IndexMap<String, String>);

impl Alerts {
    pub fn from_value(raw: &serde_json::Value) -> Self {
        let mut out = IndexMap::new();
        if let Some(obj) = raw.as_object() {
            for (k, v) in obj {
                out.insert(k.clone(), value_to_text(v).unwrap_or_default());
            }
        }
        Alerts(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = AlertCode> + '_ {
        self.0.keys().map(|k| AlertCode::parse(k))
    }

    pub fn has_incomplete(&self) -> bool {
        self.codes().any(|c| c == AlertCode::Incomplete)
    }

    pub fn has_fail(&self) -> bool {
        self.codes().any(|c| c == AlertCode::Fail)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRow {
    pub id: StudentId,
    pub roll_number: Option<i64>,
    pub student_code: Option<String>,
    pub name: String,
    pub group_ids: HashMap<UnitId, GroupId>,
    /// Group that applies to every unit when the server sends no per-unit map.
    pub default_group: Option<GroupId>,
    pub scores: HashMap<ItemId, Option<f64>>,
    pub qualitative: HashMap<TopicId, Option<String>>,
    pub midterm: Option<f64>,
    pub final_exam: Option<f64>,
    pub alerts: Alerts,
    pub totals: RowTotals,
}

impl StudentRow {
    pub fn score(&self, item: ItemId) -> Option<f64> {
        self.scores.get(&item).copied().flatten()
    }

    pub fn topic(&self, topic: TopicId) -> Option<&str> {
        self.qualitative.get(&topic).and_then(|v| v.as_deref())
    }

    pub fn exam(&self, exam: ExamType) -> Option<f64> {
        match exam {
            ExamType::Midterm => self.midterm,
            ExamType::Final => self.final_exam,
        }
    }

    pub fn set_exam(&mut self, exam: ExamType, value: Option<f64>) {
        match exam {
            ExamType::Midterm => self.midterm = value,
            ExamType::Final => self.final_exam = value,
        }
    }

    pub fn group_for(&self, unit: UnitId) -> Option<GroupId> {
        self.group_ids.get(&unit).copied().or(self.default_group)
    }

    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(n) = self.roll_number {
            parts.push(format!("{}.", n));
        }
        if let Some(code) = &self.student_code {
            parts.push(code.clone());
        }
        parts.push(self.name.clone());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSettings {
    pub midterm_enabled: bool,
    pub final_enabled: bool,
    pub midterm_max: f64,
    pub final_max: f64,
    pub grand_max: f64,
}

impl ExamSettings {
    pub fn enabled(&self, exam: ExamType) -> bool {
        match exam {
            ExamType::Midterm => self.midterm_enabled,
            ExamType::Final => self.final_enabled,
        }
    }

    pub fn max(&self, exam: ExamType) -> f64 {
        match exam {
            ExamType::Midterm => self.midterm_max,
            ExamType::Final => self.final_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: GroupId,
    pub name: String,
    pub unit_id: Option<UnitId>,
}

/// Gradebook table for one course/classroom, as fetched for a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradebook {
    pub course_id: i64,
    pub classroom_id: i64,
    pub units: Vec<UnitColumns>,
    pub templates: Vec<QualitativeTemplate>,
    pub rows: Vec<StudentRow>,
    pub exams: ExamSettings,
    pub groups: Vec<GroupInfo>,
}

impl Gradebook {
    pub fn from_json(
        course_id: i64,
        classroom_id: i64,
        raw: &serde_json::Value,
    ) -> Result<Self, ModelError> {
        let payload: GradebookPayload = serde_json::from_value(raw.clone())?;
        Ok(Self::from_payload(course_id, classroom_id, payload))
    }

    pub fn from_payload(course_id: i64, classroom_id: i64, payload: GradebookPayload) -> Self {
        let units = collect_units(&payload);
        let templates = payload
            .qualitative_assessment_data
            .iter()
            .map(template_from_payload)
            .collect::<Vec<_>>();
        let groups = payload
            .groups
            .iter()
            .map(|g| GroupInfo {
                id: g.id,
                name: g.name.clone(),
                unit_id: g.learning_unit_id,
            })
            .collect::<Vec<_>>();

        let mut numeric: HashMap<StudentId, HashMap<ItemId, Option<f64>>> = HashMap::new();
        let mut qualitative: HashMap<StudentId, HashMap<TopicId, Option<String>>> = HashMap::new();
        for (key, entry) in &payload.scores {
            match parse_score_key(key) {
                Some(ScoreKey::Item(sid, iid)) => {
                    let v = entry.score.as_ref().and_then(value_to_f64);
                    numeric.entry(sid).or_default().insert(iid, v);
                }
                Some(ScoreKey::Topic(sid, tid)) => {
                    let v = entry.score.as_ref().and_then(value_to_text);
                    qualitative.entry(sid).or_default().insert(tid, v);
                }
                None => warn!(key = %key, "skipping malformed score key"),
            }
        }

        let per_unit_groups = resolve_unit_groups(&payload, &groups);

        let exams = ExamSettings {
            midterm_enabled: payload.is_midterm_enabled,
            final_enabled: payload.is_final_enabled,
            midterm_max: payload.total_midterm_max_score.unwrap_or(0.0),
            final_max: payload.total_final_max_score.unwrap_or(0.0),
            grand_max: payload
                .grand_max_score
                .filter(|v| *v > 0.0)
                .unwrap_or(DEFAULT_GRAND_MAX),
        };

        let rows = payload
            .students
            .iter()
            .map(|s| {
                let name = format!(
                    "{}{} {}",
                    s.name_prefix.as_deref().unwrap_or(""),
                    s.first_name.as_deref().unwrap_or(""),
                    s.last_name.as_deref().unwrap_or("")
                )
                .trim()
                .to_string();
                StudentRow {
                    id: s.id,
                    roll_number: s.roll_number.as_ref().and_then(value_to_i64),
                    student_code: s.student_id.as_ref().and_then(value_to_text),
                    name,
                    group_ids: per_unit_groups.get(&s.id).cloned().unwrap_or_default(),
                    default_group: payload.student_group_map.get(&s.id.to_string()).copied(),
                    scores: numeric.remove(&s.id).unwrap_or_default(),
                    qualitative: qualitative.remove(&s.id).unwrap_or_default(),
                    midterm: s.midterm_score.as_ref().and_then(value_to_f64),
                    final_exam: s.final_score.as_ref().and_then(value_to_f64),
                    alerts: s.alerts.as_ref().map(Alerts::from_value).unwrap_or_default(),
                    totals: RowTotals::default(),
                }
            })
            .collect::<Vec<_>>();

        let mut book = Gradebook {
            course_id,
            classroom_id,
            units,
            templates,
            rows,
            exams,
            groups,
        };
        book.refresh_all_totals();
        book
    }

    pub fn row_index(&self, student: StudentId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == student)
    }

    pub fn row(&self, student: StudentId) -> Option<&StudentRow> {
        self.rows.iter().find(|r| r.id == student)
    }

    pub fn item(&self, id: ItemId) -> Option<&GradedItem> {
        self.units
            .iter()
            .flat_map(|u| u.items.iter())
            .find(|i| i.id == id)
    }

    pub fn first_unit_id(&self) -> Option<UnitId> {
        self.units.first().map(|u| u.unit_id)
    }

    pub fn has_unit(&self, unit: UnitId) -> bool {
        self.units.iter().any(|u| u.unit_id == unit)
            || self
                .templates
                .iter()
                .flat_map(|t| t.main_topics.iter())
                .any(|m| m.unit_id == Some(unit))
    }

    pub fn topic_slot(&self, topic: TopicId) -> Option<TopicSlot<'_>> {
        for template in &self.templates {
            for main in &template.main_topics {
                if main.id == topic {
                    let role = if main.sub_topics.is_empty() {
                        TopicRole::Standalone
                    } else {
                        TopicRole::Summary
                    };
                    return Some(TopicSlot { template, main, role });
                }
                if main.sub_topics.iter().any(|s| s.id == topic) {
                    return Some(TopicSlot {
                        template,
                        main,
                        role: TopicRole::Sub,
                    });
                }
            }
        }
        None
    }

    pub fn refresh_totals(&mut self, idx: usize) {
        let totals = match self.rows.get(idx) {
            Some(row) => calc::row_totals(row, &self.units, &self.exams),
            None => return,
        };
        self.rows[idx].totals = totals;
    }

    pub fn refresh_all_totals(&mut self) {
        for idx in 0..self.rows.len() {
            self.refresh_totals(idx);
        }
    }

    /// Replaces a student's alert set with the server's; returns false for unknown students.
    pub fn apply_alerts(&mut self, student: StudentId, alerts: Alerts) -> bool {
        let Some(idx) = self.row_index(student) else {
            return false;
        };
        self.rows[idx].alerts = alerts;
        self.refresh_totals(idx);
        true
    }
}

/// Per-unit assessment setup shown in the plan workspace summary panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAssessment {
    pub unit_id: UnitId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub hours: i64,
    #[serde(default)]
    pub collected_max: f64,
    #[serde(default)]
    pub midterm: ExamSlot,
    #[serde(default, rename = "final")]
    pub final_exam: ExamSlot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamSlot {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub score: Option<f64>,
}

impl ExamSlot {
    /// Disabled slots never carry a value.
    pub fn normalized(self) -> Self {
        if self.enabled {
            self
        } else {
            ExamSlot {
                enabled: false,
                score: None,
            }
        }
    }

    pub fn effective(&self) -> f64 {
        if self.enabled {
            self.score.unwrap_or(0.0)
        } else {
            0.0
        }
    }
}

// ---- server payload ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradebookPayload {
    #[serde(default)]
    pub students: Vec<StudentPayload>,
    #[serde(default)]
    pub units_data: Vec<UnitPayload>,
    #[serde(default)]
    pub grouped_graded_items: IndexMap<String, Vec<ItemPayload>>,
    #[serde(default)]
    pub scores: HashMap<String, ScorePayload>,
    #[serde(default)]
    pub student_group_map: HashMap<String, GroupId>,
    #[serde(default)]
    pub unit_group_map: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub groups: Vec<GroupPayload>,
    #[serde(default)]
    pub qualitative_assessment_data: Vec<TemplatePayload>,
    #[serde(default)]
    pub is_midterm_enabled: bool,
    #[serde(default)]
    pub is_final_enabled: bool,
    #[serde(default)]
    pub grand_max_score: Option<f64>,
    #[serde(default)]
    pub total_midterm_max_score: Option<f64>,
    #[serde(default)]
    pub total_final_max_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentPayload {
    pub id: StudentId,
    #[serde(default)]
    pub roll_number: Option<serde_json::Value>,
    #[serde(default)]
    pub student_id: Option<serde_json::Value>,
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub midterm_score: Option<serde_json::Value>,
    #[serde(default)]
    pub final_score: Option<serde_json::Value>,
    #[serde(default)]
    pub alerts: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitPayload {
    pub unit_id: UnitId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPayload {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub max_score: Option<f64>,
    pub learning_unit_id: UnitId,
    #[serde(default)]
    pub is_group_assignment: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScorePayload {
    #[serde(default)]
    pub score: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupPayload {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub learning_unit_id: Option<UnitId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatePayload {
    #[serde(default)]
    pub template_id: Option<i64>,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub rubrics: Vec<RubricPayload>,
    #[serde(default)]
    pub main_topics: Vec<MainTopicPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RubricPayload {
    #[serde(default)]
    pub label: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainTopicPayload {
    pub main_topic_id: TopicId,
    #[serde(default)]
    pub main_topic_name: String,
    #[serde(default)]
    pub learning_unit_id: Option<UnitId>,
    #[serde(default)]
    pub selected_sub_topics: Vec<SubTopicPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubTopicPayload {
    pub id: TopicId,
    #[serde(default)]
    pub name: String,
}

fn item_from_payload(p: &ItemPayload) -> GradedItem {
    GradedItem {
        id: p.id,
        name: p.name.clone(),
        max_score: p.max_score.unwrap_or(0.0),
        unit_id: p.learning_unit_id,
        is_group_assignment: p.is_group_assignment,
    }
}

fn collect_units(payload: &GradebookPayload) -> Vec<UnitColumns> {
    if !payload.units_data.is_empty() {
        return payload
            .units_data
            .iter()
            .filter(|u| !u.items.is_empty())
            .map(|u| UnitColumns {
                unit_id: u.unit_id,
                title: u.title.clone(),
                items: u.items.iter().map(item_from_payload).collect(),
            })
            .collect();
    }
    payload
        .grouped_graded_items
        .iter()
        .filter_map(|(title, items)| {
            let first = items.first()?;
            Some(UnitColumns {
                unit_id: first.learning_unit_id,
                title: title.clone(),
                items: items.iter().map(item_from_payload).collect(),
            })
        })
        .collect()
}

fn template_from_payload(t: &TemplatePayload) -> QualitativeTemplate {
    QualitativeTemplate {
        id: t.template_id,
        name: t.template_name.clone(),
        rubrics: t
            .rubrics
            .iter()
            .filter_map(|r| {
                Some(RubricLevel {
                    label: r.label.clone(),
                    value: value_to_text(&r.value)?,
                })
            })
            .collect(),
        main_topics: t
            .main_topics
            .iter()
            .map(|m| MainTopic {
                id: m.main_topic_id,
                name: m.main_topic_name.clone(),
                unit_id: m.learning_unit_id,
                sub_topics: m
                    .selected_sub_topics
                    .iter()
                    .map(|s| SubTopic {
                        id: s.id,
                        name: s.name.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn resolve_unit_groups(
    payload: &GradebookPayload,
    groups: &[GroupInfo],
) -> HashMap<StudentId, HashMap<UnitId, GroupId>> {
    let mut out: HashMap<StudentId, HashMap<UnitId, GroupId>> = HashMap::new();
    for (unit_key, members) in &payload.unit_group_map {
        let Ok(unit) = unit_key.trim().parse::<UnitId>() else {
            warn!(unit = %unit_key, "skipping group map for malformed unit id");
            continue;
        };
        for (student_key, group_name) in members {
            let Ok(student) = student_key.trim().parse::<StudentId>() else {
                continue;
            };
            let found = groups
                .iter()
                .find(|g| g.name == *group_name && g.unit_id == Some(unit));
            if let Some(g) = found {
                out.entry(student).or_default().insert(unit, g.id);
            }
        }
    }
    out
}

enum ScoreKey {
    Item(StudentId, ItemId),
    Topic(StudentId, TopicId),
}

fn parse_score_key(key: &str) -> Option<ScoreKey> {
    let (student, rest) = key.split_once('-')?;
    let student = student.trim().parse::<StudentId>().ok()?;
    if let Some(topic) = rest.strip_prefix("q-") {
        return Some(ScoreKey::Topic(student, topic.trim().parse().ok()?));
    }
    Some(ScoreKey::Item(student, rest.trim().parse().ok()?))
}

pub fn value_to_f64(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn value_to_i64(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Text form of a categorical value; integral numbers render without a fraction.
pub fn value_to_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i.to_string());
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", f as i64))
            } else {
                Some(f.to_string())
            }
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    /// Two units, a qualitative template with one summarized and one standalone topic,
    /// three students split over two groups in unit 10.
    pub fn gradebook_json() -> serde_json::Value {
        json!({
            "students": [
                {"id": 1, "roll_number": 1, "student_id": "S001", "first_name": "Anan", "last_name": "K",
                 "midterm_score": 15, "final_score": null, "alerts": {}},
                {"id": 2, "roll_number": 2, "student_id": "S002", "first_name": "Bua", "last_name": "P",
                 "midterm_score": null, "final_score": null, "alerts": {"ร": "ขาดส่งงาน"}},
                {"id": 3, "roll_number": 3, "student_id": "S003", "name_prefix": "ด.ญ.", "first_name": "Chai", "last_name": "T",
                 "midterm_score": "10", "final_score": 20, "alerts": {"กรอกคะแนน": "ยังไม่ครบ"}}
            ],
            "units_data": [
                {"unit_id": 10, "title": "Unit A", "items": [
                    {"id": 100, "name": "Quiz", "max_score": 10, "learning_unit_id": 10, "is_group_assignment": false},
                    {"id": 101, "name": "Project", "max_score": 20, "learning_unit_id": 10, "is_group_assignment": true}
                ]},
                {"unit_id": 20, "title": "Unit B", "items": [
                    {"id": 200, "name": "Lab", "max_score": null, "learning_unit_id": 20}
                ]}
            ],
            "scores": {
                "1-100": {"score": 8},
                "1-101": {"score": 15.5},
                "2-100": {"score": null},
                "3-200": {"score": "4"},
                "1-q-501": {"score": 3},
                "garbage": {"score": 1}
            },
            "groups": [
                {"id": 7, "name": "Red", "learning_unit_id": 10},
                {"id": 8, "name": "Blue", "learning_unit_id": 10}
            ],
            "unit_group_map": {
                "10": {"1": "Red", "2": "Red", "3": "Blue"}
            },
            "qualitative_assessment_data": [
                {"template_id": 1, "template_name": "Desirable traits",
                 "rubrics": [{"label": "ดีเยี่ยม", "value": 3}, {"label": "ดี", "value": 2}, {"label": "ผ่าน", "value": 1}],
                 "main_topics": [
                    {"main_topic_id": 500, "main_topic_name": "Discipline", "learning_unit_id": 10,
                     "selected_sub_topics": [{"id": 501, "name": "On time"}, {"id": 502, "name": "Uniform"}, {"id": 503, "name": "Homework"}]},
                    {"main_topic_id": 600, "main_topic_name": "Reading", "learning_unit_id": 20, "selected_sub_topics": []}
                 ]}
            ],
            "is_midterm_enabled": true,
            "is_final_enabled": true,
            "grand_max_score": 100,
            "total_midterm_max_score": 20,
            "total_final_max_score": 30
        })
    }
}
