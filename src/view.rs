use crate::calc::{format_percentage, format_score};
use crate::model::{AlertCode, Alerts, ExamType, Gradebook, RubricLevel, StudentId, TopicId, UnitId};
use crate::propagate::{CellRef, ToggleBoard, ToggleKey, ToggleMode};
use serde::Serialize;

pub const EMPTY_CLASS_MESSAGE: &str = "ไม่มีข้อมูลนักเรียนในห้องเรียนนี้";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookView {
    pub course_id: i64,
    pub classroom_id: i64,
    pub active_unit: Option<UnitId>,
    pub empty_message: Option<String>,
    pub grand_max: f64,
    pub units: Vec<UnitHeader>,
    pub qualitative: Vec<TopicColumn>,
    pub exams: Vec<ExamColumn>,
    pub rows: Vec<RowView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitHeader {
    pub unit_id: UnitId,
    pub title: String,
    pub max_total: f64,
    pub visible: bool,
    pub items: Vec<ItemColumn>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemColumn {
    pub item_id: i64,
    pub name: String,
    pub max_score: f64,
    pub is_group_assignment: bool,
    pub toggle: ToggleMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Summary,
    Sub,
    Standalone,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicColumn {
    pub topic_id: TopicId,
    pub main_id: TopicId,
    pub name: String,
    pub kind: TopicKind,
    pub unit_id: Option<UnitId>,
    pub visible: bool,
    pub rubrics: Vec<RubricLevel>,
    /// Only summary and standalone columns carry the toggle.
    pub toggle: Option<ToggleMode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamColumn {
    pub exam_type: ExamType,
    pub label: String,
    pub max_score: f64,
    pub toggle: ToggleMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    pub key: String,
    pub value: Option<String>,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSubtotal {
    pub unit_id: UnitId,
    pub value: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBadge {
    pub code: String,
    pub message: String,
    pub tone: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub student_id: StudentId,
    pub label: String,
    pub group_id: Option<i64>,
    pub cells: Vec<CellView>,
    pub unit_subtotals: Vec<UnitSubtotal>,
    pub collected: String,
    pub total: String,
    pub percentage: String,
    pub grade: String,
    pub grade_danger: bool,
    pub alerts: Vec<AlertBadge>,
}

/// Stable key the shell uses to address a cell within a row.
pub fn cell_key(cell: &CellRef) -> String {
    match cell {
        CellRef::Item(id) => format!("item-{}", id),
        CellRef::Topic(id) => format!("topic-{}", id),
        CellRef::Exam(exam) => format!("exam-{}", exam.as_str()),
    }
}

fn visible_for(unit: Option<UnitId>, active: Option<UnitId>) -> bool {
    match (unit, active) {
        (_, None) | (None, _) => true,
        (Some(u), Some(a)) => u == a,
    }
}

pub fn alert_badges(row_alerts: &Alerts) -> Vec<AlertBadge> {
    row_alerts
        .0
        .iter()
        .map(|(code, message)| AlertBadge {
            code: code.clone(),
            message: message.clone(),
            tone: match AlertCode::parse(code) {
                AlertCode::MissingScores => "info",
                _ => "danger",
            },
        })
        .collect()
}

/// Renders the gradebook for the current toggles and unit filter.
pub fn gradebook_view(
    book: &Gradebook,
    toggles: &ToggleBoard,
    active_unit: Option<UnitId>,
) -> GradebookView {
    let units: Vec<UnitHeader> = book
        .units
        .iter()
        .map(|u| UnitHeader {
            unit_id: u.unit_id,
            title: u.title.clone(),
            max_total: u.max_total(),
            visible: visible_for(Some(u.unit_id), active_unit),
            items: u
                .items
                .iter()
                .map(|i| ItemColumn {
                    item_id: i.id,
                    name: i.name.clone(),
                    max_score: i.max_score,
                    is_group_assignment: i.is_group_assignment,
                    toggle: toggles.get(ToggleKey::Item(i.id)),
                })
                .collect(),
        })
        .collect();

    let mut qualitative = Vec::new();
    for template in &book.templates {
        for main in &template.main_topics {
            let visible = visible_for(main.unit_id, active_unit);
            let toggle = Some(toggles.get(ToggleKey::Topic(main.id)));
            if main.sub_topics.is_empty() {
                qualitative.push(TopicColumn {
                    topic_id: main.id,
                    main_id: main.id,
                    name: main.name.clone(),
                    kind: TopicKind::Standalone,
                    unit_id: main.unit_id,
                    visible,
                    rubrics: template.rubrics.clone(),
                    toggle,
                });
                continue;
            }
            qualitative.push(TopicColumn {
                topic_id: main.id,
                main_id: main.id,
                name: format!("สรุป {}", main.name),
                kind: TopicKind::Summary,
                unit_id: main.unit_id,
                visible,
                rubrics: template.rubrics.clone(),
                toggle,
            });
            for sub in &main.sub_topics {
                qualitative.push(TopicColumn {
                    topic_id: sub.id,
                    main_id: main.id,
                    name: sub.name.clone(),
                    kind: TopicKind::Sub,
                    unit_id: main.unit_id,
                    visible,
                    rubrics: template.rubrics.clone(),
                    toggle: None,
                });
            }
        }
    }

    let mut exams = Vec::new();
    if book.exams.midterm_enabled {
        exams.push(ExamColumn {
            exam_type: ExamType::Midterm,
            label: format!("กลางภาค ({})", format_score(book.exams.midterm_max)),
            max_score: book.exams.midterm_max,
            toggle: toggles.get(ToggleKey::Exam(ExamType::Midterm)),
        });
    }
    if book.exams.final_enabled {
        exams.push(ExamColumn {
            exam_type: ExamType::Final,
            label: format!("ปลายภาค ({})", format_score(book.exams.final_max)),
            max_score: book.exams.final_max,
            toggle: toggles.get(ToggleKey::Exam(ExamType::Final)),
        });
    }

    let rows = book
        .rows
        .iter()
        .map(|row| {
            let mut cells = Vec::new();
            for u in &book.units {
                let visible = visible_for(Some(u.unit_id), active_unit);
                let group = row.group_for(u.unit_id);
                for item in &u.items {
                    cells.push(CellView {
                        key: cell_key(&CellRef::Item(item.id)),
                        value: row.score(item.id).map(format_score),
                        visible,
                        group_id: if item.is_group_assignment { group } else { None },
                    });
                }
            }
            for col in &qualitative {
                cells.push(CellView {
                    key: cell_key(&CellRef::Topic(col.topic_id)),
                    value: row.topic(col.topic_id).map(str::to_string),
                    visible: col.visible,
                    group_id: None,
                });
            }
            for col in &exams {
                cells.push(CellView {
                    key: cell_key(&CellRef::Exam(col.exam_type)),
                    value: row.exam(col.exam_type).map(format_score),
                    visible: true,
                    group_id: None,
                });
            }
            RowView {
                student_id: row.id,
                label: row.label(),
                group_id: active_unit.and_then(|u| row.group_for(u)),
                cells,
                unit_subtotals: row
                    .totals
                    .unit_subtotals
                    .iter()
                    .map(|(unit, v)| UnitSubtotal {
                        unit_id: *unit,
                        value: format_score(*v),
                        visible: visible_for(Some(*unit), active_unit),
                    })
                    .collect(),
                collected: format_score(row.totals.collected),
                total: format_score(row.totals.total),
                percentage: format_percentage(row.totals.percentage),
                grade: row.totals.grade.text(),
                grade_danger: row.totals.grade.is_danger(),
                alerts: alert_badges(&row.alerts),
            }
        })
        .collect::<Vec<_>>();

    GradebookView {
        course_id: book.course_id,
        classroom_id: book.classroom_id,
        active_unit,
        empty_message: if book.rows.is_empty() {
            Some(EMPTY_CLASS_MESSAGE.to_string())
        } else {
            None
        },
        grand_max: book.exams.grand_max,
        units,
        qualitative,
        exams,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    fn book() -> Gradebook {
        Gradebook::from_json(42, 9, &fixtures::gradebook_json()).expect("decode gradebook")
    }

    #[test]
    fn unit_filter_hides_other_units() {
        let b = book();
        let v = gradebook_view(&b, &ToggleBoard::default(), Some(10));
        assert!(v.units[0].visible);
        assert!(!v.units[1].visible);
        let reading = v.qualitative.iter().find(|c| c.topic_id == 600).expect("column");
        assert!(!reading.visible);
        let row = &v.rows[0];
        let lab = row.cells.iter().find(|c| c.key == "item-200").expect("cell");
        assert!(!lab.visible);
        assert_eq!(row.group_id, Some(7));
    }

    #[test]
    fn qualitative_columns_put_summary_before_sub_topics() {
        let v = gradebook_view(&book(), &ToggleBoard::default(), None);
        let kinds: Vec<TopicKind> = v.qualitative.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TopicKind::Summary,
                TopicKind::Sub,
                TopicKind::Sub,
                TopicKind::Sub,
                TopicKind::Standalone
            ]
        );
        assert!(v.qualitative[1].toggle.is_none());
    }

    #[test]
    fn rows_carry_displays_and_badges() {
        let v = gradebook_view(&book(), &ToggleBoard::default(), None);
        let r1 = &v.rows[0];
        assert_eq!(r1.collected, "23.50");
        assert_eq!(r1.total, "38.50");
        assert_eq!(r1.grade, "0");
        assert!(r1.grade_danger);
        let project = r1.cells.iter().find(|c| c.key == "item-101").expect("cell");
        assert_eq!(project.group_id, Some(7));

        let r2 = &v.rows[1];
        assert_eq!(r2.grade, "ร");
        assert_eq!(r2.alerts[0].tone, "danger");
        let r3 = &v.rows[2];
        assert_eq!(r3.alerts[0].tone, "info");
        assert_eq!(v.exams.len(), 2);
        assert_eq!(v.exams[1].label, "ปลายภาค (30)");
    }

    #[test]
    fn toggles_show_in_headers() {
        let b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Item(100), ToggleMode::Group).expect("toggle");
        t.set(ToggleKey::Exam(ExamType::Midterm), ToggleMode::All).expect("toggle");
        let v = gradebook_view(&b, &t, None);
        assert_eq!(v.units[0].items[0].toggle, ToggleMode::Group);
        assert_eq!(v.exams[0].toggle, ToggleMode::All);
    }

    #[test]
    fn empty_class_has_message() {
        let b = Gradebook::from_json(1, 1, &serde_json::json!({"students": []})).expect("decode");
        let v = gradebook_view(&b, &ToggleBoard::default(), None);
        assert_eq!(v.empty_message.as_deref(), Some(EMPTY_CLASS_MESSAGE));
        assert!(v.rows.is_empty());
    }
}
