use crate::model::{
    ExamType, Gradebook, ItemId, StudentId, StudentRow, TopicId, TopicRole, UnitId,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropagationError {
    #[error("unknown student: {0}")]
    UnknownStudent(StudentId),
    #[error("unknown graded item: {0}")]
    UnknownItem(ItemId),
    #[error("unknown qualitative topic: {0}")]
    UnknownTopic(TopicId),
    #[error("{} exam is not enabled for this course", .0.as_str())]
    ExamDisabled(ExamType),
    #[error("value kind does not match the edited cell")]
    KindMismatch,
    #[error("'{value}' is not a rubric level of topic {topic}")]
    InvalidRubric { topic: TopicId, value: String },
    #[error("exam columns only support the 'all' toggle")]
    GroupNotAllowed,
}

/// Which toggle a column is governed by. Sub-topics share their main topic's toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleKey {
    Item(ItemId),
    Topic(TopicId),
    Exam(ExamType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleMode {
    #[default]
    None,
    Group,
    All,
}

impl ToggleMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "none" | "" => Some(ToggleMode::None),
            "group" => Some(ToggleMode::Group),
            "all" => Some(ToggleMode::All),
            _ => None,
        }
    }
}

/// One mode per column, so group and all can never both be on.
#[derive(Debug, Clone, Default)]
pub struct ToggleBoard {
    modes: HashMap<ToggleKey, ToggleMode>,
}

impl ToggleBoard {
    pub fn get(&self, key: ToggleKey) -> ToggleMode {
        self.modes.get(&key).copied().unwrap_or_default()
    }

    pub fn set(&mut self, key: ToggleKey, mode: ToggleMode) -> Result<(), PropagationError> {
        if matches!(key, ToggleKey::Exam(_)) && mode == ToggleMode::Group {
            return Err(PropagationError::GroupNotAllowed);
        }
        if mode == ToggleMode::None {
            self.modes.remove(&key);
        } else {
            self.modes.insert(key, mode);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRef {
    Item(ItemId),
    Topic(TopicId),
    Exam(ExamType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(Option<f64>),
    Category(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub student: StudentId,
    pub cell: CellRef,
    pub value: CellValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangedCell {
    pub student: StudentId,
    pub cell: CellRef,
    pub value: CellValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Scores,
    ExamScores,
    Qualitative,
}

/// Cells written by one edit. The edited cell comes first.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub kind: BatchKind,
    pub changes: Vec<ChangedCell>,
    pub affected: Vec<StudentId>,
}

/// Row indices an edit on `source` fans out to.
pub fn scope_rows(
    book: &Gradebook,
    source: usize,
    mode: ToggleMode,
    unit: Option<UnitId>,
) -> Vec<usize> {
    match mode {
        ToggleMode::None => vec![source],
        ToggleMode::All => (0..book.rows.len()).collect(),
        ToggleMode::Group => {
            let group = unit.and_then(|u| book.rows[source].group_for(u).map(|g| (u, g)));
            match group {
                Some((u, g)) => book
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.group_for(u) == Some(g))
                    .map(|(i, _)| i)
                    .collect(),
                None => vec![source],
            }
        }
    }
}

/// Applies an edit and everything it propagates to, then recomputes totals of the rows touched.
pub fn apply_edit(
    book: &mut Gradebook,
    toggles: &ToggleBoard,
    active_unit: Option<UnitId>,
    edit: &Edit,
) -> Result<Batch, PropagationError> {
    let source = book
        .row_index(edit.student)
        .ok_or(PropagationError::UnknownStudent(edit.student))?;

    let batch = match (edit.cell, &edit.value) {
        (CellRef::Item(item), CellValue::Number(v)) => {
            let unit = book
                .item(item)
                .map(|i| i.unit_id)
                .ok_or(PropagationError::UnknownItem(item))?;
            let mode = toggles.get(ToggleKey::Item(item));
            let rows = scope_rows(book, source, mode, active_unit.or(Some(unit)));
            let changes = write_numeric(book, source, &rows, edit.cell, *v);
            finish(book, BatchKind::Scores, changes, &rows)
        }
        (CellRef::Exam(exam), CellValue::Number(v)) => {
            if !book.exams.enabled(exam) {
                return Err(PropagationError::ExamDisabled(exam));
            }
            let mode = match toggles.get(ToggleKey::Exam(exam)) {
                ToggleMode::All => ToggleMode::All,
                _ => ToggleMode::None,
            };
            let rows = scope_rows(book, source, mode, None);
            let changes = write_numeric(book, source, &rows, edit.cell, *v);
            finish(book, BatchKind::ExamScores, changes, &rows)
        }
        (CellRef::Topic(topic), CellValue::Category(v)) => {
            let v = v.as_deref().map(str::trim).filter(|s| !s.is_empty());
            let (main_id, main_unit, subs, role) = {
                let slot = book
                    .topic_slot(topic)
                    .ok_or(PropagationError::UnknownTopic(topic))?;
                if let Some(value) = v {
                    if !slot.template.accepts(value) {
                        return Err(PropagationError::InvalidRubric {
                            topic,
                            value: value.to_string(),
                        });
                    }
                }
                let subs: Vec<TopicId> = slot.main.sub_topics.iter().map(|s| s.id).collect();
                (slot.main.id, slot.main.unit_id, subs, slot.role)
            };
            let mode = toggles.get(ToggleKey::Topic(main_id));
            let rows = scope_rows(book, source, mode, active_unit.or(main_unit));
            let value = v.map(str::to_string);
            let changes = write_categorical(book, source, &rows, topic, main_id, &subs, role, value);
            finish(book, BatchKind::Qualitative, changes, &rows)
        }
        _ => return Err(PropagationError::KindMismatch),
    };
    Ok(batch)
}

fn finish(book: &mut Gradebook, kind: BatchKind, changes: Vec<ChangedCell>, rows: &[usize]) -> Batch {
    for idx in rows {
        book.refresh_totals(*idx);
    }
    Batch {
        kind,
        changes,
        affected: rows.iter().map(|i| book.rows[*i].id).collect(),
    }
}

fn write_numeric(
    book: &mut Gradebook,
    source: usize,
    rows: &[usize],
    cell: CellRef,
    value: Option<f64>,
) -> Vec<ChangedCell> {
    let mut changes = Vec::new();
    let order = std::iter::once(source).chain(rows.iter().copied().filter(|i| *i != source));
    for idx in order {
        let row = &mut book.rows[idx];
        let old = match cell {
            CellRef::Item(item) => row.scores.insert(item, value).flatten(),
            CellRef::Exam(exam) => {
                let old = row.exam(exam);
                row.set_exam(exam, value);
                old
            }
            CellRef::Topic(_) => continue,
        };
        if idx == source || old != value {
            changes.push(ChangedCell {
                student: row.id,
                cell,
                value: CellValue::Number(value),
            });
        }
    }
    changes
}

#[allow(clippy::too_many_arguments)]
fn write_categorical(
    book: &mut Gradebook,
    source: usize,
    rows: &[usize],
    topic: TopicId,
    main_id: TopicId,
    subs: &[TopicId],
    role: TopicRole,
    value: Option<String>,
) -> Vec<ChangedCell> {
    let mut changes = Vec::new();
    let order = std::iter::once(source).chain(rows.iter().copied().filter(|i| *i != source));
    for idx in order {
        let row = &mut book.rows[idx];
        let mut touched: Vec<TopicId> = Vec::new();
        match role {
            TopicRole::Summary => {
                for sub in subs {
                    if set_topic(row, *sub, &value) {
                        touched.push(*sub);
                    }
                }
                if set_topic(row, main_id, &value) {
                    touched.push(main_id);
                }
            }
            TopicRole::Sub => {
                if set_topic(row, topic, &value) {
                    touched.push(topic);
                }
                let summary = crate::calc::mode(subs.iter().map(|s| row.topic(*s)));
                if set_topic(row, main_id, &summary) {
                    touched.push(main_id);
                }
            }
            TopicRole::Standalone => {
                if set_topic(row, topic, &value) {
                    touched.push(topic);
                }
            }
        }
        if idx == source && !touched.contains(&topic) {
            touched.insert(0, topic);
        }
        for t in touched {
            changes.push(ChangedCell {
                student: row.id,
                cell: CellRef::Topic(t),
                value: CellValue::Category(row.topic(t).map(str::to_string)),
            });
        }
    }
    // edited cell leads the batch
    if let Some(pos) = changes
        .iter()
        .position(|c| c.student == book.rows[source].id && c.cell == CellRef::Topic(topic))
    {
        let edited = changes.remove(pos);
        changes.insert(0, edited);
    }
    changes
}

fn set_topic(row: &mut StudentRow, topic: TopicId, value: &Option<String>) -> bool {
    let old = row.qualitative.insert(topic, value.clone()).flatten();
    old != *value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures;

    fn book() -> Gradebook {
        Gradebook::from_json(42, 9, &fixtures::gradebook_json()).expect("decode gradebook")
    }

    fn numeric(student: StudentId, item: ItemId, v: Option<f64>) -> Edit {
        Edit {
            student,
            cell: CellRef::Item(item),
            value: CellValue::Number(v),
        }
    }

    fn category(student: StudentId, topic: TopicId, v: &str) -> Edit {
        Edit {
            student,
            cell: CellRef::Topic(topic),
            value: CellValue::Category(Some(v.to_string())),
        }
    }

    #[test]
    fn no_toggle_touches_only_the_edited_row() {
        let mut b = book();
        let batch = apply_edit(&mut b, &ToggleBoard::default(), None, &numeric(2, 100, Some(6.0)))
            .expect("edit");
        assert_eq!(batch.kind, BatchKind::Scores);
        assert_eq!(batch.changes.len(), 1);
        assert_eq!(b.row(2).and_then(|r| r.score(100)), Some(6.0));
        assert_eq!(b.row(1).and_then(|r| r.score(100)), Some(8.0));
        assert_eq!(b.row(2).expect("row").totals.collected, 6.0);
    }

    #[test]
    fn all_toggle_copies_literal_value_everywhere() {
        let mut b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Item(100), ToggleMode::All).expect("toggle");
        let batch = apply_edit(&mut b, &t, None, &numeric(3, 100, Some(7.25))).expect("edit");
        for row in &b.rows {
            assert_eq!(row.score(100), Some(7.25));
        }
        assert_eq!(batch.changes[0].student, 3);
        assert_eq!(batch.changes.len(), 3);
        assert_eq!(batch.affected.len(), 3);
    }

    #[test]
    fn unchanged_cells_stay_out_of_the_batch() {
        let mut b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Item(100), ToggleMode::All).expect("toggle");
        let batch = apply_edit(&mut b, &t, None, &numeric(3, 100, Some(8.0))).expect("edit");
        let students: Vec<StudentId> = batch.changes.iter().map(|c| c.student).collect();
        assert_eq!(students, vec![3, 2]);
    }

    #[test]
    fn group_toggle_limits_to_same_group_in_active_unit() {
        let mut b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Item(101), ToggleMode::Group).expect("toggle");
        apply_edit(&mut b, &t, Some(10), &numeric(1, 101, Some(18.0))).expect("edit");
        assert_eq!(b.row(1).and_then(|r| r.score(101)), Some(18.0));
        assert_eq!(b.row(2).and_then(|r| r.score(101)), Some(18.0));
        assert_eq!(b.row(3).and_then(|r| r.score(101)), None);
    }

    #[test]
    fn group_toggle_without_group_degrades_to_row() {
        let mut b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Item(200), ToggleMode::Group).expect("toggle");
        let batch = apply_edit(&mut b, &t, Some(20), &numeric(1, 200, Some(2.0))).expect("edit");
        assert_eq!(batch.affected, vec![1]);
        assert_eq!(b.row(3).and_then(|r| r.score(200)), Some(4.0));
    }

    #[test]
    fn group_scope_falls_back_to_item_unit() {
        let mut b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Item(100), ToggleMode::Group).expect("toggle");
        let batch = apply_edit(&mut b, &t, None, &numeric(2, 100, Some(1.0))).expect("edit");
        assert_eq!(batch.affected, vec![1, 2]);
    }

    #[test]
    fn exam_toggle_rejects_group_and_checks_enabled() {
        let mut t = ToggleBoard::default();
        assert_eq!(
            t.set(ToggleKey::Exam(ExamType::Final), ToggleMode::Group),
            Err(PropagationError::GroupNotAllowed)
        );
        t.set(ToggleKey::Exam(ExamType::Final), ToggleMode::All).expect("toggle");
        let mut b = book();
        let edit = Edit {
            student: 1,
            cell: CellRef::Exam(ExamType::Final),
            value: CellValue::Number(Some(25.0)),
        };
        let batch = apply_edit(&mut b, &t, None, &edit).expect("edit");
        assert_eq!(batch.kind, BatchKind::ExamScores);
        assert!(b.rows.iter().all(|r| r.final_exam == Some(25.0)));

        b.exams.final_enabled = false;
        assert_eq!(
            apply_edit(&mut b, &t, None, &edit),
            Err(PropagationError::ExamDisabled(ExamType::Final))
        );
    }

    #[test]
    fn summary_edit_overwrites_sub_topics_in_scope() {
        let mut b = book();
        let mut t = ToggleBoard::default();
        t.set(ToggleKey::Topic(500), ToggleMode::All).expect("toggle");
        let batch = apply_edit(&mut b, &t, None, &category(2, 500, "2")).expect("edit");
        assert_eq!(batch.kind, BatchKind::Qualitative);
        assert_eq!(batch.changes[0].cell, CellRef::Topic(500));
        assert_eq!(batch.changes[0].student, 2);
        for row in &b.rows {
            for topic in [500, 501, 502, 503] {
                assert_eq!(row.topic(topic), Some("2"));
            }
        }
    }

    #[test]
    fn sub_topic_edit_recomputes_summary_as_mode() {
        let mut b = book();
        let t = ToggleBoard::default();
        apply_edit(&mut b, &t, None, &category(1, 502, "1")).expect("edit");
        // 501 = "3", 502 = "1": tie, first seen wins
        assert_eq!(b.row(1).and_then(|r| r.topic(500)), Some("3"));
        let batch = apply_edit(&mut b, &t, None, &category(1, 503, "1")).expect("edit");
        assert_eq!(b.row(1).and_then(|r| r.topic(500)), Some("1"));
        let cells: Vec<CellRef> = batch.changes.iter().map(|c| c.cell).collect();
        assert_eq!(cells, vec![CellRef::Topic(503), CellRef::Topic(500)]);
    }

    #[test]
    fn clearing_all_sub_topics_clears_summary() {
        let mut b = book();
        let t = ToggleBoard::default();
        let clear = Edit {
            student: 1,
            cell: CellRef::Topic(501),
            value: CellValue::Category(None),
        };
        apply_edit(&mut b, &t, None, &clear).expect("edit");
        assert_eq!(b.row(1).and_then(|r| r.topic(500)), None);
    }

    #[test]
    fn rubric_values_are_validated() {
        let mut b = book();
        let err = apply_edit(&mut b, &ToggleBoard::default(), None, &category(1, 600, "9"));
        assert!(matches!(err, Err(PropagationError::InvalidRubric { topic: 600, .. })));
        let ok = apply_edit(&mut b, &ToggleBoard::default(), None, &category(1, 600, "3"))
            .expect("edit");
        assert_eq!(ok.changes.len(), 1);
    }

    #[test]
    fn kind_mismatch_and_unknown_ids() {
        let mut b = book();
        let t = ToggleBoard::default();
        assert_eq!(
            apply_edit(
                &mut b,
                &t,
                None,
                &Edit {
                    student: 1,
                    cell: CellRef::Item(100),
                    value: CellValue::Category(Some("3".into())),
                }
            ),
            Err(PropagationError::KindMismatch)
        );
        assert_eq!(
            apply_edit(&mut b, &t, None, &numeric(99, 100, None)),
            Err(PropagationError::UnknownStudent(99))
        );
        assert_eq!(
            apply_edit(&mut b, &t, None, &numeric(1, 999, None)),
            Err(PropagationError::UnknownItem(999))
        );
    }
}
