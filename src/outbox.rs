use crate::config::SaveWindows;
use crate::model::{ExamType, ItemId, StudentId, TopicId, UnitId};
use indexmap::IndexMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Logical destination of a save. Edits to the same target share one debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveTarget {
    Scores { course: i64 },
    Qualitative { course: i64 },
    ExamScores { course: i64 },
    Attendance { entry: i64, student: StudentId },
    UnitHours { unit: UnitId },
    UnitExamScores { unit: UnitId },
}

impl SaveTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            SaveTarget::Scores { .. } => "scores",
            SaveTarget::Qualitative { .. } => "qualitative",
            SaveTarget::ExamScores { .. } => "examScores",
            SaveTarget::Attendance { .. } => "attendance",
            SaveTarget::UnitHours { .. } => "unitHours",
            SaveTarget::UnitExamScores { .. } => "unitExamScores",
        }
    }

    pub fn label(&self) -> String {
        match self {
            SaveTarget::Scores { course }
            | SaveTarget::Qualitative { course }
            | SaveTarget::ExamScores { course } => format!("{}:course={}", self.kind(), course),
            SaveTarget::Attendance { entry, student } => {
                format!("attendance:entry={},student={}", entry, student)
            }
            SaveTarget::UnitHours { unit } | SaveTarget::UnitExamScores { unit } => {
                format!("{}:unit={}", self.kind(), unit)
            }
        }
    }

    pub fn window(&self, windows: &SaveWindows) -> Duration {
        match self {
            SaveTarget::Scores { .. } => windows.scores,
            SaveTarget::Qualitative { .. } => windows.qualitative,
            SaveTarget::ExamScores { .. } => windows.exam_scores,
            SaveTarget::Attendance { .. } => windows.attendance,
            SaveTarget::UnitHours { .. } => windows.unit_hours,
            SaveTarget::UnitExamScores { .. } => windows.unit_exam_scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveEntry {
    Score {
        student: StudentId,
        item: ItemId,
        score: Option<f64>,
    },
    Qualitative {
        student: StudentId,
        topic: TopicId,
        value: Option<String>,
    },
    Exam {
        student: StudentId,
        exam: ExamType,
        score: Option<f64>,
    },
    Attendance {
        student: StudentId,
        entry: i64,
        date: String,
        status: String,
    },
    UnitHours {
        hours: i64,
    },
    UnitExamScores {
        midterm: Option<f64>,
        final_score: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKey {
    Score(StudentId, ItemId),
    Topic(StudentId, TopicId),
    Exam(StudentId, ExamType),
    Whole,
}

impl SaveEntry {
    fn cell_key(&self) -> CellKey {
        match self {
            SaveEntry::Score { student, item, .. } => CellKey::Score(*student, *item),
            SaveEntry::Qualitative { student, topic, .. } => CellKey::Topic(*student, *topic),
            SaveEntry::Exam { student, exam, .. } => CellKey::Exam(*student, *exam),
            SaveEntry::Attendance { .. }
            | SaveEntry::UnitHours { .. }
            | SaveEntry::UnitExamScores { .. } => CellKey::Whole,
        }
    }

    pub fn student(&self) -> Option<StudentId> {
        match self {
            SaveEntry::Score { student, .. }
            | SaveEntry::Qualitative { student, .. }
            | SaveEntry::Exam { student, .. }
            | SaveEntry::Attendance { student, .. } => Some(*student),
            SaveEntry::UnitHours { .. } | SaveEntry::UnitExamScores { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingBatch {
    pub target: SaveTarget,
    pub entries: Vec<SaveEntry>,
    pub deadline: Instant,
    pub queued_at: String,
}

impl PendingBatch {
    /// Students whose rows this batch writes.
    pub fn students(&self) -> Vec<StudentId> {
        let mut out: Vec<StudentId> = Vec::new();
        for s in self.entries.iter().filter_map(|e| e.student()) {
            if !out.contains(&s) {
                out.push(s);
            }
        }
        out
    }

    fn merge(&mut self, entries: Vec<SaveEntry>) {
        for entry in entries {
            let key = entry.cell_key();
            match self.entries.iter_mut().find(|e| e.cell_key() == key) {
                Some(slot) => *slot = entry,
                None => self.entries.push(entry),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSummary {
    pub target: String,
    pub kind: &'static str,
    pub entries: usize,
    pub due_in_ms: u64,
}

/// Pending saves keyed by target. Time is always passed in, so nothing here owns a timer.
#[derive(Debug, Clone)]
pub struct Outbox {
    windows: SaveWindows,
    pending: IndexMap<SaveTarget, PendingBatch>,
}

impl Outbox {
    pub fn new(windows: SaveWindows) -> Self {
        Self {
            windows,
            pending: IndexMap::new(),
        }
    }

    /// Merges into the target's batch (later value for a cell wins) and restarts its window.
    pub fn queue(&mut self, target: SaveTarget, entries: Vec<SaveEntry>, now: Instant) {
        if entries.is_empty() {
            return;
        }
        let deadline = now + target.window(&self.windows);
        match self.pending.get_mut(&target) {
            Some(batch) => {
                batch.merge(entries);
                batch.deadline = deadline;
            }
            None => {
                let mut batch = PendingBatch {
                    target,
                    entries: Vec::new(),
                    deadline,
                    queued_at: chrono::Utc::now().to_rfc3339(),
                };
                batch.merge(entries);
                self.pending.insert(target, batch);
            }
        }
        debug!(save = %target.label(), "save queued");
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|b| b.deadline).min()
    }

    pub fn take_due(&mut self, now: Instant) -> Vec<PendingBatch> {
        let due: Vec<SaveTarget> = self
            .pending
            .values()
            .filter(|b| b.deadline <= now)
            .map(|b| b.target)
            .collect();
        due.iter()
            .filter_map(|t| self.pending.shift_remove(t))
            .collect()
    }

    pub fn take_all(&mut self) -> Vec<PendingBatch> {
        self.pending.drain(..).map(|(_, b)| b).collect()
    }

    pub fn pending(&self, now: Instant) -> Vec<PendingSummary> {
        self.pending
            .values()
            .map(|b| PendingSummary {
                target: b.target.label(),
                kind: b.target.kind(),
                entries: b.entries.len(),
                due_in_ms: b.deadline.saturating_duration_since(now).as_millis() as u64,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(student: StudentId, item: ItemId, v: f64) -> SaveEntry {
        SaveEntry::Score {
            student,
            item,
            score: Some(v),
        }
    }

    #[test]
    fn same_target_merges_and_resets_window() {
        let mut ob = Outbox::new(SaveWindows::default());
        let t0 = Instant::now();
        let target = SaveTarget::Scores { course: 1 };
        ob.queue(target, vec![score(1, 10, 5.0), score(2, 10, 5.0)], t0);
        ob.queue(target, vec![score(1, 10, 7.0)], t0 + Duration::from_millis(300));

        assert_eq!(ob.len(), 1);
        assert_eq!(ob.next_deadline(), Some(t0 + Duration::from_millis(800)));
        assert!(ob.take_due(t0 + Duration::from_millis(700)).is_empty());

        let due = ob.take_due(t0 + Duration::from_millis(800));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].entries, vec![score(1, 10, 7.0), score(2, 10, 5.0)]);
        assert!(ob.is_empty());
    }

    #[test]
    fn targets_debounce_independently() {
        let mut ob = Outbox::new(SaveWindows::default());
        let t0 = Instant::now();
        ob.queue(SaveTarget::UnitHours { unit: 3 }, vec![SaveEntry::UnitHours { hours: 4 }], t0);
        ob.queue(
            SaveTarget::Qualitative { course: 1 },
            vec![SaveEntry::Qualitative {
                student: 1,
                topic: 5,
                value: Some("3".into()),
            }],
            t0,
        );
        let first = ob.take_due(t0 + Duration::from_millis(200));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].target, SaveTarget::UnitHours { unit: 3 });
        assert_eq!(ob.next_deadline(), Some(t0 + Duration::from_millis(800)));
    }

    #[test]
    fn attendance_is_keyed_per_student() {
        let mut ob = Outbox::new(SaveWindows::default());
        let t0 = Instant::now();
        let entry = |student, status: &str| SaveEntry::Attendance {
            student,
            entry: 9,
            date: "2024-06-01".into(),
            status: status.into(),
        };
        ob.queue(SaveTarget::Attendance { entry: 9, student: 1 }, vec![entry(1, "present")], t0);
        ob.queue(SaveTarget::Attendance { entry: 9, student: 2 }, vec![entry(2, "late")], t0);
        ob.queue(SaveTarget::Attendance { entry: 9, student: 1 }, vec![entry(1, "absent")], t0);
        let all = ob.take_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entries, vec![entry(1, "absent")]);
        assert_eq!(all[1].students(), vec![2]);
    }

    #[test]
    fn pending_reports_time_left() {
        let mut ob = Outbox::new(SaveWindows::default());
        let t0 = Instant::now();
        ob.queue(SaveTarget::ExamScores { course: 4 }, vec![SaveEntry::Exam {
            student: 1,
            exam: ExamType::Midterm,
            score: None,
        }], t0);
        let p = ob.pending(t0 + Duration::from_millis(100));
        assert_eq!(p[0].kind, "examScores");
        assert_eq!(p[0].due_in_ms, 400);
        assert_eq!(p[0].target, "examScores:course=4");
        assert_eq!(ob.pending(t0 + Duration::from_secs(5))[0].due_in_ms, 0);
    }

    #[test]
    fn empty_queue_is_ignored() {
        let mut ob = Outbox::new(SaveWindows::default());
        ob.queue(SaveTarget::Scores { course: 1 }, Vec::new(), Instant::now());
        assert!(ob.is_empty());
        assert_eq!(ob.next_deadline(), None);
    }
}
