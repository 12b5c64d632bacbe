use crate::api::types::{Enrollment, GroupSubmission, PlanGroup};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("enrollment {0} is not in this classroom")]
    UnknownEnrollment(i64),
    #[error("group name must not be empty")]
    EmptyName,
    #[error("group count must be at least 1")]
    NoGroups,
    #[error("cannot make {count} groups from {students} students")]
    TooManyGroups { count: usize, students: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftGroup {
    /// Server id as text, or `new-<uuid>` for groups not yet saved.
    pub key: String,
    pub name: String,
    pub members: Vec<i64>,
}

/// Editable copy of a plan's groups for one unit and classroom.
#[derive(Debug, Clone)]
pub struct GroupDraft {
    pub plan_id: i64,
    pub course_id: i64,
    pub unit_id: i64,
    pub enrollments: Vec<Enrollment>,
    pub groups: Vec<DraftGroup>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMember {
    pub enrollment_id: i64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftGroupView {
    pub key: String,
    pub name: String,
    pub members: Vec<DraftMember>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub unit_id: i64,
    pub ungrouped: Vec<DraftMember>,
    pub groups: Vec<DraftGroupView>,
}

fn new_key() -> String {
    format!("new-{}", uuid::Uuid::new_v4())
}

impl GroupDraft {
    /// Members not enrolled in the classroom are dropped; a student listed twice stays in the first group.
    pub fn from_server(
        plan_id: i64,
        course_id: i64,
        unit_id: i64,
        enrollments: Vec<Enrollment>,
        groups: Vec<PlanGroup>,
    ) -> Self {
        let known: HashSet<i64> = enrollments.iter().map(|e| e.id).collect();
        let mut placed: HashSet<i64> = HashSet::new();
        let groups = groups
            .into_iter()
            .map(|g| DraftGroup {
                key: g.id.to_string(),
                name: g.name,
                members: g
                    .enrollments
                    .into_iter()
                    .filter(|id| known.contains(id) && placed.insert(*id))
                    .collect(),
            })
            .collect();
        Self {
            plan_id,
            course_id,
            unit_id,
            enrollments,
            groups,
        }
    }

    fn enrollment(&self, id: i64) -> Option<&Enrollment> {
        self.enrollments.iter().find(|e| e.id == id)
    }

    fn group_mut(&mut self, key: &str) -> Result<&mut DraftGroup, GroupError> {
        self.groups
            .iter_mut()
            .find(|g| g.key == key)
            .ok_or_else(|| GroupError::UnknownGroup(key.to_string()))
    }

    pub fn ungrouped(&self) -> Vec<&Enrollment> {
        let grouped: HashSet<i64> = self.groups.iter().flat_map(|g| g.members.iter().copied()).collect();
        self.enrollments
            .iter()
            .filter(|e| !grouped.contains(&e.id))
            .collect()
    }

    /// Appends an empty group; unnamed groups are called `กลุ่มที่ N`.
    pub fn add_group(&mut self, name: Option<&str>) -> String {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("กลุ่มที่ {}", self.groups.len() + 1));
        let key = new_key();
        self.groups.push(DraftGroup {
            key: key.clone(),
            name,
            members: Vec::new(),
        });
        key
    }

    pub fn rename(&mut self, key: &str, name: &str) -> Result<(), GroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::EmptyName);
        }
        self.group_mut(key)?.name = name.to_string();
        Ok(())
    }

    /// Removes a group; its members go back to ungrouped.
    pub fn delete(&mut self, key: &str) -> Result<Vec<i64>, GroupError> {
        let pos = self
            .groups
            .iter()
            .position(|g| g.key == key)
            .ok_or_else(|| GroupError::UnknownGroup(key.to_string()))?;
        Ok(self.groups.remove(pos).members)
    }

    /// Moves an enrollment into `to`, or out of every group when `to` is `None`.
    pub fn move_member(&mut self, enrollment: i64, to: Option<&str>) -> Result<(), GroupError> {
        if self.enrollment(enrollment).is_none() {
            return Err(GroupError::UnknownEnrollment(enrollment));
        }
        if let Some(key) = to {
            if !self.groups.iter().any(|g| g.key == key) {
                return Err(GroupError::UnknownGroup(key.to_string()));
            }
        }
        for g in &mut self.groups {
            g.members.retain(|m| *m != enrollment);
        }
        if let Some(key) = to {
            self.group_mut(key)?.members.push(enrollment);
        }
        Ok(())
    }

    /// Replaces every group with `count` new ones and deals all enrolled students into them.
    /// An empty classroom still allows a single group.
    pub fn auto_generate<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Result<(), GroupError> {
        if count == 0 {
            return Err(GroupError::NoGroups);
        }
        let students = self.enrollments.len();
        if count > students.max(1) {
            return Err(GroupError::TooManyGroups { count, students });
        }
        let mut ids: Vec<i64> = self.enrollments.iter().map(|e| e.id).collect();
        ids.shuffle(rng);

        let mut groups: Vec<DraftGroup> = (1..=count)
            .map(|i| DraftGroup {
                key: new_key(),
                name: format!("กลุ่มที่ {}", i),
                members: Vec::new(),
            })
            .collect();
        for (i, id) in ids.into_iter().enumerate() {
            groups[i % count].members.push(id);
        }
        self.groups = groups;
        Ok(())
    }

    pub fn submission(&self) -> Vec<GroupSubmission> {
        self.groups
            .iter()
            .map(|g| GroupSubmission {
                id: g.key.clone(),
                name: g.name.clone(),
                members: g.members.clone(),
            })
            .collect()
    }

    fn member(&self, id: i64) -> DraftMember {
        let label = match self.enrollment(id) {
            Some(e) => match e.roll_number {
                Some(n) => format!("{}. {}", n, e.name),
                None => e.name.clone(),
            },
            None => id.to_string(),
        };
        DraftMember {
            enrollment_id: id,
            label,
        }
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            unit_id: self.unit_id,
            ungrouped: self.ungrouped().iter().map(|e| self.member(e.id)).collect(),
            groups: self
                .groups
                .iter()
                .map(|g| DraftGroupView {
                    key: g.key.clone(),
                    name: g.name.clone(),
                    members: g.members.iter().map(|m| self.member(*m)).collect(),
                })
                .collect(),
        }
    }
}
