//! Write protocol between the engine and the document store.
//!
//! Writes are merge patches over the project's top-level fields: a field
//! left as `None` is untouched remotely, `Field::Delete` removes it. Member
//! roles merge per user, the equivalent of a dotted-path update. Reads are
//! whole snapshots tagged with the store's revision counter.
//!
//! ```text
//!  Editor ──ProjectPatch──▸ DocumentStore ──DocSnapshot──▸ subscribers
//!                                 │
//!                                 └──Vec<ProjectSummary>──▸ list subscribers
//! ```

use mosaic_core::{Layouts, Project, ProjectId, Role, UserId, Widget};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Update for one optional field. `Delete` is the store's delete sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field<T> {
    Set(T),
    Delete,
}

impl<T> Field<T> {
    /// `Some` sets, `None` deletes.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Set(v),
            None => Field::Delete,
        }
    }
}

/// Merge write against one project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Field<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: BTreeMap<UserId, Field<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_team: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<Vec<Widget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layouts: Option<Layouts>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.emoji.is_none()
            && self.members.is_empty()
            && self.participants.is_none()
            && self.is_team.is_none()
            && self.widgets.is_none()
            && self.layouts.is_none()
    }

    /// Fields in which `next` differs from `base`. Owner and id never change.
    pub fn diff(base: &Project, next: &Project) -> Self {
        let mut members = BTreeMap::new();
        let users: BTreeSet<&UserId> = base.members.keys().chain(next.members.keys()).collect();
        for user in users {
            match (base.members.get(user), next.members.get(user)) {
                (before, Some(role)) if before != Some(role) => {
                    members.insert(user.clone(), Field::Set(*role));
                }
                (Some(_), None) => {
                    members.insert(user.clone(), Field::Delete);
                }
                _ => {}
            }
        }

        Self {
            name: (base.name != next.name).then(|| next.name.clone()),
            emoji: (base.emoji != next.emoji).then(|| Field::from_option(next.emoji.clone())),
            members,
            participants: (base.participants != next.participants)
                .then(|| next.participants.clone()),
            is_team: (base.is_team != next.is_team).then_some(next.is_team),
            widgets: (base.widgets != next.widgets).then(|| next.widgets.clone()),
            layouts: (base.layouts != next.layouts).then(|| next.layouts.clone()),
        }
    }

    /// Merge into a stored document.
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name.clone_from(name);
        }
        match &self.emoji {
            Some(Field::Set(emoji)) => project.emoji = Some(emoji.clone()),
            Some(Field::Delete) => project.emoji = None,
            None => {}
        }
        for (user, field) in &self.members {
            match field {
                Field::Set(role) => {
                    project.members.insert(user.clone(), *role);
                }
                Field::Delete => {
                    project.members.remove(user);
                }
            }
        }
        if let Some(participants) = &self.participants {
            project.participants.clone_from(participants);
        }
        if let Some(is_team) = self.is_team {
            project.is_team = is_team;
        }
        if let Some(widgets) = &self.widgets {
            project.widgets.clone_from(widgets);
        }
        if let Some(layouts) = &self.layouts {
            project.layouts.clone_from(layouts);
        }
    }
}

/// Row of a user's project list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub owner_id: UserId,
    pub is_team: bool,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            emoji: project.emoji.clone(),
            owner_id: project.owner_id.clone(),
            is_team: project.is_team,
        }
    }
}

/// One committed version of a project document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocSnapshot {
    /// Store write counter, starting at 1 on create.
    pub revision: u64,
    pub project: Arc<Project>,
}

impl DocSnapshot {
    pub fn new(revision: u64, project: Project) -> Self {
        Self {
            revision,
            project: Arc::new(project),
        }
    }

    #[inline]
    pub fn id(&self) -> ProjectId {
        self.project.id
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_of_identical_projects_is_empty() {
        let project = Project::new("alice", "Board");
        assert!(ProjectPatch::diff(&project, &project).is_empty());
    }

    #[test]
    fn test_diff_then_apply_reproduces_target() {
        let base = Project::new("alice", "Board");
        let mut next = base.clone();
        next.name = "Renamed".into();
        next.emoji = Some("🚀".into());
        next.members.insert("bob".into(), Role::Editor);
        next.participants.push("bob".into());

        let patch = ProjectPatch::diff(&base, &next);
        assert_eq!(patch.members.get("bob"), Some(&Field::Set(Role::Editor)));
        assert!(patch.widgets.is_none());

        let mut stored = base.clone();
        patch.apply_to(&mut stored);
        assert_eq!(stored, next);
    }

    #[test]
    fn test_delete_sentinels() {
        let mut base = Project::new("alice", "Board");
        base.emoji = Some("📌".into());
        base.members.insert("bob".into(), Role::Viewer);
        let mut next = base.clone();
        next.emoji = None;
        next.members.remove("bob");

        let patch = ProjectPatch::diff(&base, &next);
        assert_eq!(patch.emoji, Some(Field::Delete));
        assert_eq!(patch.members.get("bob"), Some(&Field::Delete));

        let mut stored = base;
        patch.apply_to(&mut stored);
        assert!(stored.emoji.is_none());
        assert!(!stored.members.contains_key("bob"));
    }

    #[test]
    fn test_omitted_fields_untouched() {
        let mut stored = Project::new("alice", "Board");
        stored.emoji = Some("📌".into());
        let patch = ProjectPatch {
            name: Some("Only name".into()),
            ..ProjectPatch::default()
        };
        patch.apply_to(&mut stored);
        assert_eq!(stored.name, "Only name");
        assert_eq!(stored.emoji.as_deref(), Some("📌"));
    }

    #[test]
    fn test_patch_wire_form() {
        let patch = ProjectPatch {
            emoji: Some(Field::Delete),
            ..ProjectPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "emoji": "delete" }));
    }
}
