//! Per-user edit pipeline.
//!
//! ```text
//!  EditOp ─▸ authorize ─▸ EditBridge ─▸ sanitize ─▸ ProjectPatch ─▸ DocumentStore
//!                              │                                        │
//!                              └── HistoryEntry (pushed once written) ◂─┘
//! ```
//!
//! The editor never holds project state of its own: every entry point takes
//! the caller's [`Session`] and the snapshot it is looking at, and the store's
//! change feed delivers the result back to every subscriber, the author
//! included.

use std::sync::Arc;

use mosaic_core::{
    sanitize, EditOp, Project, ProjectId, Role, SanitizeError, Session, UserId,
};
use mosaic_layout::{Applied, BridgeError, BridgeStats, EditBridge, Effect, GridMetrics, SolverConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{HistoryEntry, HistoryManager};
use crate::protocol::{DocSnapshot, ProjectPatch};
use crate::storage::{DocumentStore, StoreError};

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo entries kept across all projects (default: 20)
    pub history_capacity: usize,
    /// Send the snapshot's revision with every patch so concurrent writes
    /// surface as [`EditorError::ConcurrencyDrift`] (default: off, last
    /// writer wins)
    pub guard_writes: bool,
    pub solver: SolverConfig,
    pub metrics: GridMetrics,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            guard_writes: false,
            solver: SolverConfig::default(),
            metrics: GridMetrics::default(),
        }
    }
}

impl EditorConfig {
    pub fn for_testing() -> Self {
        Self {
            history_capacity: 20,
            guard_writes: false,
            solver: SolverConfig::for_testing(),
            metrics: GridMetrics::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("user {user} may not {action} project {project}")]
    PermissionDenied {
        user: UserId,
        project: ProjectId,
        action: &'static str,
    },

    #[error("no active project")]
    NoActiveProject,

    #[error("session is on project {active}, edit targets {target}")]
    WrongProject { active: ProjectId, target: ProjectId },

    #[error(transparent)]
    Serialization(#[from] SanitizeError),

    #[error("project {project} moved on: expected revision {expected}, found {actual}")]
    ConcurrencyDrift {
        project: ProjectId,
        expected: u64,
        actual: u64,
    },

    #[error("store: {0}")]
    Store(#[source] StoreError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl From<StoreError> for EditorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RevisionConflict {
                id,
                expected,
                actual,
            } => EditorError::ConcurrencyDrift {
                project: id,
                expected,
                actual,
            },
            other => EditorError::Store(other),
        }
    }
}

/// What an edit did to the stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied {
        revision: u64,
        effect: Option<Effect>,
    },
    /// Nothing to write (echo or no-op).
    Unchanged,
    /// A referenced widget is gone, typically removed by another editor.
    Skipped { missing: mosaic_core::WidgetId },
}

pub struct Editor<S> {
    store: Arc<S>,
    bridge: EditBridge,
    history: HistoryManager,
    config: EditorConfig,
}

impl<S: DocumentStore> Editor<S> {
    pub fn new(store: Arc<S>, config: EditorConfig) -> Self {
        let bridge = EditBridge::new(config.solver, config.metrics);
        Self::with_bridge(store, config, bridge)
    }

    /// Deterministic widget gradients.
    pub fn with_seed(store: Arc<S>, config: EditorConfig, seed: u64) -> Self {
        let bridge = EditBridge::with_seed(config.solver, config.metrics, seed);
        Self::with_bridge(store, config, bridge)
    }

    fn with_bridge(store: Arc<S>, config: EditorConfig, bridge: EditBridge) -> Self {
        Self {
            store,
            bridge,
            history: HistoryManager::new(config.history_capacity),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn bridge_stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ───────────────────── widget edits ─────────────────────

    /// Apply one edit against `current` and write the result.
    ///
    /// Structural ops push a sanitized snapshot of `current` onto the undo
    /// stack, but only once the write has succeeded.
    pub async fn apply(
        &mut self,
        session: &Session,
        current: &DocSnapshot,
        op: &EditOp,
    ) -> Result<EditOutcome, EditorError> {
        check_active(session, current)?;
        require_editor(session, &current.project, op.name())?;

        let (next, effect) = match self.bridge.apply(&current.project, op)? {
            Applied::Changed { project, effect } => (project, effect),
            Applied::Unchanged => return Ok(EditOutcome::Unchanged),
            Applied::Skipped { missing } => return Ok(EditOutcome::Skipped { missing }),
        };

        let entry = match op.pushes_history() {
            true => Some(HistoryEntry::new(sanitize(&current.project)?)),
            false => None,
        };

        let Some(written) = self.write(current, &next, op.name()).await? else {
            return Ok(EditOutcome::Unchanged);
        };
        if let Some(entry) = entry {
            self.history.push(entry);
        }
        Ok(EditOutcome::Applied {
            revision: written.revision,
            effect,
        })
    }

    /// Restore the most recent snapshot of the active project.
    ///
    /// Returns `None` when there is nothing to undo for that project.
    pub async fn undo(&mut self, session: &Session) -> Result<Option<DocSnapshot>, EditorError> {
        let active = session.active_project_id.ok_or(EditorError::NoActiveProject)?;
        let current = self.store.get(active).await?;
        require_editor(session, &current.project, "undo")?;

        let Some(entry) = self.history.pop_for(active) else {
            log::debug!("Editor: nothing to undo for {active}");
            return Ok(None);
        };

        match self.store.replace(active, entry.snapshot.clone()).await {
            Ok(snapshot) => {
                log::info!("Editor: undo on {active} → revision {}", snapshot.revision);
                Ok(Some(snapshot))
            }
            Err(e) => {
                log::warn!("Editor: undo on {active} failed: {e}");
                self.history.push(entry);
                Err(e.into())
            }
        }
    }

    // ───────────────────── project administration ─────────────────────

    pub async fn rename(
        &mut self,
        session: &Session,
        current: &DocSnapshot,
        name: impl Into<String>,
    ) -> Result<EditOutcome, EditorError> {
        check_active(session, current)?;
        require_editor(session, &current.project, "rename")?;
        let mut next = Project::clone(&current.project);
        next.name = name.into();
        self.write_admin(current, &next, "rename").await
    }

    /// Set the emoji, or clear it with `None`.
    pub async fn set_emoji(
        &mut self,
        session: &Session,
        current: &DocSnapshot,
        emoji: Option<String>,
    ) -> Result<EditOutcome, EditorError> {
        check_active(session, current)?;
        require_editor(session, &current.project, "set the emoji of")?;
        let mut next = Project::clone(&current.project);
        next.emoji = emoji;
        self.write_admin(current, &next, "set-emoji").await
    }

    /// Grant `role` to `user` and add them to the participants.
    pub async fn add_member(
        &mut self,
        session: &Session,
        current: &DocSnapshot,
        user: impl Into<UserId>,
        role: Role,
    ) -> Result<EditOutcome, EditorError> {
        check_active(session, current)?;
        require_owner(session, &current.project, "manage members of")?;
        if role == Role::Owner {
            return Err(denied(session, &current.project, "grant ownership of"));
        }

        let user = user.into();
        let mut next = Project::clone(&current.project);
        next.members.insert(user.clone(), role);
        if !next.participants.contains(&user) {
            next.participants.push(user);
        }
        self.write_admin(current, &next, "add-member").await
    }

    /// Revoke `user`'s role and drop them from the participants.
    pub async fn remove_member(
        &mut self,
        session: &Session,
        current: &DocSnapshot,
        user: &str,
    ) -> Result<EditOutcome, EditorError> {
        check_active(session, current)?;
        require_owner(session, &current.project, "manage members of")?;
        if current.project.owner_id == user {
            return Err(denied(session, &current.project, "remove the owner of"));
        }

        let mut next = Project::clone(&current.project);
        next.members.remove(user);
        next.participants.retain(|p| p != user);
        self.write_admin(current, &next, "remove-member").await
    }

    /// Owner-only. Also drops the project's undo entries.
    pub async fn delete_project(
        &mut self,
        session: &Session,
        current: &DocSnapshot,
    ) -> Result<(), EditorError> {
        require_owner(session, &current.project, "delete")?;
        let id = current.id();
        self.store.delete(id).await?;
        let dropped = self.history.clear_project(id);
        log::info!("Editor: deleted project {id} ({dropped} undo entries dropped)");
        Ok(())
    }

    // ───────────────────── writes ─────────────────────

    async fn write_admin(
        &mut self,
        current: &DocSnapshot,
        next: &Project,
        action: &'static str,
    ) -> Result<EditOutcome, EditorError> {
        Ok(match self.write(current, next, action).await? {
            Some(written) => EditOutcome::Applied {
                revision: written.revision,
                effect: None,
            },
            None => EditOutcome::Unchanged,
        })
    }

    /// Patch the store with the difference between `current` and `next`.
    /// `None` when the sanitized versions are identical.
    async fn write(
        &self,
        current: &DocSnapshot,
        next: &Project,
        action: &'static str,
    ) -> Result<Option<DocSnapshot>, EditorError> {
        let next = sanitize(next)?;
        let patch = ProjectPatch::diff(&current.project, &next);
        if patch.is_empty() {
            log::debug!("Editor: {action} on {} is an echo, not written", current.id());
            return Ok(None);
        }

        let guard = self.config.guard_writes.then_some(current.revision);
        match self.store.patch(current.id(), patch, guard).await {
            Ok(written) => Ok(Some(written)),
            Err(e) => {
                log::warn!("Editor: {action} on {} failed: {e}", current.id());
                Err(e.into())
            }
        }
    }
}

// ───────────────────── authorization ─────────────────────

fn check_active(session: &Session, current: &DocSnapshot) -> Result<(), EditorError> {
    match session.active_project_id {
        None => Err(EditorError::NoActiveProject),
        Some(active) if active != current.id() => Err(EditorError::WrongProject {
            active,
            target: current.id(),
        }),
        Some(_) => Ok(()),
    }
}

fn denied(session: &Session, project: &Project, action: &'static str) -> EditorError {
    EditorError::PermissionDenied {
        user: session.current_user_id.clone(),
        project: project.id,
        action,
    }
}

/// The stored document's role is authoritative; the session's may be stale.
fn require_editor(session: &Session, project: &Project, action: &'static str) -> Result<(), EditorError> {
    match project.role_of(&session.current_user_id) {
        Some(role) if role.can_edit() => Ok(()),
        _ => Err(denied(session, project, action)),
    }
}

fn require_owner(session: &Session, project: &Project, action: &'static str) -> Result<(), EditorError> {
    match project.role_of(&session.current_user_id) {
        Some(Role::Owner) => Ok(()),
        _ => Err(denied(session, project, action)),
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreConfig};
    use mosaic_core::{Breakpoint, WidgetKind};

    async fn setup() -> (Arc<MemoryStore>, Editor<MemoryStore>, Session, DocSnapshot) {
        let store = Arc::new(MemoryStore::new(StoreConfig::for_testing()));
        let project = Project::new("alice", "Board");
        let snapshot = store.create(project.clone()).await.unwrap();
        let session = Session::for_project("alice", &project).unwrap();
        let editor = Editor::with_seed(store.clone(), EditorConfig::for_testing(), 7);
        (store, editor, session, snapshot)
    }

    fn add(kind: WidgetKind) -> EditOp {
        EditOp::AddWidget {
            kind,
            parent_id: None,
        }
    }

    #[tokio::test]
    async fn test_add_writes_and_pushes_history() {
        let (store, mut editor, session, snap) = setup().await;
        let outcome = editor.apply(&session, &snap, &add(WidgetKind::Note)).await.unwrap();

        let EditOutcome::Applied { revision, effect } = outcome else {
            panic!("expected a write, got {outcome:?}");
        };
        assert_eq!(revision, 2);
        let stored = store.get(snap.id()).await.unwrap();
        let widget = &stored.project.widgets[0];
        assert_eq!(effect, Some(Effect::ScrollTo(widget.id)));
        assert!(stored.project.layouts.item(Breakpoint::Lg, widget.id).is_some());
        assert_eq!(editor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_update_data_does_not_push_history() {
        let (store, mut editor, session, snap) = setup().await;
        editor.apply(&session, &snap, &add(WidgetKind::Link)).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        let widget = snap.project.widgets[0].clone();

        let mut data = widget.data.clone();
        if let mosaic_core::WidgetData::Link(link) = &mut data {
            link.url = "https://example.com".into();
        }
        let op = EditOp::UpdateData {
            id: widget.id,
            data,
            assigned_user: mosaic_core::AssignUpdate::Assign("alice".into()),
        };
        let outcome = editor.apply(&session, &snap, &op).await.unwrap();
        assert!(matches!(outcome, EditOutcome::Applied { effect: None, .. }));
        assert_eq!(editor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_viewer_is_denied() {
        let (store, mut editor, _, snap) = setup().await;
        let mut project = Project::clone(&snap.project);
        project.members.insert("victor".into(), Role::Viewer);
        let snap = store.replace(snap.id(), project).await.unwrap();

        // Session claims editor rights; the document says viewer.
        let session = Session::new("victor", Some(snap.id()), Role::Editor);
        let err = editor.apply(&session, &snap, &add(WidgetKind::Note)).await.unwrap_err();
        assert!(matches!(err, EditorError::PermissionDenied { .. }));
        assert_eq!(store.get(snap.id()).await.unwrap().revision, snap.revision);
    }

    #[tokio::test]
    async fn test_failed_write_discards_history_push() {
        let (store, _, session, snap) = setup().await;
        let config = EditorConfig {
            guard_writes: true,
            ..EditorConfig::for_testing()
        };
        let mut editor = Editor::with_seed(store.clone(), config, 1);

        editor.apply(&session, &snap, &add(WidgetKind::Note)).await.unwrap();
        // Same stale snapshot again.
        let err = editor.apply(&session, &snap, &add(WidgetKind::Note)).await.unwrap_err();
        assert!(matches!(
            err,
            EditorError::ConcurrencyDrift {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(editor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_undo_restores_snapshot() {
        let (store, mut editor, session, snap) = setup().await;
        editor.apply(&session, &snap, &add(WidgetKind::Note)).await.unwrap();

        let restored = editor.undo(&session).await.unwrap().unwrap();
        assert_eq!(*restored.project, sanitize(&snap.project).unwrap());
        assert!(editor.undo(&session).await.unwrap().is_none());
        assert_eq!(store.get(snap.id()).await.unwrap().revision, 3);
    }

    #[tokio::test]
    async fn test_undo_without_active_project() {
        let (_, mut editor, _, _) = setup().await;
        let session = Session::new("alice", None, Role::Owner);
        assert!(matches!(
            editor.undo(&session).await,
            Err(EditorError::NoActiveProject)
        ));
    }

    #[tokio::test]
    async fn test_wrong_project_rejected() {
        let (store, mut editor, session, _) = setup().await;
        let other = store.create(Project::new("alice", "Other")).await.unwrap();
        let err = editor.apply(&session, &other, &add(WidgetKind::Note)).await.unwrap_err();
        assert!(matches!(err, EditorError::WrongProject { .. }));
    }

    #[tokio::test]
    async fn test_admin_edits() {
        let (store, mut editor, session, snap) = setup().await;
        editor.rename(&session, &snap, "Renamed").await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        editor.set_emoji(&session, &snap, Some("🚀".into())).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        editor.add_member(&session, &snap, "bob", Role::Editor).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();

        assert_eq!(snap.project.name, "Renamed");
        assert_eq!(snap.project.emoji.as_deref(), Some("🚀"));
        assert_eq!(snap.project.role_of("bob"), Some(Role::Editor));
        assert!(snap.project.participants.contains(&"bob".to_string()));
        // Field edits never touch the undo stack.
        assert!(editor.history().is_empty());

        editor.set_emoji(&session, &snap, None).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        editor.remove_member(&session, &snap, "bob").await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        assert!(snap.project.emoji.is_none());
        assert_eq!(snap.project.role_of("bob"), None);
        assert_eq!(snap.project.participants, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_rename_to_same_name_is_unchanged() {
        let (_, mut editor, session, snap) = setup().await;
        let outcome = editor.rename(&session, &snap, "Board").await.unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_member_rules() {
        let (store, mut editor, session, snap) = setup().await;
        let err = editor.add_member(&session, &snap, "bob", Role::Owner).await.unwrap_err();
        assert!(matches!(err, EditorError::PermissionDenied { .. }));
        let err = editor.remove_member(&session, &snap, "alice").await.unwrap_err();
        assert!(matches!(err, EditorError::PermissionDenied { .. }));

        editor.add_member(&session, &snap, "bob", Role::Editor).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        let bob = Session::for_project("bob", &snap.project).unwrap();
        let err = editor.add_member(&bob, &snap, "carol", Role::Viewer).await.unwrap_err();
        assert!(matches!(err, EditorError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_owner_only() {
        let (store, mut editor, session, snap) = setup().await;
        editor.add_member(&session, &snap, "bob", Role::Editor).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();
        editor.apply(&session, &snap, &add(WidgetKind::Note)).await.unwrap();
        let snap = store.get(snap.id()).await.unwrap();

        let bob = Session::for_project("bob", &snap.project).unwrap();
        let err = editor.delete_project(&bob, &snap).await.unwrap_err();
        assert!(matches!(err, EditorError::PermissionDenied { action: "delete", .. }));

        editor.delete_project(&session, &snap).await.unwrap();
        assert!(store.get(snap.id()).await.is_err());
        assert!(editor.history().is_empty());
    }
}
