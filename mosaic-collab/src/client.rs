//! Project sync controller.
//!
//! Follows two live queries on behalf of one user:
//! - the list of projects the user participates in,
//! - the active project's document.
//!
//! Every remote snapshot wholesale-replaces local state. When the active
//! project drops out of the list (deleted, or the user was removed) the
//! controller falls back to the first remaining project, or creates a
//! default project when none is left.

use std::sync::Arc;

use mosaic_core::{Project, ProjectId, Role, Session, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::broadcast::Subscription;
use crate::protocol::{DocSnapshot, ProjectSummary};
use crate::storage::{DocumentStore, StoreError};

/// Sync controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name of the project created for a user with none
    pub default_project_name: String,
    pub default_project_emoji: Option<String>,
    /// Buffered events before new ones are dropped (default: 64)
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_project_name: "My Dashboard".to_string(),
            default_project_emoji: Some("✨".to_string()),
            event_capacity: 64,
        }
    }
}

impl SyncConfig {
    pub fn for_testing() -> Self {
        Self {
            event_capacity: 256,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("project {0} is not in the user's project list")]
    UnknownProject(ProjectId),
}

/// Events emitted by the sync controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The user's project list changed
    ProjectsChanged(Vec<ProjectSummary>),
    /// Active project switched (or cleared)
    ActiveProjectChanged(Option<ProjectId>),
    /// New snapshot of the active project
    DocumentUpdated(DocSnapshot),
    /// Default project created for a user with no projects
    DefaultProjectCreated(ProjectId),
    /// The active project's document feed ended
    DocumentClosed(ProjectId),
}

/// What to do with the active pointer after a list update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Keep,
    Switch(ProjectId),
    CreateDefault,
}

/// Decide the active project for a freshly received list.
///
/// `pending` is a project this controller created that the list may not
/// show yet; it stays active until the list catches up.
pub fn reconcile_active(
    active: Option<ProjectId>,
    pending: Option<ProjectId>,
    projects: &[ProjectSummary],
) -> Reconciled {
    if let Some(id) = active {
        if pending == Some(id) || projects.iter().any(|p| p.id == id) {
            return Reconciled::Keep;
        }
    }
    match projects.first() {
        Some(first) => Reconciled::Switch(first.id),
        None if pending.is_some() => Reconciled::Keep,
        None => Reconciled::CreateDefault,
    }
}

enum Update {
    List(Option<Vec<ProjectSummary>>),
    Doc(Option<DocSnapshot>),
}

pub struct SyncController<S> {
    store: Arc<S>,
    user: UserId,
    config: SyncConfig,

    list: Option<Subscription<Vec<ProjectSummary>>>,
    doc: Option<Subscription<DocSnapshot>>,

    projects: Vec<ProjectSummary>,
    active: Option<ProjectId>,
    /// Created here, not yet seen in the list
    pending: Option<ProjectId>,
    current: Option<DocSnapshot>,

    event_tx: mpsc::Sender<SyncEvent>,
    event_rx: Option<mpsc::Receiver<SyncEvent>>,
}

impl<S: DocumentStore> SyncController<S> {
    pub fn new(store: Arc<S>, user: impl Into<UserId>, config: SyncConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        Self {
            store,
            user: user.into(),
            config,
            list: None,
            doc: None,
            projects: Vec::new(),
            active: None,
            pending: None,
            current: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<SyncEvent>> {
        self.event_rx.take()
    }

    /// Subscribe to the user's project list and settle the active project.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        let mut list = self.store.subscribe_list(&self.user).await;
        let initial = list.try_next();
        self.list = Some(list);
        if let Some(projects) = initial {
            self.on_list(projects).await?;
        }
        log::info!("Sync: started for {}", self.user);
        Ok(())
    }

    /// Wait for the next remote update and apply it.
    ///
    /// Returns `false` once both subscriptions have ended.
    pub async fn process_next(&mut self) -> Result<bool, SyncError> {
        if self.list.is_none() && self.doc.is_none() {
            return Ok(false);
        }
        let update = tokio::select! {
            biased;
            list = next_or_pending(&mut self.list) => Update::List(list),
            doc = next_or_pending(&mut self.doc) => Update::Doc(doc),
        };
        self.apply_update(update).await?;
        Ok(true)
    }

    /// Apply every update that is already buffered. Returns how many were
    /// applied.
    pub async fn drain(&mut self) -> Result<usize, SyncError> {
        let mut applied = 0;
        loop {
            let update = if let Some(list) = self.list.as_mut().and_then(|s| s.try_next()) {
                Update::List(Some(list))
            } else if let Some(doc) = self.doc.as_mut().and_then(|s| s.try_next()) {
                Update::Doc(Some(doc))
            } else if self.doc.as_ref().is_some_and(|s| s.is_closed()) {
                Update::Doc(None)
            } else {
                return Ok(applied);
            };
            self.apply_update(update).await?;
            applied += 1;
        }
    }

    /// Explicit switch to a project from the user's list.
    pub async fn select_project(&mut self, id: ProjectId) -> Result<(), SyncError> {
        let known = self.projects.iter().any(|p| p.id == id) || self.pending == Some(id);
        if !known {
            return Err(SyncError::UnknownProject(id));
        }
        self.activate(Some(id)).await
    }

    /// Create a project owned by this user and make it active.
    pub async fn create_project(
        &mut self,
        name: impl Into<String>,
        emoji: Option<String>,
    ) -> Result<ProjectId, SyncError> {
        let mut project = Project::new(self.user.clone(), name);
        project.emoji = emoji;
        let snapshot = self.store.create(project).await?;
        let id = snapshot.id();
        log::info!("Sync: {} created project {id}", self.user);
        self.pending = Some(id);
        self.activate(Some(id)).await?;
        Ok(id)
    }

    /// The session edits should run under. Until the active document has
    /// arrived the role is unknown and reported as viewer.
    pub fn session(&self) -> Session {
        let role = self
            .current
            .as_ref()
            .and_then(|snap| snap.project.role_of(&self.user))
            .unwrap_or(Role::Viewer);
        Session::new(self.user.clone(), self.active, role)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn active(&self) -> Option<ProjectId> {
        self.active
    }

    /// Latest snapshot of the active project.
    pub fn current(&self) -> Option<&DocSnapshot> {
        self.current.as_ref()
    }

    pub fn projects(&self) -> &[ProjectSummary] {
        &self.projects
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ───────────────────── update handling ─────────────────────

    async fn apply_update(&mut self, update: Update) -> Result<(), SyncError> {
        match update {
            Update::List(Some(projects)) => self.on_list(projects).await,
            Update::List(None) => {
                log::warn!("Sync: project list feed for {} ended", self.user);
                self.list = None;
                Ok(())
            }
            Update::Doc(Some(snapshot)) => {
                self.on_doc(snapshot);
                Ok(())
            }
            Update::Doc(None) => {
                self.on_doc_closed();
                Ok(())
            }
        }
    }

    async fn on_list(&mut self, projects: Vec<ProjectSummary>) -> Result<(), SyncError> {
        if self.pending.is_some_and(|id| projects.iter().any(|p| p.id == id)) {
            self.pending = None;
        }
        self.projects = projects.clone();
        self.emit(SyncEvent::ProjectsChanged(projects));

        match reconcile_active(self.active, self.pending, &self.projects) {
            Reconciled::Keep => Ok(()),
            Reconciled::Switch(id) => {
                if self.active.is_some() {
                    log::info!("Sync: active project gone for {}, falling back to {id}", self.user);
                }
                self.activate(Some(id)).await
            }
            Reconciled::CreateDefault => self.create_default().await,
        }
    }

    fn on_doc(&mut self, snapshot: DocSnapshot) {
        if self.active != Some(snapshot.id()) {
            return;
        }
        let stale = self
            .current
            .as_ref()
            .is_some_and(|cur| cur.revision >= snapshot.revision);
        if stale {
            return;
        }
        self.current = Some(snapshot.clone());
        self.emit(SyncEvent::DocumentUpdated(snapshot));
    }

    fn on_doc_closed(&mut self) {
        self.doc = None;
        self.current = None;
        if let Some(id) = self.active {
            log::debug!("Sync: document feed for {id} ended");
            self.emit(SyncEvent::DocumentClosed(id));
        }
    }

    async fn create_default(&mut self) -> Result<(), SyncError> {
        let name = self.config.default_project_name.clone();
        let emoji = self.config.default_project_emoji.clone();
        let id = self.create_project(name, emoji).await?;
        self.emit(SyncEvent::DefaultProjectCreated(id));
        Ok(())
    }

    async fn activate(&mut self, id: Option<ProjectId>) -> Result<(), SyncError> {
        if self.active == id && (id.is_none() || self.doc.is_some()) {
            return Ok(());
        }
        self.active = id;
        self.doc = None;
        self.current = None;

        if let Some(id) = id {
            match self.store.subscribe_doc(id).await {
                Ok(mut sub) => {
                    let initial = sub.try_next();
                    self.doc = Some(sub);
                    if let Some(snapshot) = initial {
                        self.current = Some(snapshot);
                    }
                }
                // Deleted between list update and subscribe; the next list
                // update moves the pointer on.
                Err(StoreError::NotFound(_)) => {
                    log::debug!("Sync: project {id} vanished before subscribe");
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::info!("Sync: {} active project → {id:?}", self.user);
        self.emit(SyncEvent::ActiveProjectChanged(id));
        if let Some(snapshot) = self.current.clone() {
            self.emit(SyncEvent::DocumentUpdated(snapshot));
        }
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            // Receiver still held here: nobody is listening yet.
            if self.event_rx.is_none() {
                log::warn!("Sync: event dropped: {e}");
            } else {
                log::debug!("Sync: event dropped before the receiver was taken: {e}");
            }
        }
    }
}

async fn next_or_pending<T: Clone>(sub: &mut Option<Subscription<T>>) -> Option<T> {
    match sub {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

// ===================================================================
// Tests
// ===================================================================
