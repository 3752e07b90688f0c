//! Demo state: one `Participant` per simulated user, all sharing a store.
//!
//! A participant pairs the user's sync controller (what they see) with their
//! editor (what they do). Edits always run against the controller's latest
//! snapshot, the same way a UI would.

use std::error::Error;
use std::sync::Arc;

use mosaic_collab::{
    EditOutcome, Editor, EditorConfig, EditorError, MemoryStore, StoreConfig, SyncConfig,
    SyncController, SyncError, SyncEvent,
};
use mosaic_core::{Breakpoint, EditOp, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Demo configuration, loadable from the JSON file named by `MOSAIC_CONFIG`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub store: StoreConfig,
    pub editor: EditorConfig,
    pub sync: SyncConfig,
}

impl DemoConfig {
    pub fn load() -> Result<Self, Box<dyn Error>> {
        match std::env::var("MOSAIC_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)?;
                let config = serde_json::from_str(&raw)?;
                log::info!("Loaded config from {path}");
                Ok(config)
            }
            Err(_) => Ok(Self::default()),
        }
    }
}

pub struct Participant {
    pub sync: SyncController<MemoryStore>,
    pub editor: Editor<MemoryStore>,
    events: mpsc::Receiver<SyncEvent>,
}

impl Participant {
    pub async fn join(
        store: &Arc<MemoryStore>,
        user: &str,
        config: &DemoConfig,
    ) -> Result<Self, Box<dyn Error>> {
        let mut sync = SyncController::new(store.clone(), user, config.sync.clone());
        let events = sync.take_event_rx().ok_or("event receiver already taken")?;
        sync.start().await?;
        let editor = Editor::new(store.clone(), config.editor.clone());
        Ok(Self {
            sync,
            editor,
            events,
        })
    }

    pub fn user(&self) -> &str {
        self.sync.user()
    }

    /// Apply an edit against the latest snapshot this participant has seen.
    pub async fn edit(&mut self, op: EditOp) -> Result<EditOutcome, Box<dyn Error>> {
        self.sync.drain().await?;
        let current = self
            .sync
            .current()
            .cloned()
            .ok_or(EditorError::NoActiveProject)?;
        let outcome = self.editor.apply(&self.sync.session(), &current, &op).await?;
        log::info!("{}: {} → {outcome:?}", self.user(), op.name());
        Ok(outcome)
    }

    pub async fn undo(&mut self) -> Result<(), Box<dyn Error>> {
        self.sync.drain().await?;
        match self.editor.undo(&self.sync.session()).await? {
            Some(snapshot) => log::info!("{}: undo → revision {}", self.user(), snapshot.revision),
            None => log::info!("{}: nothing to undo", self.user()),
        }
        Ok(())
    }

    pub async fn rename(&mut self, name: &str) -> Result<(), Box<dyn Error>> {
        self.sync.drain().await?;
        let current = self.sync.current().cloned().ok_or(EditorError::NoActiveProject)?;
        self.editor.rename(&self.sync.session(), &current, name).await?;
        Ok(())
    }

    pub async fn invite(&mut self, user: &str, role: Role) -> Result<(), Box<dyn Error>> {
        self.sync.drain().await?;
        let current = self.sync.current().cloned().ok_or(EditorError::NoActiveProject)?;
        self.editor.add_member(&self.sync.session(), &current, user, role).await?;
        Ok(())
    }

    /// Log every sync event received since the last call.
    pub fn log_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SyncEvent::ProjectsChanged(projects) => {
                    let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
                    log::info!("{}: projects {names:?}", self.sync.user());
                }
                SyncEvent::DocumentUpdated(snapshot) => {
                    log::debug!("{}: revision {}", self.sync.user(), snapshot.revision);
                }
                other => log::info!("{}: {other:?}", self.sync.user()),
            }
        }
    }

    /// Text rendering of the active project's `bp` grid.
    pub async fn describe(&mut self, bp: Breakpoint) -> Result<String, SyncError> {
        self.sync.drain().await?;
        let Some(snapshot) = self.sync.current() else {
            return Ok(format!("{}: no active project", self.user()));
        };
        let project = &snapshot.project;
        let mut out = format!(
            "{} sees \"{}\" r{} ({} widgets)\n",
            self.user(),
            project.name,
            snapshot.revision,
            project.widgets.len()
        );
        let tree = project.tree();
        for item in project.layouts.get(bp) {
            let Some(widget) = project.widget(item.id) else {
                continue;
            };
            out.push_str(&format!(
                "  {:<10} x={:<2} y={:<2} w={:<2} h={:<2}\n",
                format!("{:?}", widget.kind()),
                item.x,
                item.y,
                item.w,
                item.h
            ));
            let Some(folder) = widget.folder() else {
                continue;
            };
            for &child in tree.children_of(widget.id) {
                let kind = tree.get(child).map(|c| c.kind());
                let nested = folder.nested().and_then(|l| l.item(bp, child));
                if let (Some(kind), Some(n)) = (kind, nested) {
                    out.push_str(&format!(
                        "    └ {:<8} x={:<2} y={:<2} w={:<2} h={:<2}\n",
                        format!("{kind:?}"),
                        n.x,
                        n.y,
                        n.w,
                        n.h
                    ));
                }
            }
        }
        Ok(out)
    }
}
