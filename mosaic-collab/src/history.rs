//! Bounded undo stack of whole-project snapshots.
//!
//! One stack is shared by every project the user edits. Capacity is global:
//! once full, the oldest entry is evicted regardless of which project it
//! belongs to. Undo pops the most recent entry *for the active project*,
//! which is not necessarily the top of the stack.

use std::collections::VecDeque;

use mosaic_core::{Project, ProjectId};

/// Sanitized copy of a project taken before a structural edit.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub project_id: ProjectId,
    pub snapshot: Project,
}

impl HistoryEntry {
    pub fn new(snapshot: Project) -> Self {
        Self {
            project_id: snapshot.id,
            snapshot,
        }
    }
}

pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(20)
    }
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Push an entry, evicting the oldest if the stack is full.
    pub fn push(&mut self, entry: HistoryEntry) {
        while self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!(
                    "History: evicted oldest snapshot of {} (capacity {})",
                    evicted.project_id,
                    self.capacity
                );
            }
        }
        self.entries.push_back(entry);
    }

    /// Remove and return the most recent entry for `project_id`.
    pub fn pop_for(&mut self, project_id: ProjectId) -> Option<HistoryEntry> {
        let index = self
            .entries
            .iter()
            .rposition(|e| e.project_id == project_id)?;
        self.entries.remove(index)
    }

    /// Drop every entry of one project, e.g. after it was deleted.
    pub fn clear_project(&mut self, project_id: ProjectId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.project_id != project_id);
        before - self.entries.len()
    }

    pub fn depth_for(&self, project_id: ProjectId) -> usize {
        self.entries
            .iter()
            .filter(|e| e.project_id == project_id)
            .count()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
