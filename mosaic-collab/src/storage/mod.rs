//! Document store interface.
//!
//! Architecture:
//! ```text
//! ┌─────────────┐   ProjectPatch    ┌──────────────┐
//! │ Editor      │ ────────────────► │ DocumentStore│
//! │ (per user)  │   replace (undo)  │ (remote)     │
//! └─────────────┘                   └──────┬───────┘
//!                                          │ live queries
//!        ┌─────────────────────────────────┴───────┐
//!        ▼                                         ▼
//! ┌──────────────────────┐        ┌──────────────────────────┐
//! │ subscribe_list(user) │        │ subscribe_doc(project)   │
//! │ Vec<ProjectSummary>  │        │ DocSnapshot per revision │
//! └──────────────────────┘        └──────────────────────────┘
//! ```
//!
//! The store is an opaque key → document service. Every write bumps the
//! document's revision; `patch` can be guarded by an expected revision so
//! a concurrent write surfaces as a conflict instead of being clobbered.

pub mod memory;

use std::future::Future;

use mosaic_core::{Project, ProjectId};

use crate::broadcast::Subscription;
use crate::protocol::{DocSnapshot, ProjectPatch, ProjectSummary};

pub use memory::{MemoryStore, StoreConfig};

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Document not found
    NotFound(ProjectId),
    /// A document with this id already exists
    AlreadyExists(ProjectId),
    /// Guarded write found a newer revision
    RevisionConflict {
        id: ProjectId,
        expected: u64,
        actual: u64,
    },
    /// Document could not be brought into stored form
    SerializationError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Document not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "Document already exists: {id}"),
            StoreError::RevisionConflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "Revision conflict on {id}: expected {expected}, found {actual}"
            ),
            StoreError::SerializationError(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<mosaic_core::SanitizeError> for StoreError {
    fn from(e: mosaic_core::SanitizeError) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}

/// Remote key → document service holding projects.
pub trait DocumentStore: Send + Sync {
    /// Live list of the projects `participant` takes part in.
    fn subscribe_list(
        &self,
        participant: &str,
    ) -> impl Future<Output = Subscription<Vec<ProjectSummary>>> + Send;

    /// Live view of one document. The first item is the current snapshot.
    fn subscribe_doc(
        &self,
        id: ProjectId,
    ) -> impl Future<Output = Result<Subscription<DocSnapshot>, StoreError>> + Send;

    fn get(&self, id: ProjectId) -> impl Future<Output = Result<DocSnapshot, StoreError>> + Send;

    fn create(&self, project: Project)
        -> impl Future<Output = Result<DocSnapshot, StoreError>> + Send;

    /// Merge write. With `expected_revision` set, fails with
    /// [`StoreError::RevisionConflict`] unless the stored revision matches.
    fn patch(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
        expected_revision: Option<u64>,
    ) -> impl Future<Output = Result<DocSnapshot, StoreError>> + Send;

    /// Overwrite the whole document.
    fn replace(
        &self,
        id: ProjectId,
        project: Project,
    ) -> impl Future<Output = Result<DocSnapshot, StoreError>> + Send;

    fn delete(&self, id: ProjectId) -> impl Future<Output = Result<(), StoreError>> + Send;
}
