//! # mosaic-collab — multi-user editing of Mosaic projects
//!
//! Connects the layout engine to a shared document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ProjectPatch    ┌──────────────┐
//! │ Editor         │ ────────────────► │ DocumentStore│
//! │ (per user)     │   replace (undo)  │ (remote)     │
//! └───────┬────────┘                   └──────┬───────┘
//!         │ HistoryManager                    │ ChangeFeed
//!         ▼                                   ▼
//! ┌────────────────┐                   ┌──────────────┐
//! │ Undo snapshots │                   │ SyncController│
//! │ (bounded)      │                   │ (per user)    │
//! └────────────────┘                   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — merge patches, project summaries, revisioned snapshots
//! - [`broadcast`] — per-key fan-out of whole snapshots
//! - [`storage`] — `DocumentStore` trait and the in-process `MemoryStore`
//! - [`history`] — bounded undo stack shared across projects
//! - [`editor`] — authorize, apply, sanitize, write
//! - [`client`] — live project list and active-document tracking

pub mod broadcast;
pub mod client;
pub mod editor;
pub mod history;
pub mod protocol;
pub mod storage;

// Re-exports for convenience
pub use broadcast::{ChangeFeed, FeedRegistry, FeedStats, Subscription};
pub use client::{reconcile_active, Reconciled, SyncConfig, SyncController, SyncError, SyncEvent};
pub use editor::{EditOutcome, Editor, EditorConfig, EditorError};
pub use history::{HistoryEntry, HistoryManager};
pub use protocol::{DocSnapshot, Field, ProjectPatch, ProjectSummary};
pub use storage::{DocumentStore, MemoryStore, StoreConfig, StoreError};
