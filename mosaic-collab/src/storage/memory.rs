//! In-process document store.
//!
//! Holds every project in memory and fans committed snapshots out through
//! per-project and per-user feeds. Writes are stored in sanitized form, as
//! the remote store would hold them, so subscribers never observe fields
//! the remote could not represent.
//!
//! Lock order is always documents → feeds, and feeds are published while
//! the documents lock is held, so every subscriber sees commits in order.

use mosaic_core::{sanitize, Project, ProjectId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError};
use crate::broadcast::{FeedRegistry, Subscription};
use crate::protocol::{DocSnapshot, ProjectPatch, ProjectSummary};

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshots buffered per subscriber before it starts skipping (default: 64)
    pub feed_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { feed_capacity: 64 }
    }
}

impl StoreConfig {
    /// Small buffers so lag paths are reachable in tests.
    pub fn for_testing() -> Self {
        Self { feed_capacity: 8 }
    }
}

struct StoredDoc {
    snapshot: DocSnapshot,
    /// Creation order, used to order project lists.
    seq: u64,
}

pub struct MemoryStore {
    docs: RwLock<HashMap<ProjectId, StoredDoc>>,
    doc_feeds: FeedRegistry<ProjectId, DocSnapshot>,
    list_feeds: FeedRegistry<UserId, Vec<ProjectSummary>>,
    /// Creation sequence
    sequence: AtomicU64,
    /// Committed writes, all documents
    writes: AtomicU64,
    config: StoreConfig,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            doc_feeds: FeedRegistry::new(config.feed_capacity),
            list_feeds: FeedRegistry::new(config.feed_capacity),
            sequence: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Total committed writes since the store was created.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn document_count(&self) -> usize {
        self.docs.read().await.len()
    }

    // ───────────────────── helpers ─────────────────────

    fn list_for(docs: &HashMap<ProjectId, StoredDoc>, user: &str) -> Vec<ProjectSummary> {
        let mut rows: Vec<&StoredDoc> = docs
            .values()
            .filter(|d| d.snapshot.project.participants.iter().any(|p| p == user))
            .collect();
        rows.sort_by_key(|d| d.seq);
        rows.iter()
            .map(|d| ProjectSummary::from(d.snapshot.project.as_ref()))
            .collect()
    }

    /// Re-publish project lists for every user whose list may have changed
    /// between `before` and `after`.
    async fn publish_lists(
        &self,
        docs: &HashMap<ProjectId, StoredDoc>,
        before: Option<&Project>,
        after: Option<&Project>,
    ) {
        let summary_changed =
            before.map(ProjectSummary::from) != after.map(ProjectSummary::from);
        let participants_changed =
            before.map(|p| &p.participants) != after.map(|p| &p.participants);
        if !summary_changed && !participants_changed {
            return;
        }

        let users: BTreeSet<&UserId> = before
            .into_iter()
            .chain(after)
            .flat_map(|p| p.participants.iter())
            .collect();
        for user in users {
            self.list_feeds
                .publish(user, Self::list_for(docs, user))
                .await;
        }
    }

    fn committed(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

impl DocumentStore for MemoryStore {
    async fn subscribe_list(&self, participant: &str) -> Subscription<Vec<ProjectSummary>> {
        let docs = self.docs.read().await;
        let current = Self::list_for(&docs, participant);
        let key = participant.to_string();
        let feed = self.list_feeds.get_or_create(&key).await;
        feed.subscribe(current, format!("projects:{participant}"))
    }

    async fn subscribe_doc(&self, id: ProjectId) -> Result<Subscription<DocSnapshot>, StoreError> {
        let docs = self.docs.read().await;
        let current = docs
            .get(&id)
            .map(|d| d.snapshot.clone())
            .ok_or(StoreError::NotFound(id))?;
        let feed = self.doc_feeds.get_or_create(&id).await;
        Ok(feed.subscribe(current, format!("project:{id}")))
    }

    async fn get(&self, id: ProjectId) -> Result<DocSnapshot, StoreError> {
        let docs = self.docs.read().await;
        docs.get(&id)
            .map(|d| d.snapshot.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, project: Project) -> Result<DocSnapshot, StoreError> {
        let mut docs = self.docs.write().await;
        let id = project.id;
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        let snapshot = DocSnapshot::new(1, sanitize(&project)?);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        docs.insert(
            id,
            StoredDoc {
                snapshot: snapshot.clone(),
                seq,
            },
        );
        self.committed();
        log::debug!("MemoryStore: created {id}");

        self.publish_lists(&docs, None, Some(&snapshot.project)).await;
        Ok(snapshot)
    }

    async fn patch(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
        expected_revision: Option<u64>,
    ) -> Result<DocSnapshot, StoreError> {
        let mut docs = self.docs.write().await;
        let stored = docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let actual = stored.snapshot.revision;
        if let Some(expected) = expected_revision {
            if expected != actual {
                return Err(StoreError::RevisionConflict {
                    id,
                    expected,
                    actual,
                });
            }
        }

        let before = stored.snapshot.project.clone();
        let mut project = Project::clone(&before);
        patch.apply_to(&mut project);
        let snapshot = DocSnapshot::new(actual + 1, sanitize(&project)?);
        stored.snapshot = snapshot.clone();
        self.committed();

        self.doc_feeds.publish(&id, snapshot.clone()).await;
        self.publish_lists(&docs, Some(&before), Some(&snapshot.project))
            .await;
        Ok(snapshot)
    }

    async fn replace(&self, id: ProjectId, mut project: Project) -> Result<DocSnapshot, StoreError> {
        let mut docs = self.docs.write().await;
        let stored = docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        project.id = id;

        let before = stored.snapshot.project.clone();
        let snapshot = DocSnapshot::new(stored.snapshot.revision + 1, sanitize(&project)?);
        stored.snapshot = snapshot.clone();
        self.committed();

        self.doc_feeds.publish(&id, snapshot.clone()).await;
        self.publish_lists(&docs, Some(&before), Some(&snapshot.project))
            .await;
        Ok(snapshot)
    }

    async fn delete(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        let removed = docs.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.committed();
        log::debug!("MemoryStore: deleted {id}");

        self.doc_feeds.close(&id).await;
        self.publish_lists(&docs, Some(&removed.snapshot.project), None)
            .await;
        Ok(())
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Field;
    use mosaic_core::{LinkData, Role, Widget, WidgetData, WidgetKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store() -> MemoryStore {
        MemoryStore::new(StoreConfig::for_testing())
    }

    fn rename(name: &str) -> ProjectPatch {
        ProjectPatch {
            name: Some(name.into()),
            ..ProjectPatch::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let project = Project::new("alice", "Board");
        let created = store.create(project.clone()).await.unwrap();
        assert_eq!(created.revision, 1);

        let fetched = store.get(project.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = store();
        let project = Project::new("alice", "Board");
        store.create(project.clone()).await.unwrap();
        let err = store.create(project.clone()).await.unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists(project.id));
    }

    #[tokio::test]
    async fn test_patch_bumps_revision() {
        let store = store();
        let project = Project::new("alice", "Board");
        store.create(project.clone()).await.unwrap();

        let snap = store.patch(project.id, rename("Renamed"), None).await.unwrap();
        assert_eq!(snap.revision, 2);
        assert_eq!(snap.project.name, "Renamed");
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_guarded_patch_detects_conflict() {
        let store = store();
        let project = Project::new("alice", "Board");
        store.create(project.clone()).await.unwrap();
        store.patch(project.id, rename("First"), Some(1)).await.unwrap();

        let err = store
            .patch(project.id, rename("Stale"), Some(1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::RevisionConflict {
                id: project.id,
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(store.get(project.id).await.unwrap().project.name, "First");
    }

    #[tokio::test]
    async fn test_missing_documents() {
        let store = store();
        let id = uuid::Uuid::new_v4();
        assert_eq!(store.get(id).await.unwrap_err(), StoreError::NotFound(id));
        assert!(store.subscribe_doc(id).await.is_err());
        assert_eq!(
            store.replace(id, Project::new("a", "b")).await.unwrap_err(),
            StoreError::NotFound(id)
        );
        assert_eq!(store.delete(id).await.unwrap_err(), StoreError::NotFound(id));
    }

    #[tokio::test]
    async fn test_doc_subscription_sees_commits_in_order() {
        let store = store();
        let project = Project::new("alice", "Board");
        store.create(project.clone()).await.unwrap();

        let mut sub = store.subscribe_doc(project.id).await.unwrap();
        store.patch(project.id, rename("Two"), None).await.unwrap();
        store.patch(project.id, rename("Three"), None).await.unwrap();

        let revisions: Vec<u64> = [sub.next().await, sub.next().await, sub.next().await]
            .into_iter()
            .flatten()
            .map(|s| s.revision)
            .collect();
        assert_eq!(revisions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_subscription_tracks_participation() {
        let store = store();
        let mut bob = store.subscribe_list("bob").await;
        assert_eq!(bob.next().await, Some(Vec::new()));

        let project = Project::new("alice", "Team");
        store.create(project.clone()).await.unwrap();
        // Bob is not a participant yet.
        assert_eq!(bob.try_next(), None);

        let mut members = std::collections::BTreeMap::new();
        members.insert("bob".to_string(), Field::Set(Role::Editor));
        let invite = ProjectPatch {
            members,
            participants: Some(vec!["alice".into(), "bob".into()]),
            ..ProjectPatch::default()
        };
        store.patch(project.id, invite, None).await.unwrap();
        let list = bob.next().await.unwrap_or_default();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Team");

        // Widget edits do not touch the list.
        let widgets = ProjectPatch {
            widgets: Some(Vec::new()),
            ..ProjectPatch::default()
        };
        store.patch(project.id, widgets, None).await.unwrap();
        assert_eq!(bob.try_next(), None);
    }

    #[tokio::test]
    async fn test_delete_closes_doc_feed_and_updates_list() {
        let store = store();
        let project = Project::new("alice", "Board");
        store.create(project.clone()).await.unwrap();
        let mut doc = store.subscribe_doc(project.id).await.unwrap();
        let mut list = store.subscribe_list("alice").await;
        assert_eq!(list.next().await.map(|l| l.len()), Some(1));

        store.delete(project.id).await.unwrap();
        assert!(doc.next().await.is_some());
        assert!(doc.next().await.is_none());
        assert_eq!(list.next().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_lists_follow_creation_order() {
        let store = store();
        for name in ["first", "second", "third"] {
            store.create(Project::new("alice", name)).await.unwrap();
        }
        let mut list = store.subscribe_list("alice").await;
        let names: Vec<String> = list
            .next()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_writes_are_stored_sanitized() {
        let store = store();
        let mut rng = StdRng::seed_from_u64(1);
        let mut project = Project::new("alice", "Links");
        let mut link = Widget::new(WidgetKind::Link, None, &mut rng);
        link.data = WidgetData::Link(LinkData {
            url: "https://example.com".into(),
            title: None,
            preview: Some(serde_json::json!({ "image": null, "site": "ex" })),
        });
        project.widgets.push(link);

        let snap = store.create(project).await.unwrap();
        match &snap.project.widgets[0].data {
            WidgetData::Link(link) => {
                assert_eq!(link.preview, Some(serde_json::json!({ "site": "ex" })));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
