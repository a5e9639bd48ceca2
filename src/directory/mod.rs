//! Directory service for the volume and snapshot inventory.
//!
//! The directory service is the system of record for volumes and snapshots:
//! it answers the two tag-scoped listing queries and performs the two
//! mutating operations (create snapshot, delete snapshot). The production
//! backend is EC2; an in-memory implementation is provided for tests.

mod ec2;

use std::sync::Mutex;

use async_trait::async_trait;
pub use ec2::Ec2DirectoryService;
use thiserror::Error;

use crate::model::{Snapshot, Tag, TagFilter, Volume};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// System of record for volumes and snapshots.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// List volumes whose tags match the filter.
    async fn list_volumes(&self, filter: &TagFilter) -> DirectoryResult<Vec<Volume>>;

    /// List snapshots of one volume matching the filter, scoped to snapshots
    /// owned by the calling account.
    async fn list_snapshots(
        &self,
        volume_id: &str,
        filter: &TagFilter,
    ) -> DirectoryResult<Vec<Snapshot>>;

    /// Create a snapshot of the volume, copying the volume's tags onto the
    /// snapshot. Returns the new snapshot id.
    async fn create_snapshot(
        &self,
        volume: &Volume,
        description: &str,
    ) -> DirectoryResult<String>;

    /// Delete a snapshot by id.
    async fn delete_snapshot(&self, snapshot_id: &str) -> DirectoryResult<()>;
}

/// In-memory directory service (for testing only).
///
/// Holds volumes and snapshots behind a mutex and supports injecting
/// failures for individual operations to exercise the orchestrator's
/// partial-failure paths.
#[derive(Default)]
pub struct MemoryDirectoryService {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    volumes: Vec<Volume>,
    snapshots: Vec<Snapshot>,
    next_id: u64,
    fail_discovery: bool,
    fail_creates_for: Vec<String>,
    fail_deletes_for: Vec<String>,
}

impl MemoryDirectoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volumes(volumes: Vec<Volume>) -> Self {
        let service = Self::new();
        service.inner.lock().unwrap().volumes = volumes;
        service
    }

    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.inner.lock().unwrap().snapshots.push(snapshot);
    }

    /// Make the next `list_volumes` call fail.
    pub fn fail_discovery(&self) {
        self.inner.lock().unwrap().fail_discovery = true;
    }

    /// Make `create_snapshot` fail for the given volume.
    pub fn fail_create_for(&self, volume_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_creates_for
            .push(volume_id.to_string());
    }

    /// Make `delete_snapshot` fail for the given snapshot.
    pub fn fail_delete_for(&self, snapshot_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_deletes_for
            .push(snapshot_id.to_string());
    }

    /// Snapshot inventory as currently stored.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.lock().unwrap().snapshots.clone()
    }
}

#[async_trait]
impl DirectoryService for MemoryDirectoryService {
    async fn list_volumes(&self, filter: &TagFilter) -> DirectoryResult<Vec<Volume>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_discovery {
            return Err(DirectoryError::Api("DescribeVolumes unavailable".into()));
        }
        Ok(inner
            .volumes
            .iter()
            .filter(|volume| filter.matches(&volume.tags))
            .cloned()
            .collect())
    }

    async fn list_snapshots(
        &self,
        volume_id: &str,
        filter: &TagFilter,
    ) -> DirectoryResult<Vec<Snapshot>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .snapshots
            .iter()
            .filter(|snap| snap.volume_id == volume_id && filter.matches(&snap.tags))
            .cloned()
            .collect())
    }

    async fn create_snapshot(
        &self,
        volume: &Volume,
        _description: &str,
    ) -> DirectoryResult<String> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_creates_for.iter().any(|id| id == &volume.id) {
            return Err(DirectoryError::Api(format!(
                "CreateSnapshot failed for volume {}",
                volume.id
            )));
        }
        inner.next_id += 1;
        let id = format!("snap-{:04}", inner.next_id);
        inner.snapshots.push(Snapshot {
            id: id.clone(),
            volume_id: volume.id.clone(),
            started_at: chrono::Utc::now(),
            tags: volume.tags.clone(),
        });
        Ok(id)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_deletes_for.iter().any(|id| id == snapshot_id) {
            return Err(DirectoryError::Api(format!(
                "DeleteSnapshot failed for {snapshot_id}"
            )));
        }
        let before = inner.snapshots.len();
        inner.snapshots.retain(|snap| snap.id != snapshot_id);
        if inner.snapshots.len() == before {
            return Err(DirectoryError::Api(format!(
                "Snapshot {snapshot_id} not found"
            )));
        }
        Ok(())
    }
}

/// Convenience constructor for a tagged volume, used by tests.
pub fn tagged_volume(id: &str, tags: &[(&str, &str)]) -> Volume {
    Volume {
        id: id.to_string(),
        tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TagFilter {
        TagFilter::new("Snapshot", vec!["Yes".to_string()])
    }

    #[tokio::test]
    async fn test_memory_list_volumes_applies_filter() {
        let service = MemoryDirectoryService::with_volumes(vec![
            tagged_volume("vol-1", &[("Snapshot", "Yes")]),
            tagged_volume("vol-2", &[("Snapshot", "No")]),
            tagged_volume("vol-3", &[("Name", "scratch")]),
        ]);

        let volumes = service.list_volumes(&filter()).await.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].id, "vol-1");
    }

    #[tokio::test]
    async fn test_memory_create_propagates_tags() {
        let volume = tagged_volume("vol-1", &[("Snapshot", "Yes"), ("Name", "data")]);
        let service = MemoryDirectoryService::with_volumes(vec![volume.clone()]);

        let id = service
            .create_snapshot(&volume, "Automated snapshot for vol-1")
            .await
            .unwrap();

        let snapshots = service.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, id);
        assert_eq!(snapshots[0].volume_id, "vol-1");
        assert_eq!(snapshots[0].tags, volume.tags);
    }

    #[tokio::test]
    async fn test_memory_delete_missing_snapshot_errors() {
        let service = MemoryDirectoryService::new();
        let err = service.delete_snapshot("snap-9999").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Api(_)));
    }

    #[tokio::test]
    async fn test_memory_discovery_failure_injection() {
        let service = MemoryDirectoryService::new();
        service.fail_discovery();
        assert!(service.list_volumes(&filter()).await.is_err());
    }
}
