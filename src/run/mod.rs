//! Run orchestrator: discovery, per-volume snapshot creation, per-volume
//! retention cleanup, and the summary notification.
//!
//! One run walks five sequential phases:
//! 1. Discover volumes matching the tag filter (fatal on failure)
//! 2. Create a snapshot per volume, propagating the volume's tags
//! 3. Delete each volume's snapshots that fall outside the retention window
//! 4. Aggregate a summary of created snapshot ids
//! 5. Publish the summary if a notification sink is configured
//!
//! Per-volume failures in phases 2 and 3 are logged with the volume or
//! snapshot id and swallowed, so one volume never blocks processing of the
//! others. Nothing is retried and nothing is rolled back.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    config::SnapshotConfig,
    directory::{DirectoryError, DirectoryResult, DirectoryService},
    model::{TagFilter, Volume},
    notify::NotificationSink,
    retention,
};

/// Subject line for the run summary notification.
pub const NOTIFICATION_SUBJECT: &str = "EBS Snapshot Notification";

/// Errors fatal to the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Volume discovery failed; nothing downstream is possible.
    #[error("Volume discovery failed: {0}")]
    Discovery(#[from] DirectoryError),
}

/// Results from a single run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Ids of snapshots successfully created this run.
    pub snapshots_created: Vec<String>,
    /// Number of snapshots deleted by retention cleanup.
    pub snapshots_deleted: u64,
    /// Number of volumes processed.
    pub volumes_processed: u64,
    /// Per-volume snapshot creation failures.
    pub create_failures: u64,
    /// Per-volume cleanup failures (query or individual delete).
    pub cleanup_failures: u64,
}

impl RunReport {
    /// Whether any per-volume operation failed.
    pub fn has_failures(&self) -> bool {
        self.create_failures > 0 || self.cleanup_failures > 0
    }

    /// Build the one-line summary delivered by the notification sink.
    /// Failure detail lives only in the log stream.
    pub fn summary(&self) -> String {
        if self.snapshots_created.is_empty() {
            "No snapshots created.".to_string()
        } else {
            format!(
                "{} snapshot(s) created: {}",
                self.snapshots_created.len(),
                self.snapshots_created.join(", ")
            )
        }
    }
}

/// Execute one snapshot lifecycle run.
pub async fn run(
    directory: &dyn DirectoryService,
    sink: Option<&dyn NotificationSink>,
    config: &SnapshotConfig,
) -> Result<RunReport, RunError> {
    let filter = config.tag_filter();
    let dry_run = config.safety.dry_run;

    // One cutoff baseline for the whole run, even if processing spans time.
    let now = Utc::now();

    let volumes = directory.list_volumes(&filter).await?;

    if volumes.is_empty() {
        tracing::info!(tag = %filter.key, "No volumes matched the tag filter, nothing to do");
        return Ok(RunReport::default());
    }

    tracing::info!(
        count = volumes.len(),
        tag = %filter.key,
        retention_days = config.retention_days,
        dry_run,
        "Discovered volumes"
    );

    let mut report = RunReport::default();

    for volume in &volumes {
        report.volumes_processed += 1;
        create_volume_snapshot(directory, volume, dry_run, &mut report).await;

        // Cleanup runs regardless of this volume's creation outcome.
        if let Err(e) =
            cleanup_volume(directory, volume, &filter, config.retention_days, now, dry_run, &mut report)
                .await
        {
            report.cleanup_failures += 1;
            tracing::error!(volume_id = %volume.id, error = %e, "Snapshot cleanup failed");
        }
    }

    tracing::info!(
        created = report.snapshots_created.len(),
        deleted = report.snapshots_deleted,
        create_failures = report.create_failures,
        cleanup_failures = report.cleanup_failures,
        "Run complete"
    );

    if dry_run {
        tracing::info!("DRY RUN: Skipping notification");
    } else if let Some(sink) = sink {
        match sink.publish(NOTIFICATION_SUBJECT, &report.summary()).await {
            Ok(()) => tracing::info!("Notification sent"),
            Err(e) => tracing::error!(error = %e, "Failed to send notification"),
        }
    }

    Ok(report)
}

/// Create one volume's snapshot, carrying the volume's tags onto the new
/// snapshot so it stays visible to future retention queries under the same
/// filter.
async fn create_volume_snapshot(
    directory: &dyn DirectoryService,
    volume: &Volume,
    dry_run: bool,
    report: &mut RunReport,
) {
    if dry_run {
        tracing::info!(volume_id = %volume.id, "DRY RUN: Would create snapshot");
        return;
    }

    let description = format!("Automated snapshot for {}", volume.id);
    match directory.create_snapshot(volume, &description).await {
        Ok(snapshot_id) => {
            tracing::info!(volume_id = %volume.id, snapshot_id = %snapshot_id, "Created snapshot");
            report.snapshots_created.push(snapshot_id);
        }
        Err(e) => {
            report.create_failures += 1;
            tracing::error!(volume_id = %volume.id, error = %e, "Failed to create snapshot");
        }
    }
}

/// Delete one volume's snapshots that fall outside the retention window.
///
/// A failing query propagates to the caller; an individual delete failure is
/// logged and counted without stopping the remaining deletes.
async fn cleanup_volume(
    directory: &dyn DirectoryService,
    volume: &Volume,
    filter: &TagFilter,
    retention_days: u32,
    now: DateTime<Utc>,
    dry_run: bool,
    report: &mut RunReport,
) -> DirectoryResult<()> {
    let snapshots = directory.list_snapshots(&volume.id, filter).await?;
    let expired = retention::snapshots_to_delete(&snapshots, filter, retention_days, now);

    if expired.is_empty() {
        tracing::debug!(volume_id = %volume.id, "No snapshots past retention");
        return Ok(());
    }

    for snapshot_id in expired {
        if dry_run {
            tracing::info!(volume_id = %volume.id, snapshot_id = %snapshot_id, "DRY RUN: Would delete snapshot");
            report.snapshots_deleted += 1;
            continue;
        }

        match directory.delete_snapshot(&snapshot_id).await {
            Ok(()) => {
                report.snapshots_deleted += 1;
                tracing::info!(volume_id = %volume.id, snapshot_id = %snapshot_id, "Deleted snapshot");
            }
            Err(e) => {
                report.cleanup_failures += 1;
                tracing::error!(
                    volume_id = %volume.id,
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "Failed to delete snapshot"
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        directory::{MemoryDirectoryService, tagged_volume},
        model::{Snapshot, Tag},
        notify::MemoryNotifier,
    };

    fn config() -> SnapshotConfig {
        SnapshotConfig::default()
    }

    fn old_snapshot(id: &str, volume_id: &str) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            volume_id: volume_id.to_string(),
            started_at: Utc::now() - Duration::days(30),
            tags: vec![Tag::new("Snapshot", "Yes")],
        }
    }

    fn young_snapshot(id: &str, volume_id: &str) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            volume_id: volume_id.to_string(),
            started_at: Utc::now() - Duration::days(1),
            tags: vec![Tag::new("Snapshot", "Yes")],
        }
    }

    #[tokio::test]
    async fn test_no_volumes_is_success_with_empty_report() {
        let directory = MemoryDirectoryService::new();
        let sink = MemoryNotifier::new();

        let report = run(&directory, Some(&sink), &config()).await.unwrap();

        assert!(report.snapshots_created.is_empty());
        assert_eq!(report.snapshots_deleted, 0);
        assert_eq!(report.volumes_processed, 0);
        assert!(!report.has_failures());
        assert!(sink.published().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_failure_is_fatal() {
        let directory = MemoryDirectoryService::new();
        directory.fail_discovery();

        let err = run(&directory, None, &config()).await.unwrap_err();
        assert!(matches!(err, RunError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_creates_one_snapshot_per_volume_with_tags() {
        let directory = MemoryDirectoryService::with_volumes(vec![
            tagged_volume("vol-1", &[("Snapshot", "Yes"), ("Name", "data")]),
            tagged_volume("vol-2", &[("Snapshot", "Yes")]),
        ]);

        let report = run(&directory, None, &config()).await.unwrap();

        assert_eq!(report.snapshots_created.len(), 2);
        assert_eq!(report.volumes_processed, 2);

        let snapshots = directory.snapshots();
        let for_vol1 = snapshots.iter().find(|s| s.volume_id == "vol-1").unwrap();
        assert!(for_vol1.tags.contains(&Tag::new("Name", "data")));
        assert!(for_vol1.tags.contains(&Tag::new("Snapshot", "Yes")));
    }

    #[tokio::test]
    async fn test_create_failure_does_not_block_other_volumes_or_cleanup() {
        let directory = MemoryDirectoryService::with_volumes(vec![
            tagged_volume("vol-1", &[("Snapshot", "Yes")]),
            tagged_volume("vol-2", &[("Snapshot", "Yes")]),
        ]);
        directory.fail_create_for("vol-1");
        directory.add_snapshot(old_snapshot("snap-old-1", "vol-1"));
        directory.add_snapshot(old_snapshot("snap-old-2", "vol-2"));

        let report = run(&directory, None, &config()).await.unwrap();

        // vol-2's snapshot was created, vol-1's failure was recorded.
        assert_eq!(report.snapshots_created.len(), 1);
        assert_eq!(report.create_failures, 1);

        // Cleanup still executed for both volumes.
        assert_eq!(report.snapshots_deleted, 2);
        let remaining: Vec<String> = directory.snapshots().iter().map(|s| s.id.clone()).collect();
        assert!(!remaining.contains(&"snap-old-1".to_string()));
        assert!(!remaining.contains(&"snap-old-2".to_string()));
    }

    #[tokio::test]
    async fn test_cleanup_deletes_only_expired_snapshots() {
        let directory =
            MemoryDirectoryService::with_volumes(vec![tagged_volume("vol-1", &[("Snapshot", "Yes")])]);
        directory.add_snapshot(old_snapshot("snap-old", "vol-1"));
        directory.add_snapshot(young_snapshot("snap-young", "vol-1"));

        let report = run(&directory, None, &config()).await.unwrap();

        assert_eq!(report.snapshots_deleted, 1);
        let remaining: Vec<String> = directory.snapshots().iter().map(|s| s.id.clone()).collect();
        assert!(remaining.contains(&"snap-young".to_string()));
        assert!(!remaining.contains(&"snap-old".to_string()));
    }

    #[tokio::test]
    async fn test_delete_failure_counts_and_continues() {
        let directory =
            MemoryDirectoryService::with_volumes(vec![tagged_volume("vol-1", &[("Snapshot", "Yes")])]);
        directory.add_snapshot(old_snapshot("snap-a", "vol-1"));
        directory.add_snapshot(old_snapshot("snap-b", "vol-1"));
        directory.fail_delete_for("snap-a");

        let report = run(&directory, None, &config()).await.unwrap();

        assert_eq!(report.cleanup_failures, 1);
        assert_eq!(report.snapshots_deleted, 1);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_notification_carries_created_ids() {
        let directory =
            MemoryDirectoryService::with_volumes(vec![tagged_volume("vol-1", &[("Snapshot", "Yes")])]);
        let sink = MemoryNotifier::new();

        let report = run(&directory, Some(&sink), &config()).await.unwrap();

        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, NOTIFICATION_SUBJECT);
        assert_eq!(
            published[0].1,
            format!("1 snapshot(s) created: {}", report.snapshots_created[0])
        );
    }

    #[tokio::test]
    async fn test_no_sink_configured_is_a_no_op() {
        let directory =
            MemoryDirectoryService::with_volumes(vec![tagged_volume("vol-1", &[("Snapshot", "Yes")])]);

        let report = run(&directory, None, &config()).await.unwrap();
        assert_eq!(report.snapshots_created.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_performs_no_mutations() {
        let directory =
            MemoryDirectoryService::with_volumes(vec![tagged_volume("vol-1", &[("Snapshot", "Yes")])]);
        directory.add_snapshot(old_snapshot("snap-old", "vol-1"));
        let sink = MemoryNotifier::new();

        let mut config = config();
        config.safety.dry_run = true;

        let report = run(&directory, Some(&sink), &config).await.unwrap();

        // The would-be deletion is counted but nothing actually changed.
        assert_eq!(report.snapshots_deleted, 1);
        assert!(report.snapshots_created.is_empty());
        assert_eq!(directory.snapshots().len(), 1);
        assert!(sink.published().is_empty());
    }

    #[test]
    fn test_summary_message_formats() {
        let empty = RunReport::default();
        assert_eq!(empty.summary(), "No snapshots created.");

        let report = RunReport {
            snapshots_created: vec!["snap-1".to_string(), "snap-2".to_string()],
            ..Default::default()
        };
        assert_eq!(report.summary(), "2 snapshot(s) created: snap-1, snap-2");
    }

    #[test]
    fn test_report_has_failures() {
        let clean = RunReport::default();
        assert!(!clean.has_failures());

        let with_create = RunReport {
            create_failures: 1,
            ..Default::default()
        };
        assert!(with_create.has_failures());

        let with_cleanup = RunReport {
            cleanup_failures: 1,
            ..Default::default()
        };
        assert!(with_cleanup.has_failures());
    }
}
