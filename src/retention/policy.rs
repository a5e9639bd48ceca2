use chrono::{DateTime, Duration, Utc};

use crate::model::{Snapshot, TagFilter};

/// Compute the subset of `snapshots` eligible for deletion.
///
/// A snapshot qualifies iff its own tag set matches `filter` and its
/// creation timestamp is strictly earlier than `now - retention_days`. The
/// strict comparison means a snapshot created exactly at the cutoff instant
/// is retained. Tag matching uses the snapshot's tags as captured at
/// creation, so eligibility is independent of the source volume's current
/// state.
///
/// The caller is expected to have scoped `snapshots` to a single volume and
/// to the owning account. The returned ids carry no ordering guarantee.
pub fn snapshots_to_delete(
    snapshots: &[Snapshot],
    filter: &TagFilter,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Vec<String> {
    let cutoff = now - Duration::days(retention_days as i64);

    snapshots
        .iter()
        .filter(|snap| filter.matches(&snap.tags) && snap.started_at < cutoff)
        .map(|snap| snap.id.clone())
        .collect()
}
