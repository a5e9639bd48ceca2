//! Core domain types shared by the directory service, the retention policy,
//! and the run orchestrator.

use chrono::{DateTime, Utc};

/// A single key/value tag attached to a volume or snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A tag key and the set of acceptable values for it.
///
/// The same filter scopes both volume discovery and snapshot retention
/// queries, so a snapshot tagged at creation time stays visible to future
/// cleanup runs even if its source volume is retagged or deleted.
#[derive(Debug, Clone)]
pub struct TagFilter {
    pub key: String,
    pub values: Vec<String>,
}

impl TagFilter {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// Whether a tag set carries this filter's key with an accepted value.
    pub fn matches(&self, tags: &[Tag]) -> bool {
        tags.iter()
            .any(|tag| tag.key == self.key && self.values.contains(&tag.value))
    }
}

/// A block-storage volume as seen at discovery time.
///
/// Tags are captured once when the volume is listed; the volume is not
/// re-read during a run.
#[derive(Debug, Clone)]
pub struct Volume {
    pub id: String,
    pub tags: Vec<Tag>,
}

/// A point-in-time copy of a volume, independently addressable and deletable.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: String,
    /// Id of the volume this snapshot was taken from.
    pub volume_id: String,
    /// Creation timestamp, normalized to UTC at the service boundary.
    pub started_at: DateTime<Utc>,
    /// Tags copied from the source volume at creation time.
    pub tags: Vec<Tag>,
}
