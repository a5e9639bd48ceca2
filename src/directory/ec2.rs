//! EC2-backed directory service.
//!
//! Uses the AWS SDK for Rust with the standard credential chain
//! (environment, instance profile, etc.). Region and endpoint can be
//! overridden through `[aws]` configuration, the latter mainly for testing
//! against localstack.

use async_trait::async_trait;
use aws_sdk_ec2::{
    Client,
    types::{Filter, ResourceType, Tag as Ec2Tag, TagSpecification},
};
use chrono::{DateTime, Utc};

use super::{DirectoryError, DirectoryResult, DirectoryService};
use crate::{
    config::AwsConfig,
    model::{Snapshot, Tag, TagFilter, Volume},
};

/// EC2 directory service.
pub struct Ec2DirectoryService {
    client: Client,
}

impl Ec2DirectoryService {
    /// Create a new EC2 client with the given configuration.
    pub async fn new(config: &AwsConfig) -> Self {
        let mut aws_config = aws_config::from_env();

        if let Some(region) = &config.region {
            aws_config = aws_config.region(aws_config::Region::new(region.clone()));
        }

        let aws_config = aws_config.load().await;

        let mut ec2_config = aws_sdk_ec2::config::Builder::from(&aws_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            ec2_config = ec2_config.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(ec2_config.build()),
        }
    }

    /// Build the server-side `tag:<key>` filter for a tag filter.
    fn tag_filter(filter: &TagFilter) -> Filter {
        Filter::builder()
            .name(format!("tag:{}", filter.key))
            .set_values(Some(filter.values.clone()))
            .build()
    }
}

#[async_trait]
impl DirectoryService for Ec2DirectoryService {
    async fn list_volumes(&self, filter: &TagFilter) -> DirectoryResult<Vec<Volume>> {
        let output = self
            .client
            .describe_volumes()
            .filters(Self::tag_filter(filter))
            .send()
            .await
            .map_err(|e| {
                DirectoryError::Api(format!(
                    "DescribeVolumes failed: {}",
                    e.into_service_error()
                ))
            })?;

        output
            .volumes()
            .iter()
            .map(|volume| {
                let id = volume.volume_id().ok_or_else(|| {
                    DirectoryError::MalformedResponse("volume without VolumeId".into())
                })?;
                Ok(Volume {
                    id: id.to_string(),
                    tags: convert_tags(volume.tags()),
                })
            })
            .collect()
    }

    async fn list_snapshots(
        &self,
        volume_id: &str,
        filter: &TagFilter,
    ) -> DirectoryResult<Vec<Snapshot>> {
        let output = self
            .client
            .describe_snapshots()
            .filters(
                Filter::builder()
                    .name("volume-id")
                    .values(volume_id)
                    .build(),
            )
            .filters(Self::tag_filter(filter))
            .owner_ids("self")
            .send()
            .await
            .map_err(|e| {
                DirectoryError::Api(format!(
                    "DescribeSnapshots failed for volume {volume_id}: {}",
                    e.into_service_error()
                ))
            })?;

        output
            .snapshots()
            .iter()
            .map(|snap| {
                let id = snap.snapshot_id().ok_or_else(|| {
                    DirectoryError::MalformedResponse("snapshot without SnapshotId".into())
                })?;
                let start_time = snap.start_time().ok_or_else(|| {
                    DirectoryError::MalformedResponse(format!(
                        "snapshot {id} without StartTime"
                    ))
                })?;
                let started_at = to_utc(start_time).ok_or_else(|| {
                    DirectoryError::MalformedResponse(format!(
                        "snapshot {id} StartTime out of range"
                    ))
                })?;
                Ok(Snapshot {
                    id: id.to_string(),
                    volume_id: snap.volume_id().unwrap_or(volume_id).to_string(),
                    started_at,
                    tags: convert_tags(snap.tags()),
                })
            })
            .collect()
    }

    async fn create_snapshot(
        &self,
        volume: &Volume,
        description: &str,
    ) -> DirectoryResult<String> {
        let tags: Vec<Ec2Tag> = volume
            .tags
            .iter()
            .map(|tag| Ec2Tag::builder().key(&tag.key).value(&tag.value).build())
            .collect();

        let mut request = self
            .client
            .create_snapshot()
            .volume_id(&volume.id)
            .description(description);

        // Tag propagation keeps the snapshot visible to future retention
        // queries under the same filter.
        if !tags.is_empty() {
            request = request.tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Snapshot)
                    .set_tags(Some(tags))
                    .build(),
            );
        }

        let output = request.send().await.map_err(|e| {
            DirectoryError::Api(format!(
                "CreateSnapshot failed for volume {}: {}",
                volume.id,
                e.into_service_error()
            ))
        })?;

        output
            .snapshot_id()
            .map(str::to_string)
            .ok_or_else(|| DirectoryError::MalformedResponse("CreateSnapshot without SnapshotId".into()))
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> DirectoryResult<()> {
        self.client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| {
                DirectoryError::Api(format!(
                    "DeleteSnapshot failed for {snapshot_id}: {}",
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }
}

fn convert_tags(tags: &[Ec2Tag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|tag| match (tag.key(), tag.value()) {
            (Some(key), Some(value)) => Some(Tag::new(key, value)),
            _ => None,
        })
        .collect()
}

/// Convert an SDK timestamp to UTC. Returns None for out-of-range values.
fn to_utc(ts: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_filter_builds_server_side_filter() {
        let filter = TagFilter::new("Snapshot", vec!["Yes".to_string(), "True".to_string()]);
        let ec2_filter = Ec2DirectoryService::tag_filter(&filter);

        assert_eq!(ec2_filter.name(), Some("tag:Snapshot"));
        assert_eq!(ec2_filter.values(), ["Yes", "True"]);
    }

    #[test]
    fn test_to_utc_epoch_seconds() {
        let ts = aws_smithy_types::DateTime::from_secs(1_709_251_200); // 2024-03-01T00:00:00Z
        let converted = to_utc(&ts).unwrap();
        assert_eq!(converted, "2024-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_convert_tags_skips_incomplete_pairs() {
        let tags = vec![
            Ec2Tag::builder().key("Snapshot").value("Yes").build(),
            Ec2Tag::builder().key("orphan-key").build(),
        ];
        let converted = convert_tags(&tags);
        assert_eq!(converted, vec![Tag::new("Snapshot", "Yes")]);
    }
}
