//! SNS-backed notification sink.
//!
//! Uses the AWS SDK for Rust with the standard credential chain, sharing the
//! same region/endpoint settings as the EC2 client.

use async_trait::async_trait;
use aws_sdk_sns::Client;

use super::{NotificationSink, NotifyError, NotifyResult};
use crate::config::AwsConfig;

/// SNS notification sink publishing to a fixed topic.
pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
}

impl SnsNotifier {
    /// Create a new SNS client publishing to the given topic.
    pub async fn new(config: &AwsConfig, topic_arn: impl Into<String>) -> Self {
        let mut aws_config = aws_config::from_env();

        if let Some(region) = &config.region {
            aws_config = aws_config.region(aws_config::Region::new(region.clone()));
        }

        let aws_config = aws_config.load().await;

        let mut sns_config = aws_sdk_sns::config::Builder::from(&aws_config);

        if let Some(endpoint_url) = &config.endpoint_url {
            sns_config = sns_config.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(sns_config.build()),
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for SnsNotifier {
    async fn publish(&self, subject: &str, message: &str) -> NotifyResult<()> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| {
                NotifyError::Publish(format!(
                    "SNS publish to {} failed: {}",
                    self.topic_arn,
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }
}
