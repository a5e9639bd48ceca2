//! Configuration module for snapwarden.
//!
//! The tool is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. A missing or malformed
//! configuration source is logged and replaced by the built-in defaults;
//! configuration is never fatal to a run.
//!
//! # Example
//!
//! ```toml
//! tagname = "Snapshot"
//! tagvalues = ["Yes"]
//! retention_days = 7
//! sns_topic = "arn:aws:sns:us-east-1:123456789012:snapshot-reports"
//!
//! [aws]
//! region = "us-east-1"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

mod observability;

use std::path::Path;

pub use observability::*;
use serde::{Deserialize, Serialize};

use crate::model::TagFilter;

/// Root configuration for a snapshot run.
///
/// All fields are optional with defaults matching a conservative daily
/// backup policy: volumes tagged `Snapshot=Yes`, seven days of retention,
/// no notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Tag key used for both volume discovery and snapshot retention
    /// filtering.
    #[serde(default = "default_tagname")]
    pub tagname: String,

    /// Acceptable values for the tag key.
    #[serde(default = "default_tagvalues")]
    pub tagvalues: Vec<String>,

    /// Age threshold in days for snapshot deletion. Snapshots strictly older
    /// than this are deleted; a snapshot created exactly at the cutoff is
    /// retained.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// SNS topic ARN for the run summary.
    /// If absent, the notification phase is skipped.
    #[serde(default)]
    pub sns_topic: Option<String>,

    /// AWS client settings shared by the EC2 and SNS clients.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Safety settings to prevent accidental data loss.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            tagname: default_tagname(),
            tagvalues: default_tagvalues(),
            retention_days: default_retention_days(),
            sns_topic: None,
            aws: AwsConfig::default(),
            safety: SafetyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_tagname() -> String {
    "Snapshot".to_string()
}

fn default_tagvalues() -> Vec<String> {
    vec!["Yes".to_string()]
}

fn default_retention_days() -> u32 {
    7
}

impl SnapshotConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: SnapshotConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// The tag filter scoping this run's discovery and retention queries.
    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(&self.tagname, self.tagvalues.clone())
    }
}

/// AWS client settings shared by the EC2 and SNS clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// AWS region (e.g. "us-east-1").
    /// Defaults to the SDK's standard region/credential chain.
    #[serde(default)]
    pub region: Option<String>,

    /// Optional endpoint URL for testing with localstack.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Safety settings for mutating operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyConfig {
    /// If true, log what would be created and deleted without calling the
    /// mutating EC2 operations. Useful for testing a retention policy.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables appearing inside a `#` comment are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        // Only expand variables in the portion of the line before any comment
        let code_end = line.find('#').unwrap_or(line.len());
        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(&line[..code_end]) {
            let matched = cap.get(0).unwrap();
            line_result.push_str(&line[last_end..matched.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = matched.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
