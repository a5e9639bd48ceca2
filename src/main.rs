use std::path::PathBuf;

use clap::Parser;

mod config;
mod directory;
mod model;
mod notify;
mod observability;
mod retention;
mod run;

use notify::NotificationSink;

/// CLI arguments for snapwarden.
#[derive(Parser, Debug)]
#[command(version, about = "Automated EBS snapshot lifecycle management", long_about = None)]
struct Args {
    /// Path to config file (defaults to snapwarden.toml in the working
    /// directory if it exists, otherwise built-in defaults)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log what would be created and deleted without mutating anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let (mut config, config_load_error) = load_config(args.config.as_deref());
    if args.debug {
        config.logging.level = config::LogLevel::Debug;
    }
    if args.dry_run {
        config.safety.dry_run = true;
    }

    observability::init_tracing(&config.logging);

    // Deferred until the subscriber exists; a broken config is not fatal.
    if let Some(error) = &config_load_error {
        tracing::error!("{error}");
    }

    tracing::info!(
        tagname = %config.tagname,
        retention_days = config.retention_days,
        dry_run = config.safety.dry_run,
        "Starting snapshot run"
    );

    let directory = directory::Ec2DirectoryService::new(&config.aws).await;

    let sink = match &config.sns_topic {
        Some(topic_arn) => Some(notify::SnsNotifier::new(&config.aws, topic_arn).await),
        None => None,
    };

    match run::run(
        &directory,
        sink.as_ref().map(|s| s as &dyn NotificationSink),
        &config,
    )
    .await
    {
        Ok(report) => {
            // Best effort by design: partial per-volume failures still exit 0.
            if report.has_failures() {
                tracing::warn!(
                    create_failures = report.create_failures,
                    cleanup_failures = report.cleanup_failures,
                    "Run finished with per-volume failures"
                );
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            std::process::exit(1);
        }
    }
}

/// Resolve the config path: explicit `--config`, else `snapwarden.toml` in
/// the working directory if present.
fn resolve_config_path(explicit_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(PathBuf::from(path));
    }

    let cwd_config = PathBuf::from("snapwarden.toml");
    cwd_config.exists().then_some(cwd_config)
}

/// Load the configuration, falling back to defaults on any failure.
///
/// The error message is returned rather than logged because the tracing
/// subscriber is configured from the loaded config itself.
fn load_config(explicit_path: Option<&str>) -> (config::SnapshotConfig, Option<String>) {
    match resolve_config_path(explicit_path) {
        Some(path) => match config::SnapshotConfig::from_file(&path) {
            Ok(config) => (config, None),
            Err(e) => (
                config::SnapshotConfig::default(),
                Some(format!(
                    "Failed to load config from {}: {}; using default config",
                    path.display(),
                    e
                )),
            ),
        },
        None => (config::SnapshotConfig::default(), None),
    }
}
