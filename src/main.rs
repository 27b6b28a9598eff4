//! `content-mirror` command line entry point.
//!
//! Reads settings from flags and environment, wires the workspace crates
//! together, runs every configured section once and prints a summary.
//!
//! Exit codes: `0` success, `1` login failure or the last section failed to
//! resolve, `2` invalid configuration.

use anyhow::{Context, Result};
use bridge_desktop::{FsObjectStorage, ReqwestHttpClient};
use clap::Parser;
use core_catalog::{create_pool, DatabaseConfig, SqliteCatalogRepository};
use core_runtime::config::{resolve_sections, SyncSettings, SyncTuning};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LogLevel, LoggingConfig};
use core_sync::{RunReport, SyncConfig, SyncError, SyncOrchestrator};
use provider_remote_host::RemoteHostConnector;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "content-mirror", version, about = "Mirror remote folder trees into the local catalog")]
struct CliArgs {
    /// Section to sync, as `<section>=<folder reference>[|<display name>]`.
    /// Repeatable. When absent, `CONTENT_MIRROR_SECTION_<NAME>` variables are used.
    #[arg(long = "section", value_name = "SECTION=REFERENCE")]
    sections: Vec<String>,

    /// Remote host origin, e.g. https://host.example
    #[arg(long, env = "REMOTE_HOST_URL")]
    remote_url: Option<String>,

    #[arg(long, env = "REMOTE_HOST_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "REMOTE_HOST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// SQLite catalog database file
    #[arg(long, env = "CONTENT_MIRROR_DATABASE", default_value = "content-mirror.db")]
    database: PathBuf,

    /// Root directory for mirrored media. Defaults to the user data directory.
    #[arg(long, env = "CONTENT_MIRROR_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Parallel mirror uploads
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Attempts per mirror job before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Deepest level searched when resolving a folder by name
    #[arg(long, default_value_t = 8)]
    max_depth: usize,

    /// Pause between file-detail requests, in milliseconds
    #[arg(long, default_value_t = 250)]
    detail_delay_ms: u64,

    /// pretty, json or compact
    #[arg(long, env = "CONTENT_MIRROR_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Full tracing filter, overrides --log-level
    #[arg(long, env = "RUST_LOG")]
    log_filter: Option<String>,

    /// Also print the run report as JSON
    #[arg(long)]
    json_report: bool,
}

impl CliArgs {
    fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::default().with_level(self.log_level);
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        if let Some(filter) = &self.log_filter {
            config = config.with_filter(filter.clone());
        }
        config
    }

    fn settings(&self) -> core_runtime::Result<SyncSettings> {
        let (sections, source) = resolve_sections(&self.sections, std::env::vars())?;

        let storage_root = match &self.storage_root {
            Some(root) => root.clone(),
            None => FsObjectStorage::with_default_root().root().to_path_buf(),
        };

        let settings = SyncSettings::builder()
            .remote_url(self.remote_url.clone().unwrap_or_default())
            .credentials(
                self.username.clone().unwrap_or_default(),
                self.password.clone().unwrap_or_default(),
            )
            .database_path(&self.database)
            .storage_root(storage_root)
            .sections(sections)
            .tuning(SyncTuning {
                mirror_concurrency: self.concurrency,
                mirror_max_attempts: self.max_attempts,
                max_resolve_depth: self.max_depth,
                detail_fetch_delay: Duration::from_millis(self.detail_delay_ms),
                ..SyncTuning::default()
            })
            .build()?;

        info!(source = %source, sections = settings.sections.len(), "Loaded configuration");
        Ok(settings)
    }
}

async fn run(settings: SyncSettings) -> Result<RunReport> {
    let pool = create_pool(DatabaseConfig::new(&settings.database_path))
        .await
        .with_context(|| format!("Failed to open catalog at {}", settings.database_path.display()))?;
    let repository = Arc::new(SqliteCatalogRepository::new(pool));

    let http_client = Arc::new(ReqwestHttpClient::new().context("Failed to build HTTP client")?);
    let storage = Arc::new(FsObjectStorage::new(&settings.storage_root));

    let credentials = &settings.credentials;
    info!(
        remote = %credentials.base_url,
        username = %redact_if_sensitive("username", &credentials.username),
        storage_root = %settings.storage_root.display(),
        "Starting sync"
    );
    let host = Arc::new(RemoteHostConnector::new(
        http_client.clone(),
        credentials.base_url.clone(),
        credentials.username.clone(),
        credentials.password.clone(),
    ));

    let orchestrator = SyncOrchestrator::new(
        host,
        http_client,
        storage,
        repository,
        SyncConfig::from(&settings.tuning),
    );

    Ok(orchestrator.run(&settings.sections).await?)
}

fn print_summary(report: &RunReport, json: bool) -> Result<()> {
    for section in &report.sections {
        println!("{}", section);
        for failed in &section.failed_mirrors {
            println!(
                "  mirror failed: {} after {} attempt(s): {}",
                failed.slug, failed.attempts, failed.error
            );
        }
    }
    for failure in &report.failures {
        println!(
            "[{}] FAILED to sync '{}': {}",
            failure.section, failure.reference, failure.error
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(e) = init_logging(args.logging_config()) {
        eprintln!("{}", e);
        return ExitCode::from(2);
    }

    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let last_section = settings
        .sections
        .last()
        .map(|s| s.section.clone())
        .unwrap_or_default();

    let report = match run(settings).await {
        Ok(report) => report,
        Err(e) => {
            if matches!(e.downcast_ref::<SyncError>(), Some(SyncError::Auth(_))) {
                error!(error = %e, "Login failed");
            } else {
                error!(error = %format!("{:#}", e), "Sync aborted");
            }
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = print_summary(&report, args.json_report) {
        warn!(error = %e, "Failed to print run report");
    }

    if report.is_unresolved(&last_section) {
        error!(section = %last_section, "Last configured section could not be resolved");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
