//! # Logging
//!
//! One `tracing` subscriber for the whole process, writing to stderr so the
//! run summary on stdout stays clean.
//!
//! Workspace crates log at the configured [`LogLevel`]; HTTP and SQL
//! dependencies are held at `warn` unless a full filter string is supplied.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Json)
//!         .with_level(LogLevel::Debug),
//! )?;
//! tracing::info!(section = "videos", "sync started");
//! ```

use crate::error::{Error, Result};

use std::fmt;
use std::io::{self, IsTerminal};
use std::str::FromStr;

use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    Layer, Registry,
};

const WORKSPACE_TARGETS: &[&str] = &[
    "content_mirror",
    "core_runtime",
    "core_catalog",
    "core_sync",
    "provider_remote_host",
    "bridge_desktop",
];

const QUIET_DEPENDENCIES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "sqlx"];

type FilteredRegistry = Layered<EnvFilter, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. For a person watching a terminal.
    Pretty,
    /// One JSON object per event.
    Json,
    /// One plain line per event.
    Compact,
}

impl Default for LogFormat {
    /// Pretty on an interactive terminal, JSON when stderr is piped or captured.
    fn default() -> Self {
        if io::stderr().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            "compact" => Self::Compact,
            other => return Err(Error::Config(format!("unknown log format `{}`", other))),
        };
        Ok(format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            other => return Err(Error::Config(format!("unknown log level `{}`", other))),
        };
        Ok(level)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Complete `EnvFilter` directive string. Replaces the level-based default.
    pub filter: Option<String>,
    /// Log span close events with their timings.
    pub enable_spans: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            enable_spans: false,
            display_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    fn directives(&self) -> String {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .chain(QUIET_DEPENDENCIES.iter().map(|dep| format!("{}=warn", dep)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(self.directives())
            .map_err(|e| Error::Config(format!("invalid log filter: {}", e)))
    }

    fn output_layer(&self) -> OutputLayer {
        let spans = if self.enable_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(self.display_target)
            .with_span_events(spans);

        match self.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Json => layer
                .json()
                .flatten_event(true)
                .with_current_span(self.enable_spans)
                .with_span_list(self.enable_spans)
                .boxed(),
        }
    }
}

/// Install the global subscriber.
///
/// Fails with [`Error::Config`] on a bad filter string or when a subscriber
/// is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;
    tracing_subscriber::registry()
        .with(filter)
        .with(config.output_layer())
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))
}

/// Mask a value before it reaches a log line.
///
/// Fields named like credentials are replaced outright. E-mail addresses keep
/// their first character only.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    const CREDENTIAL_HINTS: &[&str] = &["password", "secret", "token", "bearer", "authorization"];

    let field = field_name.to_ascii_lowercase();
    if CREDENTIAL_HINTS.iter().any(|hint| field.contains(hint)) {
        return "[REDACTED]".to_string();
    }

    match value.split_once('@') {
        Some((local, domain)) if domain.contains('.') => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@[REDACTED]", first)
        }
        _ => value.to_string(),
    }
}

/// URL without its query string or fragment. Preview links carry their
/// signature in the query.
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
