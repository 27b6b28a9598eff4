//! # Core Configuration Module
//!
//! Configuration for one sync run.
//!
//! ## Overview
//!
//! A run needs remote host credentials, a catalog database location, an
//! object storage root, and at least one section to mirror. The builder
//! enforces fail-fast validation so a malformed section definition aborts the
//! run before anything touches the network.
//!
//! ## Section sources
//!
//! Sections come from exactly one source per invocation:
//!
//! - Repeated command-line values: `videos=Media/Anime|Anime Library`
//! - Environment variables: `CONTENT_MIRROR_SECTION_VIDEOS=Media/Anime|Anime Library`
//!
//! The format is `<section>=<folder reference>[|<display name>]` on the command
//! line; in the environment the section is taken from the variable name.
//! Command-line sections win. The environment is only consulted when no
//! section was given on the command line.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{resolve_sections, SyncSettings};
//!
//! let (sections, source) = resolve_sections(&cli_sections, std::env::vars())?;
//! let settings = SyncSettings::builder()
//!     .remote_url("https://host.example")
//!     .credentials("user", "pass")
//!     .database_path("/var/lib/content-mirror/catalog.db")
//!     .storage_root("/var/lib/content-mirror/objects")
//!     .sections(sections)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix for section definitions.
pub const SECTION_ENV_PREFIX: &str = "CONTENT_MIRROR_SECTION_";

/// One library bucket mirrored from one remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub section: String,
    /// Raw slug, `/`-delimited path of folder names, or a single folder name
    pub folder_reference: String,
    pub display_name: Option<String>,
}

impl SectionConfig {
    pub fn new(section: impl Into<String>, folder_reference: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            folder_reference: folder_reference.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Parse a command-line value: `<section>=<folder reference>[|<display name>]`.
    pub fn parse_arg(value: &str) -> Result<Self> {
        let (section, rest) = value.split_once('=').ok_or_else(|| {
            Error::Validation(format!(
                "Section '{}' must look like <section>=<folder reference>[|<display name>]",
                value
            ))
        })?;

        Self::from_parts(section, rest)
    }

    /// Parse an environment pair: `CONTENT_MIRROR_SECTION_<NAME>=<folder reference>[|<display name>]`.
    ///
    /// Returns `Ok(None)` for variables outside the naming convention.
    pub fn parse_env(key: &str, value: &str) -> Result<Option<Self>> {
        let Some(name) = key.strip_prefix(SECTION_ENV_PREFIX) else {
            return Ok(None);
        };

        Self::from_parts(&name.to_ascii_lowercase(), value).map(Some)
    }

    fn from_parts(section: &str, rest: &str) -> Result<Self> {
        let (reference, display_name) = match rest.rsplit_once('|') {
            Some((reference, display)) => (reference, Some(display.trim())),
            None => (rest, None),
        };

        let config = Self {
            section: section.trim().to_string(),
            folder_reference: reference.trim().to_string(),
            display_name: display_name
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.section.is_empty() {
            return Err(Error::Validation("Section name cannot be empty".to_string()));
        }

        let valid_name = self
            .section
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid_name {
            return Err(Error::Validation(format!(
                "Section name '{}' may only contain lowercase letters, digits, '-' and '_'",
                self.section
            )));
        }

        if self.folder_reference.trim_matches('/').is_empty() {
            return Err(Error::Validation(format!(
                "Section '{}' has an empty folder reference",
                self.section
            )));
        }

        Ok(())
    }

    /// Human-readable root name used in breadcrumbs: the display name, else
    /// the name the reference resolved to, else the reference itself.
    pub fn root_title<'a>(&'a self, resolved_name: Option<&'a str>) -> &'a str {
        self.display_name
            .as_deref()
            .or(resolved_name)
            .unwrap_or(self.folder_reference.as_str())
    }
}

/// Where the section list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    CommandLine,
    Environment,
}

impl fmt::Display for SectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionSource::CommandLine => f.write_str("command line"),
            SectionSource::Environment => f.write_str("environment"),
        }
    }
}

/// Pick exactly one section source and parse it.
///
/// # Errors
///
/// `Error::Validation` when no section is configured, when a value is
/// malformed, or when the same section is configured twice.
pub fn resolve_sections<I>(cli_values: &[String], env: I) -> Result<(Vec<SectionConfig>, SectionSource)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let (sections, source) = if !cli_values.is_empty() {
        let sections = cli_values
            .iter()
            .map(|value| SectionConfig::parse_arg(value))
            .collect::<Result<Vec<_>>>()?;
        (sections, SectionSource::CommandLine)
    } else {
        let mut pairs: Vec<(String, String)> = env
            .into_iter()
            .filter(|(key, _)| key.starts_with(SECTION_ENV_PREFIX))
            .collect();
        // Environment iteration order is unspecified.
        pairs.sort();

        let mut sections = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if let Some(section) = SectionConfig::parse_env(&key, &value)? {
                sections.push(section);
            }
        }
        (sections, SectionSource::Environment)
    };

    if sections.is_empty() {
        return Err(Error::Validation(format!(
            "No sections configured. Pass --section <section>=<folder reference> \
             or set {}<NAME>",
            SECTION_ENV_PREFIX
        )));
    }

    let mut seen = HashSet::new();
    for section in &sections {
        if !seen.insert(section.section.as_str()) {
            return Err(Error::Validation(format!(
                "Section '{}' is configured more than once",
                section.section
            )));
        }
    }

    Ok((sections, source))
}

/// Credentials for the remote file host.
#[derive(Clone)]
pub struct RemoteCredentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Tuning knobs for walking and mirroring.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncTuning {
    /// Parallel mirror uploads during drain
    pub mirror_concurrency: usize,
    /// Attempt ceiling per mirror job
    pub mirror_max_attempts: u32,
    /// Initial backoff between mirror attempts
    pub mirror_initial_backoff: Duration,
    /// Deepest BFS level explored when resolving a folder by name
    pub max_resolve_depth: usize,
    /// Deepest level walked below a section root
    pub max_walk_depth: usize,
    /// Pause between consecutive file-detail fetches
    pub detail_fetch_delay: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            mirror_concurrency: 5,
            mirror_max_attempts: 3,
            mirror_initial_backoff: Duration::from_millis(500),
            max_resolve_depth: 8,
            max_walk_depth: 32,
            detail_fetch_delay: Duration::from_millis(250),
        }
    }
}

/// Complete, validated configuration for one run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub credentials: RemoteCredentials,
    pub database_path: PathBuf,
    pub storage_root: PathBuf,
    pub sections: Vec<SectionConfig>,
    pub tuning: SyncTuning,
}

impl SyncSettings {
    pub fn builder() -> SyncSettingsBuilder {
        SyncSettingsBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let url = self.credentials.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Remote host URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        if self.credentials.username.is_empty() {
            return Err(Error::Config("Remote host username cannot be empty".to_string()));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.storage_root.as_os_str().is_empty() {
            return Err(Error::Config("Storage root cannot be empty".to_string()));
        }

        if self.sections.is_empty() {
            return Err(Error::Validation("At least one section is required".to_string()));
        }

        for section in &self.sections {
            section.validate()?;
        }

        let tuning = &self.tuning;
        if tuning.mirror_concurrency == 0 {
            return Err(Error::Config("Mirror concurrency must be at least 1".to_string()));
        }
        if tuning.mirror_max_attempts == 0 {
            return Err(Error::Config("Mirror attempts must be at least 1".to_string()));
        }
        if tuning.max_resolve_depth == 0 || tuning.max_walk_depth == 0 {
            return Err(Error::Config("Depth limits must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Builder for [`SyncSettings`].
#[derive(Debug, Default)]
pub struct SyncSettingsBuilder {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    database_path: Option<PathBuf>,
    storage_root: Option<PathBuf>,
    sections: Vec<SectionConfig>,
    tuning: SyncTuning,
}

impl SyncSettingsBuilder {
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn storage_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.storage_root = Some(path.into());
        self
    }

    pub fn sections(mut self, sections: Vec<SectionConfig>) -> Self {
        self.sections = sections;
        self
    }

    pub fn section(mut self, section: SectionConfig) -> Self {
        self.sections.push(section);
        self
    }

    pub fn tuning(mut self, tuning: SyncTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn build(self) -> Result<SyncSettings> {
        let base_url = self.base_url.ok_or_else(|| {
            Error::Config("Remote host URL is required. Set REMOTE_HOST_URL.".to_string())
        })?;

        let username = self.username.ok_or_else(|| {
            Error::Config("Remote host credentials are required.".to_string())
        })?;

        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let storage_root = self.storage_root.ok_or_else(|| {
            Error::Config("Storage root is required. Use .storage_root() to set it.".to_string())
        })?;

        let settings = SyncSettings {
            credentials: RemoteCredentials {
                base_url,
                username,
                password: self.password.unwrap_or_default(),
            },
            database_path,
            storage_root,
            sections: self.sections,
            tuning: self.tuning,
        };

        settings.validate()?;

        Ok(settings)
    }
}
