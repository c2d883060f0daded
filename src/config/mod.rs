//! Configuration Management
//!
//! Warehouse connection settings, resolved from built-in defaults, an
//! optional JSON config file, environment variables and finally explicit
//! overrides from the command line.

use crate::common::constants::*;
use crate::common::error::{PivotError, PivotResult};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Connection settings for the BigQuery collaborator
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Project that runs jobs and owns unqualified tables
    pub project: Option<String>,
    /// Job location, e.g. `US` or `europe-west1`
    pub location: Option<String>,
    /// REST endpoint root
    pub endpoint: String,
    /// OAuth bearer token. Obtaining one is up to the caller.
    pub access_token: Option<String>,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub page_size: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project: None,
            location: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// Hand-written so the token never ends up in logs
impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("project", &self.project)
            .field("location", &self.location)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl WarehouseConfig {
    /// Parse a JSON config document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> PivotResult<Self> {
        serde_json::from_str(json).map_err(|e| PivotError::Config(format!("invalid config: {}", e)))
    }

    /// Load a JSON config file
    pub fn from_file(path: &Path) -> PivotResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PivotError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&text).map_err(|e| match e {
            PivotError::Config(msg) => PivotError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Platform default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Resolve the full configuration.
    ///
    /// An explicit `path` must exist; the default path is used only if it
    /// does. Environment variables then override file values.
    pub fn load(path: Option<&Path>) -> PivotResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.is_file() => {
                    tracing::debug!(path = %default.display(), "loading default config file");
                    Self::from_file(&default)?
                }
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables, looked up via `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = non_empty(ENV_PROJECT).or_else(|| non_empty(ENV_PROJECT_FALLBACK)) {
            self.project = Some(project);
        }
        if let Some(location) = non_empty(ENV_LOCATION) {
            self.location = Some(location);
        }
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(token) = non_empty(ENV_ACCESS_TOKEN).or_else(|| non_empty(ENV_ACCESS_TOKEN_FALLBACK)) {
            self.access_token = Some(token);
        }
    }

    /// Apply explicit overrides (command-line flags)
    pub fn with_overrides(mut self, project: Option<String>, location: Option<String>) -> Self {
        if project.is_some() {
            self.project = project;
        }
        if location.is_some() {
            self.location = location;
        }
        self
    }

    pub fn validate(&self) -> PivotResult<()> {
        url::Url::parse(&self.endpoint).map_err(|e| {
            PivotError::Config(format!("endpoint '{}' is not a valid URL: {}", self.endpoint, e))
        })?;
        if self.page_size == 0 {
            return Err(PivotError::Config("page_size must be positive".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(PivotError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// The project, or a configuration error naming how to set it
    pub fn require_project(&self) -> PivotResult<&str> {
        self.project.as_deref().ok_or_else(|| {
            PivotError::Config(format!(
                "no project configured; pass --project or set {}",
                ENV_PROJECT
            ))
        })
    }
}
