//! Configuration management for sst
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional `config.yaml` in the sample directory
//! 3. environment variables
//!
//! # Environment Variables
//!
//! - `SST_README`: README path relative to the sample directory - default: "README.md"
//! - `SST_RUN_REGION`: Cloud Run region - default: "us-central1"
//! - `SST_REQUEST_TIMEOUT`: Endpoint request timeout in seconds - default: "10"
//! - `SST_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use sample_tester::SstConfig;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SstConfig::load(Path::new("/path/to/sample"))?;
//! config.validate()?;
//! println!("{}", config);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::endpoints::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::lifecycle::resolver::{DEFAULT_README_FILE, DEFAULT_RUN_REGION};
use crate::lifecycle::{ResolveContext, Substitutions};

/// Per-sample configuration file
pub const SAMPLE_CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LOG_LEVEL: &str = "info";
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse an environment value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// Malformed sample config file
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Keys accepted in a sample's `config.yaml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SampleFile {
    readme: Option<PathBuf>,
    run_region: Option<String>,
    #[serde(default)]
    cloud_build_substitutions: BTreeMap<String, String>,
    request_timeout_secs: Option<u64>,
}

/// Main configuration structure for sst
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SstConfig {
    /// README path relative to the sample directory
    pub readme: PathBuf,

    /// Region samples are deployed to
    pub run_region: String,

    /// Extra Cloud Build substitutions, passed in key order
    pub cloud_build_substitutions: BTreeMap<String, String>,

    /// Endpoint request timeout in seconds
    pub request_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for SstConfig {
    fn default() -> Self {
        Self {
            readme: PathBuf::from(DEFAULT_README_FILE),
            run_region: DEFAULT_RUN_REGION.to_string(),
            cloud_build_substitutions: BTreeMap::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl SstConfig {
    /// Loads defaults, then the sample's `config.yaml` if present, then the environment
    pub fn load(sample_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = sample_dir.join(SAMPLE_CONFIG_FILE);
        if path.is_file() {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            config.apply_file(&path, &content)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path, content: &str) -> Result<(), ConfigError> {
        // An empty file deserializes to unit, not to a mapping
        if content.trim().is_empty() {
            return Ok(());
        }

        let file: SampleFile =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(readme) = file.readme {
            self.readme = readme;
        }
        if let Some(run_region) = file.run_region {
            self.run_region = run_region;
        }
        if let Some(timeout) = file.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        self.cloud_build_substitutions
            .extend(file.cloud_build_substitutions);

        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(readme) = env::var("SST_README") {
            self.readme = PathBuf::from(readme);
        }

        if let Ok(run_region) = env::var("SST_RUN_REGION") {
            self.run_region = run_region;
        }

        if let Ok(timeout) = env::var("SST_REQUEST_TIMEOUT") {
            self.request_timeout_secs =
                timeout
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::ParseError {
                        field: "SST_REQUEST_TIMEOUT".to_string(),
                        error: e.to_string(),
                    })?;
        }

        if let Ok(log_level) = env::var("SST_LOG_LEVEL") {
            self.log_level = log_level.to_lowercase();
        }

        Ok(())
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for an out-of-range timeout, an empty
    /// region or an unknown log level
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.run_region.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Cloud Run region must not be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolution context for `sample_dir` using these settings
    pub fn resolve_context(
        &self,
        sample_dir: impl Into<PathBuf>,
        substitutions: Substitutions,
    ) -> ResolveContext {
        ResolveContext::new(sample_dir, substitutions)
            .with_readme(self.readme.clone())
            .with_run_region(self.run_region.clone())
            .with_cloud_build_substitutions(self.cloud_build_substitutions.clone())
    }
}

impl fmt::Display for SstConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sst Configuration:")?;
        writeln!(f, "  README: {}", self.readme.display())?;
        writeln!(f, "  Run Region: {}", self.run_region)?;
        if !self.cloud_build_substitutions.is_empty() {
            writeln!(f, "  Cloud Build Substitutions:")?;
            for (key, value) in &self.cloud_build_substitutions {
                writeln!(f, "    {}={}", key, value)?;
            }
        }
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
