//! Lifecycle source selection
//!
//! Sources are tried in precedence order. Each one either succeeds, declines
//! (nothing applicable here, try the next) or fails fatally. A fatal failure
//! aborts resolution instead of falling through, so a broken config is never
//! papered over by a default.

use super::cloud_build::cloud_build_lifecycle;
use super::defaults::{default_lifecycle, Ecosystem};
use super::readme::parse_readme;
use super::substitute::Substitutions;
use super::{Lifecycle, LifecycleError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Cloud Build config looked up in the sample directory
pub const CLOUD_BUILD_CONFIG_FILE: &str = "cloudbuild.yaml";

/// README used when none is configured
pub const DEFAULT_README_FILE: &str = "README.md";

/// Default Cloud Run region
pub const DEFAULT_RUN_REGION: &str = "us-central1";

/// Everything a resolution needs, passed explicitly
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub sample_dir: PathBuf,
    pub substitutions: Substitutions,
    pub run_region: String,
    /// README path relative to `sample_dir`; [`DEFAULT_README_FILE`] if unset
    pub readme: Option<PathBuf>,
    pub cloud_build_substitutions: BTreeMap<String, String>,
}

impl ResolveContext {
    pub fn new(sample_dir: impl Into<PathBuf>, substitutions: Substitutions) -> Self {
        Self {
            sample_dir: sample_dir.into(),
            substitutions,
            run_region: DEFAULT_RUN_REGION.to_string(),
            readme: None,
            cloud_build_substitutions: BTreeMap::new(),
        }
    }

    pub fn with_run_region(mut self, run_region: impl Into<String>) -> Self {
        self.run_region = run_region.into();
        self
    }

    pub fn with_readme(mut self, readme: impl Into<PathBuf>) -> Self {
        self.readme = Some(readme.into());
        self
    }

    pub fn with_cloud_build_substitutions(mut self, substitutions: BTreeMap<String, String>) -> Self {
        self.cloud_build_substitutions = substitutions;
        self
    }

    pub fn readme_path(&self) -> PathBuf {
        let readme = self
            .readme
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_README_FILE));
        self.sample_dir.join(readme)
    }

    pub fn cloud_build_config_path(&self) -> PathBuf {
        self.sample_dir.join(CLOUD_BUILD_CONFIG_FILE)
    }
}

/// Where a resolved Lifecycle came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleSource {
    CloudBuild { path: PathBuf },
    Readme { path: PathBuf },
    Default { ecosystem: Ecosystem },
}

impl fmt::Display for LifecycleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleSource::CloudBuild { path } => {
                write!(f, "Cloud Build config {}", path.display())
            }
            LifecycleSource::Readme { path } => write!(f, "README {}", path.display()),
            LifecycleSource::Default { ecosystem } => write!(f, "{} defaults", ecosystem),
        }
    }
}

/// A Lifecycle together with the scratch files it depends on
///
/// The rewritten Cloud Build config must outlive execution of the Lifecycle.
/// Call [`ResolvedLifecycle::cleanup`] afterwards; dropping the value removes the
/// file as well, just without reporting failures.
#[derive(Debug)]
pub struct ResolvedLifecycle {
    pub lifecycle: Lifecycle,
    pub source: LifecycleSource,
    scratch: Option<TempPath>,
}

impl ResolvedLifecycle {
    pub fn new(lifecycle: Lifecycle, source: LifecycleSource) -> Self {
        Self {
            lifecycle,
            source,
            scratch: None,
        }
    }

    fn with_scratch(mut self, scratch: TempPath) -> Self {
        self.scratch = Some(scratch);
        self
    }

    pub fn scratch_file(&self) -> Option<&Path> {
        self.scratch.as_deref()
    }

    /// Removes scratch files, logging rather than failing
    pub fn cleanup(self) {
        if let Some(scratch) = self.scratch {
            let path = scratch.to_path_buf();
            match scratch.close() {
                Ok(()) => debug!(path = %path.display(), "Removed temporary Cloud Build config"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove temporary Cloud Build config"
                ),
            }
        }
    }
}

pub struct LifecycleResolver<'a> {
    context: &'a ResolveContext,
}

impl<'a> LifecycleResolver<'a> {
    pub fn new(context: &'a ResolveContext) -> Self {
        Self { context }
    }

    /// Resolves the Lifecycle from the first applicable source
    pub fn resolve(&self) -> Result<ResolvedLifecycle, LifecycleError> {
        if let Some(resolved) = self.from_cloud_build()? {
            return Ok(resolved);
        }

        if let Some(resolved) = self.from_readme()? {
            return Ok(resolved);
        }

        Ok(self.from_defaults())
    }

    fn from_cloud_build(&self) -> Result<Option<ResolvedLifecycle>, LifecycleError> {
        let path = self.context.cloud_build_config_path();
        if !path.is_file() {
            debug!(path = %path.display(), "No Cloud Build config");
            return Ok(None);
        }

        let (lifecycle, scratch) = cloud_build_lifecycle(
            &path,
            &self.context.substitutions,
            &self.context.run_region,
            &self.context.cloud_build_substitutions,
        )
        .map_err(|source| LifecycleError::CloudBuild {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "Using Cloud Build config");
        Ok(Some(
            ResolvedLifecycle::new(lifecycle, LifecycleSource::CloudBuild { path })
                .with_scratch(scratch),
        ))
    }

    fn from_readme(&self) -> Result<Option<ResolvedLifecycle>, LifecycleError> {
        let path = self.context.readme_path();
        if !path.is_file() {
            info!(path = %path.display(), "No README, falling back to defaults");
            return Ok(None);
        }

        match parse_readme(&path, &self.context.substitutions) {
            Ok(lifecycle) => {
                info!(
                    path = %path.display(),
                    commands = lifecycle.command_count(),
                    "Using build and deploy commands from README"
                );
                Ok(Some(ResolvedLifecycle::new(
                    lifecycle,
                    LifecycleSource::Readme { path },
                )))
            }
            Err(e) if e.is_decline() => {
                info!(path = %path.display(), reason = %e, "README declined");
                Ok(None)
            }
            Err(source) => Err(LifecycleError::Readme { path, source }),
        }
    }

    fn from_defaults(&self) -> ResolvedLifecycle {
        let ecosystem = Ecosystem::detect(&self.context.sample_dir);
        info!(%ecosystem, "Using default build and deploy commands");

        let lifecycle = default_lifecycle(
            ecosystem,
            &self.context.substitutions,
            &self.context.run_region,
        );
        ResolvedLifecycle::new(lifecycle, LifecycleSource::Default { ecosystem })
    }
}
