//! Google Cloud resources created for a sample
//!
//! Names are derived from the sample directory so a run can be traced back to
//! its sample, with a random or commit-based suffix keeping parallel runs apart.

use crate::exec::{gcloud, CommandRunner};
use crate::lifecycle::CommandSpec;
use anyhow::{bail, Context, Result};
use std::cell::OnceCell;
use std::env;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Longest name Cloud Run accepts for a service
pub const MAX_SERVICE_NAME_LEN: usize = 53;

/// Number of random hex characters appended to service names
pub const RANDOM_SUFFIX_LEN: usize = 10;

/// Overrides the project otherwise read from the gcloud configuration
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Name derived from the sample directory, leaving room for a suffix of `suffix_len` chars
///
/// Keeps the tail of the path (the most specific part), maps separators and other
/// characters Cloud Run rejects to `-`, and trims anything but letters from both
/// ends.
pub fn sample_name(sample_dir: &Path, suffix_len: usize) -> String {
    let path = sample_dir.to_string_lossy();
    let path = path.trim_end_matches('/');
    let budget = MAX_SERVICE_NAME_LEN.saturating_sub(suffix_len);

    let chars: Vec<char> = path.chars().collect();
    let tail = &chars[chars.len().saturating_sub(budget)..];

    let name: String = tail
        .iter()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    name.trim_matches(|c: char| !c.is_ascii_alphabetic())
        .to_string()
}

fn random_suffix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("-{}", &hex[..RANDOM_SUFFIX_LEN])
}

/// Unique Cloud Run service name for one run of the sample
pub fn generate_service_name(sample_dir: &Path) -> String {
    let suffix = random_suffix();
    format!("{}{}", sample_name(sample_dir, suffix.len()), suffix)
}

/// Container tag made of the sample name and the commit it was built from
pub fn container_tag(sample_dir: &Path, short_sha: &str) -> String {
    let suffix = format!("-{}", short_sha);
    format!("{}{}", sample_name(sample_dir, suffix.len()), suffix)
}

pub fn image_url(project: &str, tag: &str) -> String {
    format!("gcr.io/{}/{}", project, tag)
}

/// Abbreviated hash of the commit checked out in `dir`
pub fn short_sha(runner: &dyn CommandRunner, dir: &Path) -> Result<String> {
    let command = CommandSpec::new("git", ["rev-parse", "--verify", "--short", "HEAD"]);
    let sha = runner
        .run(&command, dir)
        .context("Failed to read the current commit")?;
    if sha.is_empty() {
        bail!("git returned an empty commit hash");
    }
    Ok(sha)
}

/// Project to deploy to: `$GOOGLE_CLOUD_PROJECT`, else the active gcloud configuration
pub fn project_id(runner: &dyn CommandRunner, dir: &Path) -> Result<String> {
    if let Some(project) = env::var(PROJECT_ENV).ok().filter(|p| !p.is_empty()) {
        debug!(project = %project, "Using project from environment");
        return Ok(project);
    }

    let project = runner
        .run(&gcloud(["config", "get-value", "core/project"]), dir)
        .context("Failed to read the active gcloud project")?;
    if project.is_empty() {
        bail!("No Google Cloud project configured; set {} or run `gcloud config set project`", PROJECT_ENV);
    }
    Ok(project)
}

/// Identity token sent as the bearer credential to deployed services
pub fn identity_token(runner: &dyn CommandRunner, dir: &Path) -> Result<String> {
    runner
        .run(&gcloud(["auth", "print-identity-token"]), dir)
        .context("Failed to obtain an identity token")
}

/// A Cloud Run service deployed by a sample's Lifecycle
#[derive(Debug)]
pub struct CloudRunService {
    name: String,
    region: String,
    url: OnceCell<String>,
}

impl CloudRunService {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            url: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root URL of the deployed service, looked up once
    pub fn url(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<String> {
        if let Some(url) = self.url.get() {
            return Ok(url.clone());
        }

        let url = runner
            .run(&self.describe_url_command(), dir)
            .with_context(|| format!("Failed to look up the URL of service {}", self.name))?;
        if url.is_empty() {
            bail!("Service {} has no URL; was it deployed?", self.name);
        }

        Ok(self.url.get_or_init(|| url).clone())
    }

    pub fn delete(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
        info!(service = %self.name, region = %self.region, "Deleting Cloud Run service");
        runner
            .run(&self.delete_command(), dir)
            .with_context(|| format!("Failed to delete service {}", self.name))?;
        Ok(())
    }

    fn describe_url_command(&self) -> CommandSpec {
        gcloud([
            "run".to_string(),
            "services".to_string(),
            "describe".to_string(),
            self.name.clone(),
            "--platform=managed".to_string(),
            format!("--region={}", self.region),
            "--format=value(status.url)".to_string(),
        ])
    }

    fn delete_command(&self) -> CommandSpec {
        gcloud([
            "run".to_string(),
            "services".to_string(),
            "delete".to_string(),
            self.name.clone(),
            "--platform=managed".to_string(),
            format!("--region={}", self.region),
        ])
    }
}

/// A container image pushed to Container Registry by a sample's Lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    url: String,
}

impl ContainerImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn delete(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
        info!(image = %self.url, "Deleting container image");
        runner
            .run(&gcloud(["container", "images", "delete", self.url.as_str()]), dir)
            .with_context(|| format!("Failed to delete image {}", self.url))?;
        Ok(())
    }
}
