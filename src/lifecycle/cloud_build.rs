//! Cloud Build config resolution
//!
//! A `cloudbuild.yaml` in the sample directory is taken as the sample's own
//! description of how it builds and deploys. The config is decoded into a small
//! typed model, its registry URLs and Cloud Run service names are rewritten for
//! this run, and the result is written to a temporary file which a single
//! `gcloud builds submit --config=...` command then runs.
//!
//! Fields this tool does not touch are carried through unchanged.

use super::substitute::{
    is_gcloud_program, replace_registry_url, replace_service_name, Substitutions,
};
use super::{CommandSpec, Lifecycle};
use crate::exec::gcloud;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;

/// Substitution carrying the Cloud Run region samples deploy to
pub const RUN_REGION_SUBSTITUTION: &str = "_SST_RUN_REGION";

#[derive(Debug, Error)]
pub enum CloudBuildError {
    #[error("reading Cloud Build config: {0}")]
    Read(#[source] io::Error),

    #[error("parsing Cloud Build config: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("serializing rewritten Cloud Build config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("writing temporary Cloud Build config: {0}")]
    TempFile(#[source] io::Error),
}

/// The parts of a Cloud Build config this tool rewrites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudBuildConfig {
    #[serde(default)]
    pub steps: Vec<BuildStep>,

    #[serde(flatten)]
    pub rest: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStep {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(flatten)]
    pub rest: Mapping,
}

impl BuildStep {
    /// The program this step runs: its entrypoint, or else the builder image
    pub fn program(&self) -> &str {
        self.entrypoint.as_deref().unwrap_or(&self.name)
    }
}

impl CloudBuildConfig {
    pub fn from_path(path: &Path) -> Result<Self, CloudBuildError> {
        let content = fs::read_to_string(path).map_err(CloudBuildError::Read)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, CloudBuildError> {
        serde_yaml::from_str(content).map_err(CloudBuildError::Parse)
    }

    pub fn to_yaml(&self) -> Result<String, CloudBuildError> {
        serde_yaml::to_string(self).map_err(CloudBuildError::Serialize)
    }

    /// Points every step at this run's image and Cloud Run service
    pub fn rewrite(&mut self, substitutions: &Substitutions) {
        for step in &mut self.steps {
            for arg in &mut step.args {
                *arg = replace_registry_url(arg, &substitutions.image_url);
            }

            if is_gcloud_program(step.program()) {
                let program = step.program().to_string();
                if let Some(rule) =
                    replace_service_name(&program, &mut step.args, &substitutions.service_name)
                {
                    debug!(?rule, step = %step.name, "Replaced Cloud Run service name");
                }
            }
        }
    }
}

/// Builds the `--substitutions` value: the run region first, then `extra` in key order
pub fn substitutions_arg(run_region: &str, extra: &BTreeMap<String, String>) -> String {
    std::iter::once(format!("{}={}", RUN_REGION_SUBSTITUTION, run_region))
        .chain(extra.iter().map(|(key, value)| format!("{}={}", key, value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// The single command that submits `config_path` to Cloud Build
pub fn submit_command(
    config_path: &Path,
    run_region: &str,
    extra: &BTreeMap<String, String>,
) -> CommandSpec {
    gcloud([
        "builds".to_string(),
        "submit".to_string(),
        format!("--config={}", config_path.display()),
        format!("--substitutions={}", substitutions_arg(run_region, extra)),
    ])
}

/// Rewrites the config at `path` into a temporary file and returns the Lifecycle
/// that submits it, together with the temporary file
///
/// The file is removed when the returned [`TempPath`] is dropped or closed, so the
/// caller keeps it alive until the Lifecycle has executed. On error nothing is
/// left behind.
pub fn cloud_build_lifecycle(
    path: &Path,
    substitutions: &Substitutions,
    run_region: &str,
    extra: &BTreeMap<String, String>,
) -> Result<(Lifecycle, TempPath), CloudBuildError> {
    let mut config = CloudBuildConfig::from_path(path)?;
    config.rewrite(substitutions);
    let rewritten = config.to_yaml()?;

    let mut file = tempfile::Builder::new()
        .prefix("sst-cloudbuild-")
        .suffix(".yaml")
        .tempfile()
        .map_err(CloudBuildError::TempFile)?;
    file.write_all(rewritten.as_bytes())
        .and_then(|_| file.flush())
        .map_err(CloudBuildError::TempFile)?;
    let temp_path = file.into_temp_path();

    let config_path: PathBuf = temp_path.to_path_buf();
    debug!(path = %config_path.display(), "Wrote rewritten Cloud Build config");

    let lifecycle = [submit_command(&config_path, run_region, extra)]
        .into_iter()
        .collect();
    Ok((lifecycle, temp_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONFIG: &str = r#"
steps:
  - name: gcr.io/cloud-builders/docker
    args: ['build', '-t', 'gcr.io/$PROJECT_ID/hello', '.']
  - name: gcr.io/cloud-builders/docker
    args: ['push', 'gcr.io/$PROJECT_ID/hello']
  - name: gcr.io/google.com/cloudsdktool/cloud-sdk
    entrypoint: gcloud
    args: ['run', 'deploy', 'hello', '--image', 'gcr.io/$PROJECT_ID/hello', '--region', '$_SST_RUN_REGION']
images:
  - gcr.io/$PROJECT_ID/hello
timeout: 1200s
"#;

    fn subs() -> Substitutions {
        Substitutions::new("svc-x", "gcr.io/p/tag")
    }

    #[test]
    #[serial]
    fn test_rewrite_steps() {
        std::env::remove_var(crate::lifecycle::substitute::SERVICE_NAME_ENV);
        let mut config = CloudBuildConfig::from_yaml(CONFIG).unwrap();
        config.rewrite(&subs());

        assert_eq!(config.steps[0].args, vec!["build", "-t", "gcr.io/p/tag", "."]);
        assert_eq!(config.steps[1].args, vec!["push", "gcr.io/p/tag"]);
        assert_eq!(
            config.steps[2].args,
            vec!["run", "deploy", "svc-x", "--image", "gcr.io/p/tag", "--region", "$_SST_RUN_REGION"]
        );
        assert_eq!(config.steps[0].name, "gcr.io/cloud-builders/docker");
    }

    #[test]
    #[serial]
    fn test_rewrite_tagged_and_variant_gcloud_builders() {
        std::env::remove_var(crate::lifecycle::substitute::SERVICE_NAME_ENV);
        let mut config = CloudBuildConfig::from_yaml(
            r#"
steps:
  - name: gcr.io/cloud-builders/gcloud:latest
    args: ['run', 'deploy', 'hello', '--image', 'gcr.io/$PROJECT_ID/hello']
  - name: gcr.io/cloud-builders/gcloud-slim
    args: ['run', 'deploy', 'hello', '--image', 'gcr.io/$PROJECT_ID/hello']
  - name: gcr.io/cloud-builders/docker
    args: ['run', 'deploy', 'hello']
"#,
        )
        .unwrap();
        config.rewrite(&subs());

        for step in &config.steps[..2] {
            assert_eq!(
                step.args,
                vec!["run", "deploy", "svc-x", "--image", "gcr.io/p/tag"],
                "step {}",
                step.name
            );
        }
        assert_eq!(config.steps[2].args, vec!["run", "deploy", "hello"]);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let config = CloudBuildConfig::from_yaml(CONFIG).unwrap();
        let yaml = config.to_yaml().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(value["timeout"], serde_yaml::Value::from("1200s"));
        assert_eq!(value["images"][0], serde_yaml::Value::from("gcr.io/$PROJECT_ID/hello"));
        assert_eq!(value["steps"][2]["entrypoint"], serde_yaml::Value::from("gcloud"));
    }

    #[test]
    fn test_malformed_config() {
        let err = CloudBuildConfig::from_yaml("steps: [ {args: nope").unwrap_err();
        assert!(matches!(err, CloudBuildError::Parse(_)));

        let err = CloudBuildConfig::from_yaml("steps:\n  - args: ['x']\n").unwrap_err();
        assert!(matches!(err, CloudBuildError::Parse(_)));
    }

    #[test]
    fn test_substitutions_arg() {
        let mut extra = BTreeMap::new();
        extra.insert("_B".to_string(), "2".to_string());
        extra.insert("_A".to_string(), "1".to_string());

        assert_eq!(
            substitutions_arg("us-central1", &extra),
            "_SST_RUN_REGION=us-central1,_A=1,_B=2"
        );
        assert_eq!(
            substitutions_arg("europe-west1", &BTreeMap::new()),
            "_SST_RUN_REGION=europe-west1"
        );
    }

    #[test]
    #[serial]
    fn test_cloud_build_lifecycle_writes_temp_file() {
        std::env::remove_var(crate::lifecycle::substitute::SERVICE_NAME_ENV);
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cloudbuild.yaml");
        fs::write(&path, CONFIG).unwrap();

        let (lifecycle, temp_path) =
            cloud_build_lifecycle(&path, &subs(), "us-central1", &BTreeMap::new()).unwrap();

        let written = fs::read_to_string(&temp_path).unwrap();
        assert!(written.contains("svc-x"));
        assert!(written.contains("gcr.io/p/tag"));

        let commands: Vec<&CommandSpec> = lifecycle.commands().collect();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, "gcloud");
        assert_eq!(
            commands[0].args,
            vec![
                "--quiet".to_string(),
                "builds".to_string(),
                "submit".to_string(),
                format!("--config={}", temp_path.display()),
                "--substitutions=_SST_RUN_REGION=us-central1".to_string(),
            ]
        );

        let kept = temp_path.to_path_buf();
        temp_path.close().unwrap();
        assert!(!kept.exists());
    }
}
