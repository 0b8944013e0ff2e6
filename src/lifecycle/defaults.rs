//! Static default Lifecycles
//!
//! Used when a sample carries neither a Cloud Build config nor a tagged README.
//! The build step depends on the sample's ecosystem; the deploy step is shared.

use super::substitute::Substitutions;
use super::{CommandSpec, Lifecycle};
use crate::exec::gcloud;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Maven build descriptor
pub const POM_FILE: &str = "pom.xml";

/// Container build descriptor
pub const DOCKERFILE: &str = "Dockerfile";

const JIB_MAVEN_GOAL: &str = "com.google.cloud.tools:jib-maven-plugin:2.0.0:build";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Maven project without a Dockerfile, built and pushed with Jib
    Maven,
    /// Anything else, built remotely from its Dockerfile or buildpacks
    Generic,
}

impl Ecosystem {
    pub fn detect(sample_dir: &Path) -> Self {
        let has_pom = sample_dir.join(POM_FILE).is_file();
        let has_dockerfile = sample_dir.join(DOCKERFILE).is_file();

        if has_pom && !has_dockerfile {
            Ecosystem::Maven
        } else {
            Ecosystem::Generic
        }
    }

    /// The command that builds the image and pushes it to `image_url`
    pub fn build_command(&self, image_url: &str) -> CommandSpec {
        match self {
            Ecosystem::Maven => CommandSpec::new(
                "mvn",
                [
                    "compile".to_string(),
                    JIB_MAVEN_GOAL.to_string(),
                    format!("-Dimage={}", image_url),
                ],
            ),
            Ecosystem::Generic => gcloud([
                "builds".to_string(),
                "submit".to_string(),
                format!("--tag={}", image_url),
            ]),
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ecosystem::Maven => write!(f, "maven"),
            Ecosystem::Generic => write!(f, "generic"),
        }
    }
}

/// Deploys `image_url` as the Cloud Run service `service_name`
pub fn deploy_command(service_name: &str, image_url: &str, run_region: &str) -> CommandSpec {
    gcloud([
        "run".to_string(),
        "deploy".to_string(),
        service_name.to_string(),
        format!("--image={}", image_url),
        "--platform=managed".to_string(),
        format!("--region={}", run_region),
    ])
}

/// Two-step build and deploy Lifecycle for `ecosystem`
pub fn default_lifecycle(
    ecosystem: Ecosystem,
    substitutions: &Substitutions,
    run_region: &str,
) -> Lifecycle {
    [
        ecosystem.build_command(&substitutions.image_url),
        deploy_command(
            &substitutions.service_name,
            &substitutions.image_url,
            run_region,
        ),
    ]
    .into_iter()
    .collect()
}
