//! A sample under test and the cloud resources generated for it

use crate::config::SstConfig;
use crate::exec::CommandRunner;
use crate::gcloud::{self, CloudRunService, ContainerImage};
use crate::lifecycle::{LifecycleResolver, ResolvedLifecycle, Substitutions};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Values that replace the generated service name or image URL
#[derive(Debug, Clone, Default)]
pub struct SampleOverrides {
    pub service_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug)]
pub struct Sample {
    pub name: String,
    pub dir: PathBuf,
    pub service: CloudRunService,
    pub image: ContainerImage,
    pub resolved: ResolvedLifecycle,
}

impl Sample {
    /// Names the sample's resources and resolves its build and deploy Lifecycle
    ///
    /// Anything not supplied through `overrides` is looked up with `runner`: the
    /// current commit for the image tag and the active project for the registry.
    pub fn new(
        dir: &Path,
        config: &SstConfig,
        runner: &dyn CommandRunner,
        overrides: SampleOverrides,
    ) -> Result<Self> {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("Sample directory {} not found", dir.display()))?;
        let name = gcloud::sample_name(&dir, 0);

        let service_name = overrides
            .service_name
            .unwrap_or_else(|| gcloud::generate_service_name(&dir));
        let image_url = match overrides.image_url {
            Some(url) => url,
            None => {
                let sha = gcloud::short_sha(runner, &dir)?;
                let project = gcloud::project_id(runner, &dir)?;
                gcloud::image_url(&project, &gcloud::container_tag(&dir, &sha))
            }
        };
        info!(sample = %name, service = %service_name, image = %image_url, "Configured sample");

        let context = config.resolve_context(
            dir.clone(),
            Substitutions::new(service_name.clone(), image_url.clone()),
        );
        let resolved = LifecycleResolver::new(&context)
            .resolve()
            .with_context(|| format!("Failed to resolve build and deploy commands for {}", name))?;
        info!(source = %resolved.source, "Resolved Lifecycle");

        Ok(Self {
            name,
            service: CloudRunService::new(service_name, config.run_region.clone()),
            image: ContainerImage::new(image_url),
            dir,
            resolved,
        })
    }

    /// Builds and deploys the sample
    pub fn build_and_deploy(&self, runner: &dyn CommandRunner) -> Result<()> {
        self.resolved
            .lifecycle
            .execute(runner, &self.dir)
            .with_context(|| format!("Failed to build and deploy {}", self.name))
    }

    /// Deletes the container image and the service, logging rather than failing
    pub fn teardown(&self, runner: &dyn CommandRunner) {
        if let Err(e) = self.image.delete(runner, &self.dir) {
            warn!(error = %format!("{:#}", e), "Container image cleanup failed");
        }
        if let Err(e) = self.service.delete(runner, &self.dir) {
            warn!(error = %format!("{:#}", e), "Cloud Run service cleanup failed");
        }
    }

    /// Removes scratch files left by Lifecycle resolution
    pub fn finish(self) {
        self.resolved.cleanup();
    }
}
