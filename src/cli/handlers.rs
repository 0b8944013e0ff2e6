//! Command handlers
//!
//! Each handler returns the process exit code.

use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing::{debug, error, info};

use super::commands::{OverrideArgs, PlanArgs, RunArgs};
use super::output::{OutputFormat, OutputFormatter, PlanReport, RunReport};
use crate::config::SstConfig;
use crate::endpoints::{default_tests, EndpointProber, ProbeResult};
use crate::exec::{gcloud, CommandRunner, SystemRunner};
use crate::gcloud::identity_token;
use crate::sample::{Sample, SampleOverrides};

/// Service account key activated before anything else runs, when set
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

impl From<&OverrideArgs> for SampleOverrides {
    fn from(args: &OverrideArgs) -> Self {
        Self {
            service_name: args.service_name.clone(),
            image_url: args.image.clone(),
        }
    }
}

fn load_config(sample_dir: &Path) -> Option<SstConfig> {
    let config = match SstConfig::load(sample_dir) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return None;
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check {} and your SST_* environment variables.", crate::config::SAMPLE_CONFIG_FILE);
        return None;
    }

    debug!("Loaded configuration:\n{}", config);
    Some(config)
}

pub fn handle_plan(args: &PlanArgs) -> i32 {
    let Some(config) = load_config(&args.sample_dir) else {
        return 1;
    };

    let sample = match Sample::new(
        &args.sample_dir,
        &config,
        &SystemRunner,
        SampleOverrides::from(&args.overrides),
    ) {
        Ok(sample) => sample,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let report = PlanReport {
        sample: &sample.name,
        sample_dir: &sample.dir,
        service_name: sample.service.name(),
        image_url: sample.image.url(),
        source: &sample.resolved.source,
        lifecycle: &sample.resolved.lifecycle,
    };
    let formatted = OutputFormatter::new(OutputFormat::from(args.format)).format_plan(&report);
    sample.finish();

    match formatted {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            1
        }
    }
}

pub fn handle_run(args: &RunArgs, quiet: bool) -> i32 {
    let Some(config) = load_config(&args.sample_dir) else {
        return 1;
    };
    let runner = SystemRunner;

    if let Err(e) = activate_service_account(&runner, &args.sample_dir) {
        error!("{:#}", e);
        return 1;
    }

    let sample = match Sample::new(
        &args.sample_dir,
        &config,
        &runner,
        SampleOverrides::from(&args.overrides),
    ) {
        Ok(sample) => sample,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let outcome = deploy_and_check(&sample, &config, &runner);
    sample.teardown(&runner);

    let exit_code = match outcome {
        Ok((url, results)) => {
            let passed = results.iter().all(|r| r.passed);
            if !quiet {
                let report = RunReport {
                    sample: &sample.name,
                    service_name: sample.service.name(),
                    service_url: &url,
                    results: &results,
                    passed,
                };
                match OutputFormatter::new(OutputFormat::Human).format_run(&report) {
                    Ok(output) => println!("{}", output),
                    Err(e) => error!("Failed to format output: {:#}", e),
                }
            }
            if passed {
                info!(sample = %sample.name, "All endpoint checks passed");
                0
            } else {
                error!(sample = %sample.name, "Endpoint checks failed");
                1
            }
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    sample.finish();
    exit_code
}

fn activate_service_account(runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
    let Ok(key_file) = env::var(CREDENTIALS_ENV) else {
        debug!("{} not set, using the active gcloud account", CREDENTIALS_ENV);
        return Ok(());
    };

    info!(key_file = %key_file, "Activating service account");
    let command = gcloud([
        "auth".to_string(),
        "activate-service-account".to_string(),
        format!("--key-file={}", key_file),
    ]);
    runner
        .run(&command, dir)
        .context("Failed to activate service account")?;
    Ok(())
}

fn deploy_and_check(
    sample: &Sample,
    config: &SstConfig,
    runner: &dyn CommandRunner,
) -> Result<(String, Vec<ProbeResult>)> {
    info!(sample = %sample.name, "Building and deploying sample to Cloud Run");
    sample.build_and_deploy(runner)?;

    let token = identity_token(runner, &sample.dir)?;
    let url = sample.service.url(runner, &sample.dir)?;

    info!(url = %url, "Checking endpoints for expected results");
    let prober = EndpointProber::new(token, config.request_timeout())?;
    let results = prober.probe_all(&url, &default_tests())?;

    Ok((url, results))
}
