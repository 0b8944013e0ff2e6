//! Output formatting for multiple formats
//!
//! `sst plan` and `sst run` print their reports through [`OutputFormatter`] as
//! JSON, YAML or human-readable text.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::endpoints::ProbeResult;
use crate::lifecycle::{Lifecycle, LifecycleSource};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// What `sst plan` resolved for a sample
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub sample: &'a str,
    pub sample_dir: &'a Path,
    pub service_name: &'a str,
    pub image_url: &'a str,
    pub source: &'a LifecycleSource,
    pub lifecycle: &'a Lifecycle,
}

/// Endpoint check outcome of `sst run`
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub sample: &'a str,
    pub service_name: &'a str,
    pub service_url: &'a str,
    pub results: &'a [ProbeResult],
    pub passed: bool,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_plan(&self, report: &PlanReport<'_>) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(report).context("Failed to serialize plan to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize plan to YAML")
            }
            OutputFormat::Human => Ok(self.format_plan_human(report)),
        }
    }

    pub fn format_run(&self, report: &RunReport<'_>) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(report).context("Failed to serialize run report to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize run report to YAML")
            }
            OutputFormat::Human => Ok(self.format_run_human(report)),
        }
    }

    fn format_plan_human(&self, report: &PlanReport<'_>) -> String {
        let mut output = String::new();

        output.push_str("Build and Deploy Plan\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Sample:   {}\n", report.sample));
        output.push_str(&format!("Dir:      {}\n", report.sample_dir.display()));
        output.push_str(&format!("Service:  {}\n", report.service_name));
        output.push_str(&format!("Image:    {}\n", report.image_url));
        output.push_str(&format!("Source:   {}\n\n", report.source));

        output.push_str("Lifecycle:\n");
        output.push_str(&report.lifecycle.to_string());

        output
    }

    fn format_run_human(&self, report: &RunReport<'_>) -> String {
        let mut output = String::new();

        if report.passed {
            output.push_str("\u{2713} All endpoint checks passed\n");
        } else {
            output.push_str("\u{2717} Endpoint checks failed\n");
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Sample:   {}\n", report.sample));
        output.push_str(&format!("Service:  {}\n", report.service_name));
        output.push_str(&format!("URL:      {}\n\n", report.service_url));

        for result in report.results {
            let mark = if result.passed { "\u{2713}" } else { "\u{2717}" };
            output.push_str(&format!("  {} {} -> {}\n", mark, result.test, result.status));
        }

        output
    }
}
