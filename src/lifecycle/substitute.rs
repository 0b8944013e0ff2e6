//! Service name and registry URL substitution
//!
//! Commands lifted from READMEs and Cloud Build configs name their own Cloud Run
//! service and container image. Before they run, both are swapped for the values
//! generated for this test run so parallel runs never collide.
//!
//! Registry URLs are replaced wherever they appear. Locating the service name is
//! a heuristic, tried in order on gcloud `run` commands only:
//!
//! 1. **Marker**: an argument equal to the value of `$CLOUD_RUN_SERVICE_NAME`
//! 2. **Verb**: the argument right after `deploy` or `update`
//! 3. **Failsafe**: the last argument that does not contain `--`
//!
//! Anything else passes through untouched.

use regex::{NoExpand, Regex};
use std::env;
use std::sync::OnceLock;

/// Environment variable a README may use to mark the service name slot
pub const SERVICE_NAME_ENV: &str = "CLOUD_RUN_SERVICE_NAME";

const RUN_KEYWORD: &str = "run";
const NAME_VERBS: &[&str] = &["deploy", "update"];
const FLAG_MARKER: &str = "--";
const GCLOUD_VARIANT_PREFIX: &str = "gcloud-";

/// Values injected into extracted commands for one test run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pub service_name: String,
    pub image_url: String,
}

impl Substitutions {
    pub fn new(service_name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            image_url: image_url.into(),
        }
    }
}

/// Which rule located the service name argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceNameRule {
    Marker,
    Verb,
    Failsafe,
}

fn registry_url_regex() -> &'static Regex {
    static REGISTRY_URL: OnceLock<Regex> = OnceLock::new();
    REGISTRY_URL.get_or_init(|| {
        Regex::new(r"(?:[a-z]+\.)?gcr\.io/[^\s/]+/\S+").expect("Invalid registry URL regex")
    })
}

/// True for `gcloud` or a `gcloud-` variant, by path or builder image name
///
/// Image tags and digests are ignored, so `gcr.io/cloud-builders/gcloud:latest`
/// and `gcr.io/cloud-builders/gcloud-slim` both count.
pub fn is_gcloud_program(program: &str) -> bool {
    let name = program.rsplit('/').next().unwrap_or(program);
    let name = name.split(['@', ':']).next().unwrap_or(name);
    name == crate::exec::GCLOUD || name.starts_with(GCLOUD_VARIANT_PREFIX)
}

/// Replaces every Container Registry URL in `text` with `image_url`
pub fn replace_registry_url(text: &str, image_url: &str) -> String {
    registry_url_regex()
        .replace_all(text, NoExpand(image_url))
        .into_owned()
}

/// Replaces the Cloud Run service name argument of a gcloud `run` command
///
/// Returns the rule that matched, or `None` when the command was left alone.
pub fn replace_service_name(
    program: &str,
    args: &mut [String],
    service_name: &str,
) -> Option<ServiceNameRule> {
    if !is_gcloud_program(program) || !args.iter().any(|arg| arg == RUN_KEYWORD) {
        return None;
    }

    let marker = env::var(SERVICE_NAME_ENV)
        .ok()
        .filter(|value| !value.is_empty());
    if let Some(marker) = marker {
        if let Some(arg) = args.iter_mut().find(|arg| **arg == marker) {
            *arg = service_name.to_string();
            return Some(ServiceNameRule::Marker);
        }
    }

    let verb_position = args
        .iter()
        .position(|arg| NAME_VERBS.contains(&arg.as_str()));
    if let Some(arg) = verb_position.and_then(|i| args.get_mut(i + 1)) {
        *arg = service_name.to_string();
        return Some(ServiceNameRule::Verb);
    }

    if let Some(arg) = args.iter_mut().rev().find(|arg| !arg.contains(FLAG_MARKER)) {
        *arg = service_name.to_string();
        return Some(ServiceNameRule::Failsafe);
    }

    None
}
