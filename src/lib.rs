//! sample-tester - end-to-end tester for Cloud Run samples
//!
//! Given a sample directory, this library works out how the sample is built and
//! deployed, runs those commands against freshly named cloud resources, checks the
//! deployed service over HTTP and deletes what it created.
//!
//! # Core Concepts
//!
//! - **Lifecycle**: the ordered build and deploy commands for one sample
//! - **Lifecycle sources**: a `cloudbuild.yaml`, code blocks tagged with
//!   `sst-run-unix` in the README, or built-in defaults, tried in that order
//! - **Substitutions**: the generated service name and image URL swapped into
//!   every command so runs never collide
//!
//! # Example Usage
//!
//! ```no_run
//! use sample_tester::{LifecycleResolver, ResolveContext, Substitutions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ResolveContext::new(
//!     "samples/run/hello",
//!     Substitutions::new("run-hello-0a1b2c3d4e", "gcr.io/my-project/run-hello-abc1234"),
//! );
//! let resolved = LifecycleResolver::new(&context).resolve()?;
//!
//! println!("From {}:\n{}", resolved.source, resolved.lifecycle);
//! resolved.cleanup();
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`lifecycle`]: Lifecycle resolution and execution
//! - [`exec`]: external command execution
//! - [`gcloud`]: Cloud Run and Container Registry resources
//! - [`sample`]: a sample and the resources generated for it
//! - [`endpoints`]: HTTP checks against the deployed service

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod exec;
pub mod gcloud;
pub mod lifecycle;
pub mod sample;
pub mod util;

pub use config::{ConfigError, SstConfig};
pub use endpoints::{EndpointProber, EndpointTest, ProbeResult};
pub use exec::{CommandRunner, ExecError, SystemRunner};
pub use lifecycle::{
    CommandSpec, Lifecycle, LifecycleError, LifecycleResolver, LifecycleSource, ReadmeError,
    ResolveContext, ResolvedLifecycle, Substitutions,
};
pub use sample::{Sample, SampleOverrides};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_sample_tester() {
        assert_eq!(NAME, "sample-tester");
    }
}
