//! Build and deploy command resolution
//!
//! A [`Lifecycle`] is the ordered list of external commands that builds a sample's
//! container image and deploys it. It is resolved from one of three sources, tried
//! in precedence order by [`LifecycleResolver`]:
//!
//! 1. a Cloud Build config (`cloudbuild.yaml`) in the sample directory
//! 2. code blocks tagged with [`CODE_TAG`] in the sample's README
//! 3. static defaults chosen from ecosystem marker files
//!
//! # Example
//!
//! ```no_run
//! use sample_tester::exec::SystemRunner;
//! use sample_tester::lifecycle::{LifecycleResolver, ResolveContext, Substitutions};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ResolveContext::new(
//!     "/path/to/sample",
//!     Substitutions::new("hello-run-1a2b3c4d5e", "gcr.io/my-project/hello-run-abc1234"),
//! );
//!
//! let resolved = LifecycleResolver::new(&context).resolve()?;
//! let result = resolved.lifecycle.execute(&SystemRunner, &context.sample_dir);
//! resolved.cleanup();
//! result?;
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod cloud_build;
pub mod defaults;
pub mod markdown;
pub mod readme;
pub mod resolver;
pub mod substitute;

pub use cloud_build::{CloudBuildConfig, CloudBuildError};
pub use defaults::Ecosystem;
pub use markdown::{CodeBlock, CODE_TAG};
pub use readme::ReadmeError;
pub use resolver::{LifecycleResolver, LifecycleSource, ResolveContext, ResolvedLifecycle};
pub use substitute::Substitutions;

use crate::exec::{CommandRunner, ExecError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors surfaced while resolving or executing a [`Lifecycle`]
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("parsing README {path}: {source}")]
    Readme { path: PathBuf, source: ReadmeError },

    #[error("using Cloud Build config {path}: {source}")]
    CloudBuild {
        path: PathBuf,
        source: CloudBuildError,
    },

    #[error("executing Lifecycle command #{index} `{command}`: {source}")]
    Execution {
        index: usize,
        command: String,
        source: ExecError,
    },
}

/// A single external program invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this command runs the gcloud CLI wrapper
    pub fn is_gcloud(&self) -> bool {
        substitute::is_gcloud_program(&self.program)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Ordered build and deploy commands for one sample
///
/// Entries may be `None`: an empty phase (for example a tagged README code block
/// holding no commands) keeps its slot as a placeholder and is skipped when the
/// Lifecycle executes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Lifecycle {
    entries: Vec<Option<CommandSpec>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: CommandSpec) {
        self.entries.push(Some(command));
    }

    pub fn push_placeholder(&mut self) {
        self.entries.push(None);
    }

    pub fn entries(&self) -> &[Option<CommandSpec>] {
        &self.entries
    }

    /// Iterates the real commands, skipping placeholders
    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.entries.iter().flatten()
    }

    pub fn command_count(&self) -> usize {
        self.commands().count()
    }

    /// True when the Lifecycle has nothing to run
    pub fn is_empty(&self) -> bool {
        self.command_count() == 0
    }

    /// Runs every command in order inside `dir`, stopping at the first failure
    ///
    /// Nothing is retried or rolled back; tearing down resources created by the
    /// commands that did succeed is left to the caller.
    pub fn execute(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<(), LifecycleError> {
        info!(
            commands = self.command_count(),
            dir = %dir.display(),
            "Executing Lifecycle"
        );

        for (index, entry) in self.entries.iter().enumerate() {
            let Some(command) = entry else {
                debug!(index, "Skipping empty Lifecycle entry");
                continue;
            };

            runner
                .run(command, dir)
                .map_err(|source| LifecycleError::Execution {
                    index,
                    command: command.to_string(),
                    source,
                })?;
        }

        Ok(())
    }
}

impl FromIterator<CommandSpec> for Lifecycle {
    fn from_iter<I: IntoIterator<Item = CommandSpec>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Some).collect(),
        }
    }
}

impl Extend<CommandSpec> for Lifecycle {
    fn extend<I: IntoIterator<Item = CommandSpec>>(&mut self, iter: I) {
        self.entries.extend(iter.into_iter().map(Some));
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            match entry {
                Some(command) => writeln!(f, "{:>3}. {}", index + 1, command)?,
                None => writeln!(f, "{:>3}. (empty)", index + 1)?,
            }
        }
        Ok(())
    }
}

/// Builds a command for `program`, routing the gcloud wrapper through its builder
pub(crate) fn build_command(program: &str, args: Vec<String>) -> CommandSpec {
    if substitute::is_gcloud_program(program) {
        crate::exec::gcloud_at(program, args)
    } else {
        CommandSpec::new(program, args)
    }
}
