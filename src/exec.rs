//! External command execution
//!
//! Lifecycle commands and the gcloud lookups around them all run through a
//! [`CommandRunner`]. [`SystemRunner`] spawns real processes; tests substitute
//! their own runner to record or fail commands.

use crate::lifecycle::CommandSpec;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// Program name of the Google Cloud CLI
pub const GCLOUD: &str = "gcloud";

/// Flags placed right after `gcloud` in every invocation
pub const GCLOUD_COMMON_FLAGS: &[&str] = &["--quiet"];

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed ({status}):\n{output}")]
    Failed {
        command: String,
        status: String,
        output: String,
    },
}

/// Runs a command inside a working directory
pub trait CommandRunner {
    /// Returns trimmed stdout on success
    fn run(&self, command: &CommandSpec, dir: &Path) -> Result<String, ExecError>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec, dir: &Path) -> Result<String, ExecError> {
        let line = command.to_string();
        info!(command = %line, dir = %dir.display(), "Running command");

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ExecError::Spawn {
                command: line.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let combined = format!("{}{}", stdout, stderr);
            return Err(ExecError::Failed {
                command: line,
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        debug!(command = %line, stderr = %stderr.trim(), "Command succeeded");
        Ok(stdout.trim().to_string())
    }
}

/// Builds a gcloud invocation with [`GCLOUD_COMMON_FLAGS`] ahead of `args`
pub fn gcloud<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    gcloud_at(GCLOUD, args)
}

/// Same as [`gcloud`] for a binary reached by another path, e.g. `/usr/bin/gcloud`
pub fn gcloud_at<I, S>(program: &str, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let all = GCLOUD_COMMON_FLAGS
        .iter()
        .map(|flag| flag.to_string())
        .chain(args.into_iter().map(Into::into));
    CommandSpec::new(program, all)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcloud_builder() {
        let command = gcloud(["run", "services", "list"]);
        assert_eq!(command.program, "gcloud");
        assert_eq!(command.args, vec!["--quiet", "run", "services", "list"]);
        assert!(command.is_gcloud());
    }

    #[test]
    fn test_gcloud_at_keeps_program_path() {
        let command = gcloud_at("/usr/bin/gcloud", ["run", "deploy", "x"]);
        assert_eq!(command.program, "/usr/bin/gcloud");
        assert_eq!(command.args, vec!["--quiet", "run", "deploy", "x"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let out = SystemRunner
            .run(&CommandSpec::new("ls", Vec::<String>::new()), dir.path())
            .unwrap();
        assert_eq!(out, "marker.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_combined_output() {
        let command = CommandSpec::new("sh", ["-c", "echo out; echo err >&2; exit 3"]);
        let err = SystemRunner.run(&command, Path::new(".")).unwrap_err();

        match err {
            ExecError::Failed {
                command,
                status,
                output,
            } => {
                assert!(command.starts_with("sh -c"));
                assert!(status.contains('3'));
                assert_eq!(output, "out\nerr");
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_system_runner_spawn_failure() {
        let command = CommandSpec::new("sst-definitely-not-a-program", Vec::<String>::new());
        let err = SystemRunner.run(&command, Path::new(".")).unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}
