//! README-driven Lifecycle resolution

use super::assemble::to_commands;
use super::markdown::{extract_code_blocks, CODE_TAG};
use super::substitute::Substitutions;
use super::Lifecycle;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReadmeError {
    #[error("line {line}: file ends right after the `{}` code tag", CODE_TAG)]
    UnexpectedEofAfterTag { line: usize },

    #[error("line {line}: expected a code fence after the code tag, found {found:?}")]
    CodeBlockStartNotFound { line: usize, found: String },

    #[error("code block opened at line {line} is never closed")]
    CodeBlockNotClosed { line: usize },

    #[error("no code blocks immediately preceded by `{}` found", CODE_TAG)]
    NoCodeBlocksFound,

    #[error("tagged code blocks contain no commands")]
    NoCommandsFound,

    #[error("code block ends in the middle of a line continuation:\n{block}")]
    UnexpectedEndDuringContinuation { block: String },

    #[error("invalid code fence pattern: {0}")]
    FencePattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ReadmeError {
    /// Whether this README simply has nothing for us, as opposed to being malformed
    pub fn is_decline(&self) -> bool {
        matches!(
            self,
            ReadmeError::NoCodeBlocksFound | ReadmeError::NoCommandsFound
        )
    }
}

/// Reads the README at `path` and builds a Lifecycle from its tagged code blocks
pub fn parse_readme(path: &Path, substitutions: &Substitutions) -> Result<Lifecycle, ReadmeError> {
    let file = File::open(path)?;
    extract_lifecycle(BufReader::new(file), substitutions)
}

/// Builds a Lifecycle from the tagged code blocks of a Markdown document
///
/// Blocks are processed in document order. A tagged block without any command
/// leaves a placeholder entry.
pub fn extract_lifecycle<R: BufRead>(
    reader: R,
    substitutions: &Substitutions,
) -> Result<Lifecycle, ReadmeError> {
    let blocks = extract_code_blocks(reader)?;
    debug!(blocks = blocks.len(), "Extracted tagged code blocks");

    let mut lifecycle = Lifecycle::new();
    for block in &blocks {
        let commands = to_commands(block, substitutions)?;
        if commands.is_empty() {
            lifecycle.push_placeholder();
        } else {
            lifecycle.extend(commands);
        }
    }

    if lifecycle.is_empty() {
        return Err(ReadmeError::NoCommandsFound);
    }

    Ok(lifecycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CommandSpec;
    use std::io::Cursor;

    fn extract(input: &str) -> Result<Lifecycle, ReadmeError> {
        extract_lifecycle(Cursor::new(input), &Substitutions::default())
    }

    #[test]
    fn test_single_code_block() {
        let lifecycle =
            extract("[//]: # ({sst-run-unix})\n```\necho hello world\n```\n").unwrap();
        let expected: Lifecycle = [CommandSpec::new("echo", ["hello", "world"])]
            .into_iter()
            .collect();
        assert_eq!(lifecycle, expected);
    }

    #[test]
    fn test_two_code_blocks_with_text_between() {
        let lifecycle = extract(
            "[//]: # ({sst-run-unix})\n```\necho build command\n```\nmarkdown instructions\n\
             [//]: # ({sst-run-unix})\n```\necho deploy command\n```\n",
        )
        .unwrap();

        let commands: Vec<String> = lifecycle.commands().map(|c| c.to_string()).collect();
        assert_eq!(commands, vec!["echo build command", "echo deploy command"]);
    }

    #[test]
    fn test_empty_block_leaves_placeholder() {
        let lifecycle = extract(
            "[//]: # ({sst-run-unix})\n```\n\n```\n[//]: # ({sst-run-unix})\n```\necho deploy\n```\n",
        )
        .unwrap();

        assert_eq!(lifecycle.entries().len(), 2);
        assert!(lifecycle.entries()[0].is_none());
        assert_eq!(lifecycle.command_count(), 1);
    }

    #[test]
    fn test_only_empty_blocks_is_decline() {
        let err = extract("[//]: # ({sst-run-unix})\n```\n\n```\n").unwrap_err();
        assert!(matches!(err, ReadmeError::NoCommandsFound));
        assert!(err.is_decline());
    }

    #[test]
    fn test_untagged_document_is_decline() {
        let err = extract("# Sample\n\n```\necho hello\n```\n").unwrap_err();
        assert!(err.is_decline());
    }

    #[test]
    fn test_malformed_document_is_not_decline() {
        let err = extract("[//]: # ({sst-run-unix})\nprose\n").unwrap_err();
        assert!(matches!(err, ReadmeError::CodeBlockStartNotFound { .. }));
        assert!(!err.is_decline());
    }

    #[test]
    fn test_continuation_error_propagates() {
        let err = extract("[//]: # ({sst-run-unix})\n```\necho multi \\\n```\n").unwrap_err();
        assert!(matches!(
            err,
            ReadmeError::UnexpectedEndDuringContinuation { .. }
        ));
    }

    #[test]
    fn test_parse_readme_missing_file() {
        let err = parse_readme(
            Path::new("/nonexistent/sst/README.md"),
            &Substitutions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReadmeError::Io(_)));
    }
}
