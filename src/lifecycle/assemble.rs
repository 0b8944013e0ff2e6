//! Turning a code block's raw lines into commands

use super::markdown::CodeBlock;
use super::readme::ReadmeError;
use super::substitute::{replace_registry_url, replace_service_name, Substitutions};
use super::{build_command, CommandSpec};
use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;
use tracing::debug;

const LINE_CONTINUATION: char = '\\';

fn env_reference_regex() -> &'static Regex {
    static ENV_REFERENCE: OnceLock<Regex> = OnceLock::new();
    ENV_REFERENCE.get_or_init(|| {
        Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("Invalid environment reference regex")
    })
}

/// Expands `$NAME` and `${NAME}` against the process environment
///
/// Unset variables expand to an empty string. No other shell expansion forms are
/// understood.
pub fn expand_env(line: &str) -> String {
    env_reference_regex()
        .replace_all(line, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Strips a trailing unescaped backslash, if any
fn strip_continuation(line: &str) -> Option<&str> {
    let trailing = line
        .chars()
        .rev()
        .take_while(|c| *c == LINE_CONTINUATION)
        .count();
    if trailing % 2 == 1 {
        Some(&line[..line.len() - LINE_CONTINUATION.len_utf8()])
    } else {
        None
    }
}

/// Converts a code block into commands, one per logical line
///
/// Logical lines are formed by joining backslash continuations. Each one is then
/// split on spaces, has environment references expanded and the registry URL and
/// service name substituted, giving a program and its arguments.
pub fn to_commands(
    block: &CodeBlock,
    substitutions: &Substitutions,
) -> Result<Vec<CommandSpec>, ReadmeError> {
    let mut commands = Vec::new();
    let mut lines = block.lines().iter();

    while let Some(raw) = lines.next() {
        let mut line = raw.trim().to_string();
        if line.is_empty() {
            continue;
        }

        while let Some(joined) = strip_continuation(&line).map(str::to_string) {
            let next = lines
                .next()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .ok_or_else(|| ReadmeError::UnexpectedEndDuringContinuation {
                    block: block.dump(),
                })?;
            line = joined + next;
        }

        if let Some(command) = assemble_line(&line, substitutions) {
            commands.push(command);
        }
    }

    Ok(commands)
}

/// Splits a logical line on spaces, expanding each word and replacing registry URLs
///
/// Runs of literal spaces produce no tokens. A word that expands to nothing
/// leaves an empty token behind, so the service name slot keeps its position
/// when `$CLOUD_RUN_SERVICE_NAME` is unset.
fn tokenize(line: &str, image_url: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in line.split(' ').filter(|word| !word.is_empty()) {
        let expanded = expand_env(word);
        let before = tokens.len();
        tokens.extend(
            expanded
                .split(' ')
                .filter(|part| !part.is_empty())
                .map(|part| replace_registry_url(part, image_url)),
        );
        if tokens.len() == before {
            tokens.push(String::new());
        }
    }
    tokens
}

/// Builds a command from one logical line; `None` if nothing is left to run
fn assemble_line(line: &str, substitutions: &Substitutions) -> Option<CommandSpec> {
    let mut tokens = tokenize(line, &substitutions.image_url).into_iter();
    let program = tokens.find(|token| !token.is_empty())?;
    let mut args: Vec<String> = tokens.collect();

    if let Some(rule) = replace_service_name(&program, &mut args, &substitutions.service_name) {
        debug!(?rule, program = %program, "Replaced Cloud Run service name");
    }
    args.retain(|arg| !arg.is_empty());

    Some(build_command(&program, args))
}
