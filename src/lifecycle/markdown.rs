//! Tagged code block extraction from Markdown
//!
//! Only fenced code blocks whose opening fence sits on the line directly after a
//! line containing [`CODE_TAG`] are extracted, for example:
//!
//! ````markdown
//! [//]: # ({sst-run-unix})
//! ```
//! gcloud builds submit --tag=gcr.io/my-project/hello
//! ```
//! ````
//!
//! Lines are kept verbatim; continuation joining belongs to the assembler.

use super::readme::ReadmeError;
use regex::Regex;
use std::io::BufRead;
use std::sync::OnceLock;

/// Marker that must appear on the line immediately preceding a code block
pub const CODE_TAG: &str = "sst-run-unix";

/// Raw lines between a matched opening and closing fence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlock {
    lines: Vec<String>,
}

impl CodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Block content joined back together, used in error reports
    pub fn dump(&self) -> String {
        self.lines.join("\n")
    }
}

impl<S: Into<String>> FromIterator<S> for CodeBlock {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn opening_fence() -> &'static Regex {
    static OPENING_FENCE: OnceLock<Regex> = OnceLock::new();
    OPENING_FENCE.get_or_init(|| {
        Regex::new(r"^\s*\w*\s*(`{3,})[^`]*$").expect("Invalid opening fence regex")
    })
}

/// Matches a closing fence at least `run_length` backticks long
fn closing_fence(run_length: usize) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"^\s*\w*\s*`{{{},}}\s*\w*\s*$", run_length))
}

struct OpenBlock {
    opened_at: usize,
    closer: Regex,
    block: CodeBlock,
}

/// Scans a Markdown document and returns its tagged code blocks in document order
///
/// Fails with [`ReadmeError::NoCodeBlocksFound`] when the document holds no
/// tagged block; callers treat that as a reason to try another source rather
/// than as a malformed document.
pub fn extract_code_blocks<R: BufRead>(reader: R) -> Result<Vec<CodeBlock>, ReadmeError> {
    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock> = None;
    let mut awaiting_fence_after: Option<usize> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;

        if let Some(current) = open.as_mut() {
            if current.closer.is_match(&line) {
                if let Some(finished) = open.take() {
                    blocks.push(finished.block);
                }
            } else {
                current.block.push(line);
            }
            continue;
        }

        if awaiting_fence_after.take().is_some() {
            let run_length = opening_fence()
                .captures(&line)
                .and_then(|caps| caps.get(1))
                .map(|fence| fence.as_str().len())
                .ok_or_else(|| ReadmeError::CodeBlockStartNotFound {
                    line: line_number,
                    found: line.clone(),
                })?;

            open = Some(OpenBlock {
                opened_at: line_number,
                closer: closing_fence(run_length)?,
                block: CodeBlock::new(),
            });
            continue;
        }

        if line.contains(CODE_TAG) {
            awaiting_fence_after = Some(line_number);
        }
    }

    if let Some(tag_line) = awaiting_fence_after {
        return Err(ReadmeError::UnexpectedEofAfterTag { line: tag_line });
    }

    if let Some(current) = open {
        return Err(ReadmeError::CodeBlockNotClosed {
            line: current.opened_at,
        });
    }

    if blocks.is_empty() {
        return Err(ReadmeError::NoCodeBlocksFound);
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use yare::parameterized;

    fn extract(input: &str) -> Result<Vec<CodeBlock>, ReadmeError> {
        extract_code_blocks(Cursor::new(input))
    }

    fn block(lines: &[&str]) -> CodeBlock {
        lines.iter().copied().collect()
    }

    #[parameterized(
        single_block = {
            "[//]: # ({sst-run-unix})\n```\necho hello world\n```\n",
            vec![block(&["echo hello world"])]
        },
        two_lines = {
            "[//]: # ({sst-run-unix})\n```\necho line one\necho line two\n```\n",
            vec![block(&["echo line one", "echo line two"])]
        },
        two_blocks_with_text_between = {
            "[//]: # ({sst-run-unix})\n```\necho build command\n```\nmarkdown instructions\n[//]: # ({sst-run-unix})\n```\necho deploy command\n```\n",
            vec![block(&["echo build command"]), block(&["echo deploy command"])]
        },
        untagged_block_ignored = {
            "[//]: # ({sst-run-unix})\n```\necho build and deploy command\n```\nmarkdown instructions\n```\necho irrelevant command\n```\n",
            vec![block(&["echo build and deploy command"])]
        },
        info_string_on_fence = {
            "[//]: # ({sst-run-unix})\n```bash\necho hi\n```\n",
            vec![block(&["echo hi"])]
        },
        shorter_nested_fence_is_content = {
            "[//]: # ({sst-run-unix})\n````\ncat <<EOF\n```\nEOF\n````\n",
            vec![block(&["cat <<EOF", "```", "EOF"])]
        },
        longer_closing_fence = {
            "[//]: # ({sst-run-unix})\n```\necho hi\n`````\n",
            vec![block(&["echo hi"])]
        },
        raw_lines_preserved = {
            "[//]: # ({sst-run-unix})\n```\n  echo multi \\\n  line\n\n```\n",
            vec![block(&["  echo multi \\", "  line", ""])]
        },
    )]
    fn test_extract_code_blocks(input: &str, expected: Vec<CodeBlock>) {
        assert_eq!(extract(input).unwrap(), expected);
    }

    #[test]
    fn test_code_block_not_closed() {
        let err = extract("[//]: # ({sst-run-unix})\n```\necho hello world\n").unwrap_err();
        assert!(matches!(err, ReadmeError::CodeBlockNotClosed { line: 2 }));
    }

    #[test]
    fn test_code_block_start_not_found() {
        let err = extract(
            "[//]: # ({sst-run-unix})\nnot start of code block\n```\necho hello world\n```\n",
        )
        .unwrap_err();

        match err {
            ReadmeError::CodeBlockStartNotFound { line, found } => {
                assert_eq!(line, 2);
                assert_eq!(found, "not start of code block");
            }
            other => panic!("Expected CodeBlockStartNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_eof_after_code_tag() {
        let err = extract("instructions\n[//]: # ({sst-run-unix})\n").unwrap_err();
        assert!(matches!(err, ReadmeError::UnexpectedEofAfterTag { line: 2 }));
    }

    #[test]
    fn test_untagged_only_is_no_code_blocks() {
        let err = extract("```\necho hello world\n```\n").unwrap_err();
        assert!(matches!(err, ReadmeError::NoCodeBlocksFound));
        assert!(err.is_decline());
    }

    #[test]
    fn test_shorter_fence_does_not_close() {
        let err = extract("[//]: # ({sst-run-unix})\n````\necho hi\n```\n").unwrap_err();
        assert!(matches!(err, ReadmeError::CodeBlockNotClosed { line: 2 }));
    }

    #[test]
    fn test_block_count_matches_tags() {
        let mut doc = String::new();
        for i in 0..5 {
            doc.push_str("Some prose\n```\nuntagged\n```\n");
            doc.push_str(&format!("<!-- {CODE_TAG} -->\n```sh\necho {i}\n```\n"));
        }

        let blocks = extract(&doc).unwrap();
        assert_eq!(blocks.len(), 5);
        for (i, b) in blocks.iter().enumerate() {
            assert_eq!(b.lines(), &[format!("echo {i}")][..]);
        }
    }
}
