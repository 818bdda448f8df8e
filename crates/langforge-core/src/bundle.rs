//! Artifact bundle extraction from raw model output.
//!
//! The generative model is asked to emit named text files delimited by
//! sentinel lines:
//!
//! ```text
//! ===FILE <name>===
//! <content>
//! ===END===
//! ```
//!
//! [`parse_bundle`] recovers an [`ArtifactBundle`] from such a blob. Parsing
//! is deliberately tolerant: a truncated final segment (no closing sentinel)
//! is still captured, and a blob with no sentinels at all yields an empty
//! bundle. Structural problems are reported downstream by the validator,
//! never here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Grammar source artifact name (bison input).
pub const GRAMMAR_SOURCE: &str = "parser.y";
/// Lexer source artifact name (flex input).
pub const LEXER_SOURCE: &str = "flex.l";
/// Interpreter source artifact name.
pub const INTERPRETER_SOURCE: &str = "interpreter.c";
/// Language documentation artifact name.
pub const README: &str = "README.md";
/// Example program artifact name.
pub const EXAMPLE: &str = "example.txt";

/// Artifact names a bundle must carry to be considered complete.
pub const REQUIRED_ARTIFACTS: [&str; 5] = [
    GRAMMAR_SOURCE,
    LEXER_SOURCE,
    INTERPRETER_SOURCE,
    README,
    EXAMPLE,
];

const START_PREFIX: &str = "===FILE ";
const START_SUFFIX: &str = "===";
const END_SENTINEL: &str = "===END===";

/// A named set of generated text artifacts extracted from one model response.
///
/// Insertion order is preserved. Inserting under an existing name replaces
/// the previous content: the last write for a given name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    entries: IndexMap<String, String>,
}

impl ArtifactBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` under `name`, replacing any earlier entry.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(name.into(), content.into());
    }

    /// Returns the content stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Whether an entry exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries in the bundle.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
    }

    /// Whether every required artifact is present and non-empty.
    pub fn is_complete(&self) -> bool {
        REQUIRED_ARTIFACTS
            .iter()
            .all(|name| self.get(name).is_some_and(|content| !content.is_empty()))
    }
}

/// Extracts named artifacts from a raw model response.
///
/// Scans line by line. A start sentinel opens a named segment; an end
/// sentinel closes it and stores the collected content under its name. A
/// start sentinel encountered while a segment is still open saves that
/// segment if it collected any content and discards it otherwise. If the
/// text ends with a segment still open, everything collected so far is
/// saved under its name, so truncated model output loses at most the
/// closing sentinel.
pub fn parse_bundle(text: &str) -> ArtifactBundle {
    let mut bundle = ArtifactBundle::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_end();
        if let Some(name) = parse_start_sentinel(trimmed) {
            if let Some((prior, lines)) = open.take() {
                let content = finish_segment(&lines);
                if !content.is_empty() {
                    bundle.insert(prior, content);
                }
            }
            open = Some((name.to_string(), Vec::new()));
        } else if trimmed == END_SENTINEL {
            if let Some((name, lines)) = open.take() {
                bundle.insert(name, finish_segment(&lines));
            }
            // A stray end sentinel with nothing open is ignored.
        } else if let Some((_, lines)) = open.as_mut() {
            lines.push(line);
        }
        // Text outside any segment is discarded.
    }

    if let Some((name, lines)) = open {
        bundle.insert(name, finish_segment(&lines));
    }

    bundle
}

/// Returns the artifact name if `line` is a start sentinel.
fn parse_start_sentinel(line: &str) -> Option<&str> {
    let name = line.strip_prefix(START_PREFIX)?.strip_suffix(START_SUFFIX)?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Joins collected lines, dropping the leading run of blank lines and
/// trailing whitespace.
fn finish_segment(lines: &[&str]) -> String {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    lines[start..].join("\n").trim_end().to_string()
}
