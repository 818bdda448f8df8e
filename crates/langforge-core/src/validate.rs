//! Structural validation of generated artifact bundles.
//!
//! The validator runs a fixed sequence of checks and fails fast on the
//! first violation, naming the offending artifact. A failing report is
//! final for the bundle it describes; recovering means generating a new
//! bundle, which is the orchestrator's decision, not the validator's.

use serde::{Deserialize, Serialize};

use crate::bundle::{
    ArtifactBundle, GRAMMAR_SOURCE, INTERPRETER_SOURCE, LEXER_SOURCE, REQUIRED_ARTIFACTS,
};

/// Minimum byte length for each required artifact. Anything shorter is a
/// trivially truncated generation even when the key is present.
pub const MIN_ARTIFACT_LEN: usize = 20;

/// Marker opening a flex/bison directives block.
const DIRECTIVES_OPENER: &str = "%{";
/// Marker separating the directives region from the rules region.
const RULES_SEPARATOR: &str = "%%";
/// Symbol a runnable interpreter source must define.
const ENTRY_POINT: &str = "main(";

/// Outcome of validating an [`ArtifactBundle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationReport {
    /// Every check passed.
    Pass,
    /// The first check that failed, naming the offending artifact.
    Fail { artifact: String, reason: String },
}

impl ValidationReport {
    /// Whether the bundle passed validation.
    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationReport::Pass)
    }

    fn fail(artifact: &str, reason: impl Into<String>) -> Self {
        ValidationReport::Fail {
            artifact: artifact.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validates a bundle's structural well-formedness.
///
/// Checks, in order, failing on the first violation:
/// 1. every required artifact is present;
/// 2. grammar and lexer sources carry a directives block and the `%%`
///    rules separator;
/// 3. the interpreter source defines an entry point;
/// 4. every required artifact meets [`MIN_ARTIFACT_LEN`].
pub fn validate_bundle(bundle: &ArtifactBundle) -> ValidationReport {
    let missing: Vec<&str> = REQUIRED_ARTIFACTS
        .iter()
        .copied()
        .filter(|name| !bundle.contains(name))
        .collect();
    if let Some(first) = missing.first() {
        return ValidationReport::fail(
            first,
            format!("missing required artifact(s): {}", missing.join(", ")),
        );
    }

    for name in [GRAMMAR_SOURCE, LEXER_SOURCE] {
        let content = bundle.get(name).unwrap_or_default();
        if !content.contains(DIRECTIVES_OPENER) {
            return ValidationReport::fail(name, "no directives block ('%{' opener not found)");
        }
        if !content.contains(RULES_SEPARATOR) {
            return ValidationReport::fail(name, "no rules separator ('%%' not found)");
        }
    }

    let interpreter = bundle.get(INTERPRETER_SOURCE).unwrap_or_default();
    if !interpreter.contains(ENTRY_POINT) {
        return ValidationReport::fail(INTERPRETER_SOURCE, "no entry point ('main(' not found)");
    }

    for name in REQUIRED_ARTIFACTS {
        let content = bundle.get(name).unwrap_or_default();
        if content.len() < MIN_ARTIFACT_LEN {
            return ValidationReport::fail(
                name,
                format!(
                    "content too short ({} bytes, minimum {})",
                    content.len(),
                    MIN_ARTIFACT_LEN
                ),
            );
        }
    }

    ValidationReport::Pass
}
