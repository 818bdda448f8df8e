//! Core error types for langforge-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Bundle parsing
//! never errors (incomplete output is the validator's concern), so the
//! variants here cover the package layer only.

use thiserror::Error;

/// Core errors produced by the langforge-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The package manifest could not be read as JSON.
    #[error("package manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A required package entry is absent.
    #[error("package entry missing: '{name}'")]
    EntryMissing { name: String },

    /// The binary interpreter module is absent from the package.
    ///
    /// Fatal at unpack time: a package without its module can never be run,
    /// so callers must not retry around this variant.
    #[error("package is missing the interpreter module")]
    ModuleMissing,

    /// A binary package entry holds invalid base64.
    #[error("package entry '{name}' is not valid base64: {source}")]
    EntryEncoding {
        name: String,
        source: base64::DecodeError,
    },
}
