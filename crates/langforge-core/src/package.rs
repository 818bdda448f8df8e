//! The built language package: the terminal artifact of a successful run.
//!
//! The build service returns the package as opaque bytes. Internally it is
//! a JSON manifest mapping entry names to contents, with the binary
//! interpreter module carried as base64. Five entries are required; a
//! package missing its module is unusable and decoding reports that as a
//! distinct, non-retryable error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Combined interpreter source entry.
pub const ENTRY_INTERPRETER_SOURCE: &str = "interpreter.c";
/// Loader notes entry, produced by the build service.
pub const ENTRY_LOADER: &str = "loader.txt";
/// Binary interpreter module entry.
pub const ENTRY_MODULE: &str = "interpreter.wasm";
/// Language documentation entry.
pub const ENTRY_README: &str = "README.md";
/// Example program entry.
pub const ENTRY_EXAMPLE: &str = "example.txt";

/// On-the-wire shape of a package: entry name to content, module base64.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    entries: IndexMap<String, String>,
}

/// A fully built language package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePackage {
    /// Combined interpreter source (lexer + parser + interpreter).
    pub interpreter_source: String,
    /// Loader notes emitted by the build service. Kept for download
    /// fidelity; the sandbox links the module against its host ABI and
    /// never evaluates this.
    pub loader_script: String,
    /// The compiled interpreter module.
    pub module: Vec<u8>,
    /// Language documentation.
    pub readme: String,
    /// Example program in the generated language.
    pub example: String,
}

impl LanguagePackage {
    /// Serializes the package to its byte representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut entries = IndexMap::new();
        entries.insert(
            ENTRY_INTERPRETER_SOURCE.to_string(),
            self.interpreter_source.clone(),
        );
        entries.insert(ENTRY_LOADER.to_string(), self.loader_script.clone());
        entries.insert(ENTRY_MODULE.to_string(), BASE64.encode(&self.module));
        entries.insert(ENTRY_README.to_string(), self.readme.clone());
        entries.insert(ENTRY_EXAMPLE.to_string(), self.example.clone());
        serde_json::to_vec(&Manifest { entries }).expect("manifest serialization is infallible")
    }

    /// Decodes a package from bytes, checking the fixed entry layout.
    ///
    /// A missing interpreter module yields [`CoreError::ModuleMissing`],
    /// which is fatal to the surrounding run; any other missing entry
    /// yields [`CoreError::EntryMissing`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;

        let text_entry = |name: &str| -> Result<String, CoreError> {
            manifest
                .entries
                .get(name)
                .cloned()
                .ok_or_else(|| CoreError::EntryMissing {
                    name: name.to_string(),
                })
        };

        let module_b64 = manifest
            .entries
            .get(ENTRY_MODULE)
            .ok_or(CoreError::ModuleMissing)?;
        let module = BASE64
            .decode(module_b64.as_bytes())
            .map_err(|source| CoreError::EntryEncoding {
                name: ENTRY_MODULE.to_string(),
                source,
            })?;

        Ok(LanguagePackage {
            interpreter_source: text_entry(ENTRY_INTERPRETER_SOURCE)?,
            loader_script: text_entry(ENTRY_LOADER)?,
            module,
            readme: text_entry(ENTRY_README)?,
            example: text_entry(ENTRY_EXAMPLE)?,
        })
    }
}
