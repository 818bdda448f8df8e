//! Sandbox error types.

use thiserror::Error;

/// Errors raised while loading an interpreter module.
///
/// Load errors are fatal to the package they describe: a module that does
/// not decode or exposes no entry point can never be run, so callers must
/// not retry around these. Faults raised while *running* a program are not
/// errors in this sense; they resolve into
/// [`crate::SessionOutcome::Failed`].
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The packaged bytes are not a loadable wasm module.
    #[error("interpreter module failed to load: {reason}")]
    ModuleLoad { reason: String },

    /// The module exports neither `main` nor `main_file`.
    #[error("interpreter module exports no recognized entry point")]
    MissingEntryPoint,
}
