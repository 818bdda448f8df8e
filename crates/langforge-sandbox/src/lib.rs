//! Sandboxed execution of built interpreter modules.
//!
//! An [`Interpreter`] wraps the compiled wasm module from a
//! [`langforge_core::LanguagePackage`] and runs one user program at a time
//! against it. The module never touches the real console or filesystem:
//! program input arrives through a virtual input stream, standard output
//! and error land in in-memory buffers, and file operations go through a
//! per-session virtual file table that is emptied on every exit path.
//!
//! Two calling conventions are supported, selected by inspecting the
//! module's exports:
//! - **interactive**: the module exports `main: () -> i32` and pulls the
//!   program source byte by byte through the `source_read` host import;
//! - **file-argument**: the module exports `main_file: (ptr, len) -> i32`
//!   (plus `memory` and `alloc`) and receives the path of a virtual file
//!   holding the program source.
//!
//! Every run resolves to a [`SessionOutcome`]: `Completed` with a
//! transcript, or `Failed` with a diagnostic. No fault escapes the session
//! boundary.

pub mod error;
pub mod harness;
pub mod session;

// Re-export commonly used types
pub use error::SandboxError;
pub use harness::{CallingConvention, Interpreter, SessionOutcome};
pub use session::{OUTPUT_FILE, PROGRAM_FILE};
