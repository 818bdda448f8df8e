pub mod bundle;
pub mod error;
pub mod package;
pub mod run;
pub mod validate;

// Re-export commonly used types
pub use bundle::{parse_bundle, ArtifactBundle};
pub use error::CoreError;
pub use package::LanguagePackage;
pub use run::{PipelinePhase, RunPhase, RunRecord, RunStatus};
pub use validate::{validate_bundle, ValidationReport};
