//! Session orchestration for reelsmith.
//!
//! Ties filtering, cataloging, and grouping into one run that writes a
//! session directory, and folds collaborator failures back into it.

pub mod content;
pub mod media;
pub mod pipeline;
pub mod session;

pub use content::{ContentReport, content_report};
pub use media::{DownloadEntry, InvalidMedia, MediaValidation, validate_media};
pub use pipeline::{
    ProgressReporter, RunConfig, RunResult, SilentProgress, StageOutput, run_session, run_stages,
    validate_session,
};
pub use session::{ArtifactMeta, SessionManifest, apply_failures, load_manifests, load_session};
