//! Shared types, error model, and configuration for reelsmith.
//!
//! This crate is the foundation depended on by all other reelsmith crates.
//! It provides:
//! - [`ReelsmithError`], the unified error type
//! - Domain types ([`CandidateRecord`], [`CategorizedRecord`], [`CompilationGroup`])
//! - Stage reports ([`FilterReport`], [`DedupReport`], [`GroupingReport`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod report;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CategorizationConfig, CategoryDef, CompilationConfig, DedupStrategy,
    DurationBounds, FilterConfig, OverflowPolicy, RuleToggles, SessionConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ReelsmithError, Result};
pub use report::{
    CategoryGrouping, CategoryStats, DedupReport, FilterReport, FuzzyDuplicate, GroupStats,
    GroupingReport,
};
pub use types::{
    AdmissionResult, CURRENT_SCHEMA_VERSION, CandidateRecord, CategorizedRecord,
    CompilationGroup, MalformedRecord, RecordId, RuleName, SessionId, UNCATEGORIZED,
};
