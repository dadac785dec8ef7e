//! Application configuration for reelsmith.
//!
//! User config lives at `~/.reelsmith/reelsmith.toml`.
//! A `--config` path overrides the default location; missing keys fall back
//! to the defaults below.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReelsmithError, Result};
use crate::types::{RuleName, UNCATEGORIZED};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reelsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reelsmith";

// ---------------------------------------------------------------------------
// Config structs (matching reelsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Admission predicates.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Deduplication and category definitions.
    #[serde(default)]
    pub categorization: CategorizationConfig,

    /// Compilation duration band and grouping policy.
    #[serde(default)]
    pub compilation: CompilationConfig,

    /// Session artifact output.
    #[serde(default)]
    pub session: SessionConfig,
}

/// `[filter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_duration_seconds")]
    pub min_duration_seconds: u64,

    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u64,

    #[serde(default = "default_min_views")]
    pub min_views: u64,

    /// Channel ids or channel titles (matched case-insensitively).
    #[serde(default)]
    pub blocked_channels: Vec<String>,

    /// At least one must occur in the searchable text (ignored when empty).
    #[serde(default)]
    pub required_keywords: Vec<String>,

    /// None may occur in the searchable text.
    #[serde(default)]
    pub excluded_keywords: Vec<String>,

    #[serde(default = "default_min_resolution_height")]
    pub min_resolution_height: u32,

    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Per-rule toggles.
    #[serde(default)]
    pub rules: RuleToggles,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_duration_seconds: default_min_duration_seconds(),
            max_duration_seconds: default_max_duration_seconds(),
            min_views: default_min_views(),
            blocked_channels: Vec::new(),
            required_keywords: Vec::new(),
            excluded_keywords: Vec::new(),
            min_resolution_height: default_min_resolution_height(),
            max_file_size_mb: default_max_file_size_mb(),
            rules: RuleToggles::default(),
        }
    }
}

impl FilterConfig {
    /// Whether a given admission rule is switched on.
    pub fn is_enabled(&self, rule: RuleName) -> bool {
        match rule {
            RuleName::Duration => self.rules.duration,
            RuleName::Views => self.rules.views,
            RuleName::Channel => self.rules.channel,
            RuleName::Keywords => self.rules.keywords,
            RuleName::Resolution => self.rules.resolution,
            RuleName::FileSize => self.rules.file_size,
        }
    }

    /// Upper bound for `file_size_bytes`.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1_048_576)
    }
}

fn default_min_duration_seconds() -> u64 {
    30
}
fn default_max_duration_seconds() -> u64 {
    3600
}
fn default_min_views() -> u64 {
    100
}
fn default_min_resolution_height() -> u32 {
    240
}
fn default_max_file_size_mb() -> u64 {
    500
}

/// `[filter.rules]` section. Every rule is on unless switched off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleToggles {
    #[serde(default = "default_true")]
    pub duration: bool,
    #[serde(default = "default_true")]
    pub views: bool,
    #[serde(default = "default_true")]
    pub channel: bool,
    #[serde(default = "default_true")]
    pub keywords: bool,
    #[serde(default = "default_true")]
    pub resolution: bool,
    #[serde(default = "default_true")]
    pub file_size: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            duration: true,
            views: true,
            channel: true,
            keywords: true,
            resolution: true,
            file_size: true,
        }
    }
}

impl RuleToggles {
    /// Switch a single rule on or off.
    pub fn set(&mut self, rule: RuleName, enabled: bool) {
        match rule {
            RuleName::Duration => self.duration = enabled,
            RuleName::Views => self.views = enabled,
            RuleName::Channel => self.channel = enabled,
            RuleName::Keywords => self.keywords = enabled,
            RuleName::Resolution => self.resolution = enabled,
            RuleName::FileSize => self.file_size = enabled,
        }
    }
}

fn default_true() -> bool {
    true
}

/// How the fuzzy duplicate pass scores two records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Token-set similarity of the titles alone.
    #[default]
    Title,
    /// Weighted blend of title, duration, and channel similarity.
    Metadata,
}

/// `[categorization]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationConfig {
    /// Records scoring at or above this against a retained record are dropped.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default)]
    pub dedup_strategy: DedupStrategy,

    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryDef>,
}

impl Default for CategorizationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            dedup_strategy: DedupStrategy::default(),
            categories: default_categories(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_categories() -> Vec<CategoryDef> {
    vec![
        CategoryDef {
            name: "traffic_stop".into(),
            keywords: vec!["traffic stop".into(), "pulled over".into(), "speeding".into()],
            priority: 1,
        },
        CategoryDef {
            name: "protest".into(),
            keywords: vec!["protest".into(), "demonstration".into(), "blm".into()],
            priority: 2,
        },
    ]
}

/// `[[categorization.categories]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub name: String,
    pub keywords: Vec<String>,
    /// Lower values are checked first.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    999
}

/// What the grouper does once a group has met its minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Close only when the next record would pass `max`; the minimum wins
    /// over the maximum when they conflict.
    #[default]
    MinFirst,
    /// Additionally close as soon as `target` and `min` are both reached,
    /// favoring more, shorter groups.
    TargetSplit,
}

/// `[compilation]` section. Durations are in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationConfig {
    #[serde(default = "default_target_minutes")]
    pub target_duration_minutes: f64,

    #[serde(default = "default_min_minutes")]
    pub min_duration_minutes: f64,

    #[serde(default = "default_max_minutes")]
    pub max_duration_minutes: f64,

    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Group `uncategorized` records under their own pseudo-category.
    #[serde(default = "default_true")]
    pub include_uncategorized: bool,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            target_duration_minutes: default_target_minutes(),
            min_duration_minutes: default_min_minutes(),
            max_duration_minutes: default_max_minutes(),
            overflow_policy: OverflowPolicy::default(),
            include_uncategorized: true,
        }
    }
}

impl CompilationConfig {
    /// Duration band converted to whole seconds.
    pub fn bounds(&self) -> DurationBounds {
        DurationBounds {
            target: minutes_to_seconds(self.target_duration_minutes),
            min: minutes_to_seconds(self.min_duration_minutes),
            max: minutes_to_seconds(self.max_duration_minutes),
        }
    }
}

fn minutes_to_seconds(minutes: f64) -> u64 {
    if minutes <= 0.0 {
        return 0;
    }
    (minutes * 60.0).round() as u64
}

fn default_target_minutes() -> f64 {
    15.0
}
fn default_min_minutes() -> f64 {
    10.0
}
fn default_max_minutes() -> f64 {
    20.0
}

/// Target/min/max compilation length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub target: u64,
    pub min: u64,
    pub max: u64,
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Root directory under which each session gets its own folder.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "sessions".into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Reject configurations no stage can run with.
    pub fn validate(&self) -> Result<()> {
        let filter = &self.filter;
        if filter.min_duration_seconds > filter.max_duration_seconds {
            return Err(ReelsmithError::config(format!(
                "filter.min_duration_seconds ({}) exceeds filter.max_duration_seconds ({})",
                filter.min_duration_seconds, filter.max_duration_seconds
            )));
        }

        let cat = &self.categorization;
        if cat.categories.is_empty() {
            return Err(ReelsmithError::config("category list is empty"));
        }
        if !(0.0..=1.0).contains(&cat.similarity_threshold) {
            return Err(ReelsmithError::config(format!(
                "similarity_threshold {} is outside [0, 1]",
                cat.similarity_threshold
            )));
        }

        let mut seen = HashSet::new();
        for def in &cat.categories {
            let name = def.name.trim();
            if name.is_empty() {
                return Err(ReelsmithError::config("category with an empty name"));
            }
            if name.eq_ignore_ascii_case(UNCATEGORIZED) {
                return Err(ReelsmithError::config(format!(
                    "'{UNCATEGORIZED}' is reserved and cannot be configured as a category"
                )));
            }
            if name.starts_with('.') || name.chars().any(|c| matches!(c, '/' | '\\') || c.is_control()) {
                return Err(ReelsmithError::config(format!(
                    "category '{name}' cannot be used as a file name (no path separators or leading '.')"
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(ReelsmithError::config(format!("duplicate category '{name}'")));
            }
            if def.keywords.iter().all(|k| k.trim().is_empty()) {
                tracing::warn!(category = name, "category has no keywords and will never match");
            }
        }

        let comp = &self.compilation;
        for (key, value) in [
            ("target_duration_minutes", comp.target_duration_minutes),
            ("min_duration_minutes", comp.min_duration_minutes),
            ("max_duration_minutes", comp.max_duration_minutes),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ReelsmithError::config(format!(
                    "compilation.{key} must be a non-negative number, got {value}"
                )));
            }
        }

        let bounds = comp.bounds();
        if bounds.max == 0 {
            return Err(ReelsmithError::config("compilation.max_duration_minutes must be positive"));
        }
        if bounds.min > bounds.max {
            return Err(ReelsmithError::config(format!(
                "compilation min duration ({}s) exceeds max duration ({}s)",
                bounds.min, bounds.max
            )));
        }
        if bounds.target < bounds.min || bounds.target > bounds.max {
            tracing::warn!(
                target_secs = bounds.target,
                min_secs = bounds.min,
                max_secs = bounds.max,
                "compilation target lies outside the min/max band"
            );
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reelsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReelsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reelsmith/reelsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReelsmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ReelsmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReelsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ReelsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReelsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("min_duration_seconds"));
        assert!(toml_str.contains("traffic_stop"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.filter.min_views, 100);
        assert_eq!(parsed.categorization.categories.len(), 2);
        assert_eq!(parsed.compilation.overflow_policy, OverflowPolicy::MinFirst);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[filter]
min_views = 5000
blocked_channels = ["spam_channel"]

[filter.rules]
views = false

[[categorization.categories]]
name = "chase"
keywords = ["pursuit", "chase"]
priority = 1

[compilation]
overflow_policy = "target_split"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.filter.min_views, 5000);
        assert_eq!(config.filter.max_duration_seconds, 3600);
        assert!(!config.filter.is_enabled(RuleName::Views));
        assert!(config.filter.is_enabled(RuleName::Duration));
        assert_eq!(config.categorization.categories.len(), 1);
        assert_eq!(config.compilation.overflow_policy, OverflowPolicy::TargetSplit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bounds_convert_minutes_to_seconds() {
        let comp = CompilationConfig {
            target_duration_minutes: 12.5,
            min_duration_minutes: 10.0,
            max_duration_minutes: 15.0,
            ..CompilationConfig::default()
        };
        assert_eq!(
            comp.bounds(),
            DurationBounds {
                target: 750,
                min: 600,
                max: 900
            }
        );
    }

    #[test]
    fn empty_category_list_is_rejected() {
        let mut config = AppConfig::default();
        config.categorization.categories.clear();
        let err = config.validate().expect_err("empty categories must fail");
        assert!(err.to_string().contains("category list is empty"));
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let mut config = AppConfig::default();
        config.categorization.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_above_max_is_rejected() {
        let mut config = AppConfig::default();
        config.compilation.min_duration_minutes = 30.0;
        let err = config.validate().expect_err("min > max must fail");
        assert!(err.to_string().contains("exceeds max duration"));

        let mut config = AppConfig::default();
        config.filter.min_duration_seconds = 4000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reserved_and_duplicate_category_names_are_rejected() {
        let mut config = AppConfig::default();
        config.categorization.categories.push(CategoryDef {
            name: "Uncategorized".into(),
            keywords: vec!["x".into()],
            priority: 5,
        });
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        let dup = config.categorization.categories[0].clone();
        config.categorization.categories.push(dup);
        let err = config.validate().expect_err("duplicate names must fail");
        assert!(err.to_string().contains("duplicate category"));
    }

    #[test]
    fn category_names_must_be_file_safe() {
        for bad in ["police/fire", "..", "../escape", ".hidden", "back\\slash", "tab\tname"] {
            let mut config = AppConfig::default();
            config.categorization.categories[0].name = bad.into();
            let err = config.validate().expect_err(bad);
            assert!(matches!(err, ReelsmithError::Config { .. }), "{bad}");
        }

        let mut config = AppConfig::default();
        config.categorization.categories[0].name = "police-fire v2".into();
        config.validate().expect("plain name is accepted");
    }

    #[test]
    fn file_size_limit_in_bytes() {
        let filter = FilterConfig {
            max_file_size_mb: 2,
            ..FilterConfig::default()
        };
        assert_eq!(filter.max_file_size_bytes(), 2 * 1_048_576);
    }
}
