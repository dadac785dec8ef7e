//! End-to-end session pipeline: candidates → filter → dedupe → categorize →
//! group → manifests → session directory.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument};

use reelsmith_catalog::{CategorySet, Deduplicator, dedupe_and_categorize};
use reelsmith_filter::{filter, load_records};
use reelsmith_grouper::{CompilationManifest, GroupingOptions, ReconcileReport, group};
use reelsmith_shared::{
    AppConfig, CandidateRecord, CategorizedRecord, DedupReport, FilterReport, GroupingReport,
    MalformedRecord, Result, SessionId,
};

use crate::content::{ContentReport, content_report};
use crate::media::{MediaValidation, load_downloads, media_failures, validate_media};
use crate::session::{self, SessionHeader, load_manifests};

/// Configuration for [`run_session`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// JSON array of candidate records.
    pub input: PathBuf,
    /// Root under which the session directory is created.
    pub output_root: PathBuf,
    pub app: AppConfig,
    pub tool_version: String,
}

/// Result of [`run_session`].
#[derive(Debug)]
pub struct RunResult {
    pub session_id: SessionId,
    pub session_path: PathBuf,
    pub admitted: usize,
    pub rejected: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub groups: usize,
    pub elapsed: std::time::Duration,
}

/// Everything the pure stages produce for one candidate set.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub filter: FilterReport,
    pub dedup: DedupReport,
    pub categorized: Vec<CategorizedRecord>,
    pub grouping: GroupingReport,
    pub manifests: Vec<CompilationManifest>,
    pub content: ContentReport,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &RunResult) {}
}

/// Run every pure stage over already-normalized records.
///
/// The configuration is validated before any record is touched.
#[instrument(skip_all, fields(records = records.len()))]
pub fn run_stages(
    records: Vec<CandidateRecord>,
    malformed: Vec<MalformedRecord>,
    config: &AppConfig,
) -> Result<StageOutput> {
    config.validate()?;

    let (admitted, filter_report) = filter(records, &config.filter);
    let filter_report = filter_report.with_malformed(malformed);

    let categories = CategorySet::from_defs(&config.categorization.categories);
    let deduplicator = Deduplicator::from_config(&config.categorization);
    let catalog = dedupe_and_categorize(admitted, &categories, &deduplicator);

    let content = content_report(&catalog.records);
    let options = GroupingOptions::from(&config.compilation);
    let grouped = group(catalog.records.clone(), &options);
    let manifests = grouped
        .groups
        .iter()
        .map(CompilationManifest::from_group)
        .collect();

    Ok(StageOutput {
        filter: filter_report,
        dedup: catalog.dedup,
        categorized: catalog.records,
        grouping: grouped.report,
        manifests,
        content,
    })
}

/// Run the full session pipeline.
///
/// 1. Validate configuration
/// 2. Load and normalize candidates
/// 3. Filter, dedupe, categorize, group
/// 4. Assemble the session directory
#[instrument(skip_all, fields(input = %config.input.display()))]
pub fn run_session(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunResult> {
    let start = Instant::now();
    let session_id = SessionId::new();

    info!(%session_id, "starting session");

    progress.phase("Validating configuration");
    config.app.validate()?;

    progress.phase("Loading candidates");
    let (records, malformed) = load_records(&config.input)?;

    progress.phase("Filtering, deduplicating and grouping");
    let output = run_stages(records, malformed, &config.app)?;

    progress.phase("Writing session");
    let header = SessionHeader {
        id: session_id.clone(),
        output_root: config.output_root.clone(),
        input: config.input.clone(),
        tool_version: config.tool_version.clone(),
        config: config.app.clone(),
    };
    session::assemble_session(&header, &output)?;

    let result = RunResult {
        session_path: header.session_dir(),
        session_id,
        admitted: output.filter.admitted,
        rejected: output.filter.rejected,
        malformed: output.filter.malformed,
        duplicates: output.dedup.exact_duplicates + output.dedup.fuzzy_duplicates.len(),
        groups: output.manifests.len(),
        elapsed: start.elapsed(),
    };

    info!(
        session = %result.session_id,
        admitted = result.admitted,
        groups = result.groups,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "session complete"
    );

    progress.done(&result);
    Ok(result)
}

/// Check downloaded media for a session and reconcile the manifests.
#[instrument(skip_all, fields(session = %session_dir.display()))]
pub async fn validate_session(
    session_dir: &Path,
    downloads: &Path,
) -> Result<(MediaValidation, ReconcileReport)> {
    let manifests = load_manifests(session_dir)?;
    let entries = load_downloads(downloads)?;
    let validation = validate_media(entries).await;
    let failures = media_failures(&manifests, &validation);
    let report = session::apply_failures(session_dir, &failures)?;
    Ok((validation, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reelsmith_shared::{RuleName, UNCATEGORIZED};

    fn rec(id: &str, title: &str, day: u32, duration: u64) -> CandidateRecord {
        CandidateRecord {
            id: id.into(),
            title: title.into(),
            channel_id: "UC1".into(),
            channel_title: "City News".into(),
            published_at: Utc.with_ymd_and_hms(2022, 5, day, 0, 0, 0).unwrap(),
            duration_seconds: duration,
            view_count: 5_000,
            description: String::new(),
            tags: vec![],
            url: String::new(),
            resolution_height: None,
            file_size_bytes: None,
        }
    }

    #[test]
    fn stages_flow_end_to_end() {
        let records = vec![
            rec("a", "traffic stop on the highway", 1, 400),
            rec("b", "traffic stop on the highway", 2, 400),
            rec("c", "speeding driver pulled over at night", 3, 400),
            rec("d", "short clip", 4, 10),
            rec("e", "city council meeting", 5, 300),
        ];
        let output = run_stages(records, Vec::new(), &AppConfig::default()).expect("stages");

        assert_eq!(output.filter.admitted, 4);
        assert_eq!(output.filter.failures(RuleName::Duration), 1);
        assert_eq!(output.dedup.fuzzy_duplicates.len(), 1);
        assert_eq!(output.categorized.len(), 3);
        assert!(output.categorized.iter().any(|r| r.category == UNCATEGORIZED));

        let names: Vec<&str> = output.manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["traffic_stop_compilation_001", "uncategorized_compilation_001"]
        );
        assert_eq!(output.manifests[0].total_duration_seconds, 800);
        assert_eq!(output.content.summary.total_records, 3);
    }

    #[test]
    fn invalid_config_stops_before_records() {
        let mut config = AppConfig::default();
        config.filter.min_duration_seconds = 100;
        config.filter.max_duration_seconds = 10;
        let err = run_stages(vec![rec("a", "x", 1, 50)], Vec::new(), &config)
            .expect_err("should fail");
        assert!(matches!(err, reelsmith_shared::ReelsmithError::Config { .. }));
    }

    #[test]
    fn unsafe_category_name_fails_before_anything_is_written() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut app = AppConfig::default();
        app.categorization.categories[0].name = "police/fire".into();
        let config = RunConfig {
            input: PathBuf::from("../../../fixtures/json/candidates.fixture.json"),
            output_root: root.path().to_path_buf(),
            app,
            tool_version: "0.0.0-test".into(),
        };

        let err = run_session(&config, &SilentProgress).expect_err("should fail");
        assert!(matches!(err, reelsmith_shared::ReelsmithError::Config { .. }));
        let written = std::fs::read_dir(root.path()).expect("read root").count();
        assert_eq!(written, 0);
    }

    #[test]
    fn run_session_from_fixture() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = RunConfig {
            input: PathBuf::from("../../../fixtures/json/candidates.fixture.json"),
            output_root: root.path().to_path_buf(),
            app: AppConfig::default(),
            tool_version: "0.0.0-test".into(),
        };
        let result = run_session(&config, &SilentProgress).expect("run session");

        assert_eq!(result.malformed, 1);
        assert_eq!(result.admitted + result.rejected, 9);
        assert!(result.session_path.join(session::SESSION_FILE).exists());

        let filter_report: FilterReport = serde_json::from_str(
            &std::fs::read_to_string(result.session_path.join(session::FILTER_REPORT_FILE))
                .expect("read filter report"),
        )
        .expect("decode filter report");
        assert_eq!(filter_report.malformed_records[0].reason, "missing id");
    }

    #[tokio::test]
    async fn validate_session_removes_missing_media() {
        let root = tempfile::tempdir().expect("tempdir");
        let header = SessionHeader {
            id: SessionId::new(),
            output_root: root.path().to_path_buf(),
            input: PathBuf::from("inline"),
            tool_version: "0.0.0-test".into(),
            config: AppConfig::default(),
        };
        let records = vec![
            rec("a", "traffic stop one", 1, 400),
            rec("b", "pulled over by deputies", 2, 400),
        ];
        let output = run_stages(records, Vec::new(), &header.config).expect("stages");
        session::assemble_session(&header, &output).expect("assemble");

        let media = root.path().join("a.mp4");
        std::fs::write(&media, b"frames").expect("write media");
        let downloads = root.path().join("downloads.json");
        let index = serde_json::json!([
            { "id": "a", "filepath": media },
            { "id": "b", "filepath": root.path().join("gone.mp4") }
        ]);
        std::fs::write(&downloads, index.to_string()).expect("write index");

        let (validation, report) = validate_session(&header.session_dir(), &downloads)
            .await
            .expect("validate");

        assert_eq!(validation.valid.len(), 1);
        assert_eq!(validation.invalid[0].error, "file does not exist");
        assert_eq!(report.failures_applied, 1);

        let manifests = load_manifests(&header.session_dir()).expect("reload");
        assert_eq!(manifests[0].members.len(), 1);
        assert_eq!(manifests[0].total_duration_seconds, 400);
    }
}
