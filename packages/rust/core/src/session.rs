//! Session directory assembler.
//!
//! Every run writes its reports and compilation manifests under
//! `<output_root>/<session_id>/`, with a `session.json` index carrying a
//! checksum for each artifact. Reconciliation later rewrites manifests in
//! place and refreshes the index.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use reelsmith_grouper::{CollaboratorFailure, CompilationManifest, ReconcileReport, reconcile};
use reelsmith_shared::{AppConfig, CURRENT_SCHEMA_VERSION, ReelsmithError, Result, SessionId};

use crate::pipeline::StageOutput;

pub const SESSION_FILE: &str = "session.json";
pub const MANIFESTS_DIR: &str = "manifests";
pub const FILTER_REPORT_FILE: &str = "filter_report.json";
pub const DEDUP_REPORT_FILE: &str = "dedup_report.json";
pub const CATEGORIZED_FILE: &str = "categorized.json";
pub const GROUPING_REPORT_FILE: &str = "grouping_report.json";
pub const CONTENT_REPORT_FILE: &str = "content_report.json";
pub const RECONCILE_REPORT_FILE: &str = "reconcile_report.json";

/// Metadata for a single artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Path relative to the session directory.
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// `session.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    pub schema_version: u32,
    pub id: SessionId,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Candidate file the session was built from.
    pub input: String,
    /// Effective configuration snapshot.
    pub config: AppConfig,
    pub artifacts: Vec<ArtifactMeta>,
}

impl SessionManifest {
    pub fn artifact(&self, filename: &str) -> Option<&ArtifactMeta> {
        self.artifacts.iter().find(|a| a.filename == filename)
    }

    fn upsert_artifact(&mut self, meta: ArtifactMeta) {
        match self.artifacts.iter_mut().find(|a| a.filename == meta.filename) {
            Some(existing) => *existing = meta,
            None => self.artifacts.push(meta),
        }
    }
}

/// Identity of a session being written.
#[derive(Debug, Clone)]
pub struct SessionHeader {
    pub id: SessionId,
    pub output_root: PathBuf,
    pub input: PathBuf,
    pub tool_version: String,
    pub config: AppConfig,
}

impl SessionHeader {
    pub fn session_dir(&self) -> PathBuf {
        self.output_root.join(self.id.to_string())
    }
}

/// Write a complete session directory.
///
/// ```text
/// <output_root>/<session_id>/
/// ├── session.json
/// ├── filter_report.json
/// ├── dedup_report.json
/// ├── categorized.json
/// ├── grouping_report.json
/// ├── content_report.json
/// └── manifests/
///     └── <category>_compilation_NNN.json
/// ```
#[instrument(skip_all, fields(session = %header.id, manifests = output.manifests.len()))]
pub fn assemble_session(header: &SessionHeader, output: &StageOutput) -> Result<SessionManifest> {
    let session_dir = header.session_dir();
    let manifests_dir = session_dir.join(MANIFESTS_DIR);
    std::fs::create_dir_all(&manifests_dir)
        .map_err(|e| ReelsmithError::io(&manifests_dir, e))?;

    info!(path = %session_dir.display(), "writing session directory");

    let mut artifacts = vec![
        write_artifact(&session_dir, FILTER_REPORT_FILE, &output.filter)?,
        write_artifact(&session_dir, DEDUP_REPORT_FILE, &output.dedup)?,
        write_artifact(&session_dir, CATEGORIZED_FILE, &output.categorized)?,
        write_artifact(&session_dir, GROUPING_REPORT_FILE, &output.grouping)?,
        write_artifact(&session_dir, CONTENT_REPORT_FILE, &output.content)?,
    ];
    for manifest in &output.manifests {
        artifacts.push(write_manifest(&session_dir, manifest)?);
    }

    let now = Utc::now();
    let session = SessionManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: header.id.clone(),
        tool_version: header.tool_version.clone(),
        created_at: now,
        updated_at: now,
        input: header.input.display().to_string(),
        config: header.config.clone(),
        artifacts,
    };
    write_json(&session_dir.join(SESSION_FILE), &session)?;

    info!(
        artifacts = session.artifacts.len(),
        path = %session_dir.display(),
        "session assembly complete"
    );
    Ok(session)
}

/// Read and check `session.json`.
pub fn load_session(session_dir: &Path) -> Result<SessionManifest> {
    let path = session_dir.join(SESSION_FILE);
    if !path.exists() {
        return Err(ReelsmithError::validation(format!(
            "missing {SESSION_FILE} in {}",
            session_dir.display()
        )));
    }
    let content = std::fs::read_to_string(&path).map_err(|e| ReelsmithError::io(&path, e))?;
    let session: SessionManifest = serde_json::from_str(&content)
        .map_err(|e| ReelsmithError::validation(format!("invalid {SESSION_FILE}: {e}")))?;

    if session.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(ReelsmithError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            session.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }
    Ok(session)
}

/// Load every manifest of a session, ordered by category then sequence.
pub fn load_manifests(session_dir: &Path) -> Result<Vec<CompilationManifest>> {
    let dir = session_dir.join(MANIFESTS_DIR);
    let entries = std::fs::read_dir(&dir).map_err(|e| ReelsmithError::io(&dir, e))?;

    let mut manifests = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ReelsmithError::io(&dir, e))?.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ReelsmithError::io(&path, e))?;
        let manifest: CompilationManifest = serde_json::from_str(&content).map_err(|e| {
            ReelsmithError::validation(format!("invalid manifest {}: {e}", path.display()))
        })?;
        manifests.push(manifest);
    }

    manifests.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then(a.sequence_number.cmp(&b.sequence_number))
    });
    Ok(manifests)
}

/// Read a collaborator failure list (a JSON array).
pub fn load_failures(path: &Path) -> Result<Vec<CollaboratorFailure>> {
    let content = std::fs::read_to_string(path).map_err(|e| ReelsmithError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ReelsmithError::parse(format!("invalid failure list {}: {e}", path.display()))
    })
}

/// Fold collaborator failures into a session's manifests.
///
/// Changed manifests are rewritten; `reconcile_report.json` is written and
/// `session.json` checksums are refreshed.
#[instrument(skip_all, fields(session = %session_dir.display(), failures = failures.len()))]
pub fn apply_failures(
    session_dir: &Path,
    failures: &[CollaboratorFailure],
) -> Result<ReconcileReport> {
    let mut session = load_session(session_dir)?;
    let manifests = load_manifests(session_dir)?;
    let (reconciled, report) = reconcile(&manifests, failures);

    for (before, after) in manifests.iter().zip(&reconciled) {
        if before != after {
            session.upsert_artifact(write_manifest(session_dir, after)?);
        }
    }
    session.upsert_artifact(write_artifact(session_dir, RECONCILE_REPORT_FILE, &report)?);
    session.updated_at = Utc::now();
    write_json(&session_dir.join(SESSION_FILE), &session)?;

    info!(
        rewritten = report.manifests.len(),
        unmatched = report.unmatched.len(),
        "session reconciled"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_manifest(session_dir: &Path, manifest: &CompilationManifest) -> Result<ArtifactMeta> {
    let relative = format!("{MANIFESTS_DIR}/{}", manifest.file_name());
    write_artifact(session_dir, &relative, manifest)
}

/// Serialize `value` and write it atomically, returning its checksum.
fn write_artifact<T: Serialize>(session_dir: &Path, relative: &str, value: &T) -> Result<ArtifactMeta> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(&session_dir.join(relative), content.as_bytes())?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    debug!(file = %relative, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: relative.to_string(),
        sha256: hash,
        size_bytes: content.len(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes())
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ReelsmithError::validation(format!("not a file path: {}", target.display())))?;
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ReelsmithError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| ReelsmithError::io(target, e))?;
    Ok(())
}
