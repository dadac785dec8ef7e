//! Media-file validation: the one isolated step that inspects the
//! filesystem for downloaded media before encoding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use reelsmith_grouper::{CollaboratorFailure, CollaboratorStage, CompilationManifest};
use reelsmith_shared::{RecordId, ReelsmithError, Result};

/// One entry of the fetch collaborator's downloads index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    #[serde(alias = "video_id")]
    pub id: RecordId,
    #[serde(default)]
    pub filepath: Option<PathBuf>,
    /// Sidecar written next to the media file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<PathBuf>,
}

/// An index entry whose media cannot be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidMedia {
    pub entry: DownloadEntry,
    pub error: String,
}

/// Outcome of [`validate_media`], in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaValidation {
    pub valid: Vec<DownloadEntry>,
    pub invalid: Vec<InvalidMedia>,
}

/// Read a downloads index (a JSON array of [`DownloadEntry`]).
pub fn load_downloads(path: &Path) -> Result<Vec<DownloadEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| ReelsmithError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ReelsmithError::parse(format!("invalid downloads index {}: {e}", path.display()))
    })
}

/// Check that each entry points at a non-empty regular file.
///
/// Entries are checked concurrently; results keep input order.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn validate_media(entries: Vec<DownloadEntry>) -> MediaValidation {
    let mut tasks = JoinSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let filepath = entry.filepath.clone();
        tasks.spawn(async move { (index, check_file(filepath.as_deref()).await) });
    }

    let mut verdicts: Vec<Option<std::result::Result<(), String>>> = vec![None; entries.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, verdict)) => verdicts[index] = Some(verdict),
            Err(e) => warn!(error = %e, "media check task failed"),
        }
    }

    let mut validation = MediaValidation::default();
    for (entry, verdict) in entries.into_iter().zip(verdicts) {
        match verdict.unwrap_or_else(|| Err("validation did not complete".into())) {
            Ok(()) => validation.valid.push(entry),
            Err(error) => {
                warn!(id = %entry.id, %error, "invalid media file");
                validation.invalid.push(InvalidMedia { entry, error });
            }
        }
    }

    info!(
        valid = validation.valid.len(),
        invalid = validation.invalid.len(),
        "media validation complete"
    );
    validation
}

async fn check_file(path: Option<&Path>) -> std::result::Result<(), String> {
    let path = match path {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Err("no filepath specified".into()),
    };

    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err("file does not exist".into());
        }
        Err(e) => return Err(format!("cannot stat file: {e}")),
    };

    if !meta.is_file() {
        return Err("path is not a file".into());
    }
    if meta.len() == 0 {
        return Err("file is empty".into());
    }
    Ok(())
}

/// Turn invalid or missing media into per-record failures for every
/// ready manifest member.
pub fn media_failures(
    manifests: &[CompilationManifest],
    validation: &MediaValidation,
) -> Vec<CollaboratorFailure> {
    let mut known: HashMap<&RecordId, Option<&str>> = HashMap::new();
    for entry in &validation.valid {
        known.insert(&entry.id, None);
    }
    for invalid in &validation.invalid {
        known.entry(&invalid.entry.id).or_insert(Some(invalid.error.as_str()));
    }

    let mut failures = Vec::new();
    for manifest in manifests.iter().filter(|m| m.is_ready()) {
        for member in &manifest.members {
            let failure = match known.get(&member.id) {
                Some(None) => continue,
                Some(Some(error)) => CollaboratorFailure::Record {
                    id: member.id.clone(),
                    stage: CollaboratorStage::Validate,
                    reason: error.to_string(),
                },
                None => CollaboratorFailure::Record {
                    id: member.id.clone(),
                    stage: CollaboratorStage::Fetch,
                    reason: "not present in downloads index".into(),
                },
            };
            failures.push(failure);
        }
    }
    failures
}
