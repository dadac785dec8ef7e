//! Folding fetch/validate/encode failures back into compilation manifests.
//!
//! A failed record is removed from every manifest that lists it and the
//! manifest's duration is re-derived; a failed group is marked failed. No
//! manifest is renumbered, and a failure never touches sibling groups.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use reelsmith_shared::RecordId;

use crate::manifest::{CompilationManifest, ManifestStatus, RemovedMember};

/// Which external collaborator reported the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorStage {
    Fetch,
    Validate,
    Encode,
}

impl std::fmt::Display for CollaboratorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CollaboratorStage::Fetch => "fetch",
            CollaboratorStage::Validate => "validate",
            CollaboratorStage::Encode => "encode",
        })
    }
}

/// A partial-completion signal from a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum CollaboratorFailure {
    /// One record could not be fetched, validated, or encoded.
    Record {
        id: RecordId,
        stage: CollaboratorStage,
        reason: String,
    },
    /// A whole compilation could not be produced.
    Group {
        name: String,
        stage: CollaboratorStage,
        reason: String,
    },
}

/// What reconciliation changed in one manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileEntry {
    pub name: String,
    pub removed_ids: Vec<RecordId>,
    pub total_duration_seconds: u64,
    /// The whole group was reported failed.
    pub failed: bool,
    /// Every member was removed.
    pub emptied: bool,
}

/// `reconcile_report.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub failures_applied: usize,
    pub manifests: Vec<ReconcileEntry>,
    /// Failures naming records or groups that no manifest contains.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<CollaboratorFailure>,
}

/// Produce reduced manifests; untouched manifests are returned unchanged.
#[instrument(skip_all, fields(manifests = manifests.len(), failures = failures.len()))]
pub fn reconcile(
    manifests: &[CompilationManifest],
    failures: &[CollaboratorFailure],
) -> (Vec<CompilationManifest>, ReconcileReport) {
    // The first reported failure for a record or group is the one kept.
    let mut failed_records: HashMap<&RecordId, (CollaboratorStage, &str)> = HashMap::new();
    let mut failed_groups: HashMap<&str, (CollaboratorStage, &str)> = HashMap::new();
    for failure in failures {
        match failure {
            CollaboratorFailure::Record { id, stage, reason } => {
                failed_records.entry(id).or_insert((*stage, reason.as_str()));
            }
            CollaboratorFailure::Group {
                name,
                stage,
                reason,
            } => {
                failed_groups
                    .entry(name.as_str())
                    .or_insert((*stage, reason.as_str()));
            }
        }
    }

    let mut report = ReconcileReport::default();
    let mut matched_records: HashSet<&RecordId> = HashSet::new();
    let mut matched_groups: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(manifests.len());

    for manifest in manifests {
        let mut next = manifest.clone();
        let mut removed_ids = Vec::new();
        let mut failed = false;

        if let Some((stage, reason)) = failed_groups.get(manifest.name.as_str()) {
            matched_groups.insert(manifest.name.as_str());
            if manifest.is_ready() {
                warn!(manifest = %manifest.name, %stage, reason, "compilation failed");
                next.status = ManifestStatus::Failed {
                    stage: *stage,
                    reason: reason.to_string(),
                };
                failed = true;
            }
        }

        next.members.retain(|member| match failed_records.get(&member.id) {
            Some((stage, reason)) => {
                warn!(manifest = %manifest.name, id = %member.id, %stage, reason, "member removed");
                next.removed.push(RemovedMember {
                    id: member.id.clone(),
                    stage: *stage,
                    reason: reason.to_string(),
                });
                removed_ids.push(member.id.clone());
                false
            }
            None => true,
        });
        for member in &manifest.members {
            if let Some((key, _)) = failed_records.get_key_value(&member.id) {
                matched_records.insert(*key);
            }
        }

        if !removed_ids.is_empty() || failed {
            next.total_duration_seconds = next.derived_duration();
            let emptied = next.members.is_empty();
            if emptied && next.is_ready() {
                let stage = next
                    .removed
                    .last()
                    .map_or(CollaboratorStage::Validate, |r| r.stage);
                next.status = ManifestStatus::Failed {
                    stage,
                    reason: "every member failed".into(),
                };
            }
            report.manifests.push(ReconcileEntry {
                name: next.name.clone(),
                removed_ids,
                total_duration_seconds: next.total_duration_seconds,
                failed,
                emptied,
            });
        }

        out.push(next);
    }

    for failure in failures {
        let matched = match failure {
            CollaboratorFailure::Record { id, .. } => matched_records.contains(id),
            CollaboratorFailure::Group { name, .. } => matched_groups.contains(name.as_str()),
        };
        if matched {
            report.failures_applied += 1;
        } else {
            report.unmatched.push(failure.clone());
        }
    }

    info!(
        applied = report.failures_applied,
        affected = report.manifests.len(),
        unmatched = report.unmatched.len(),
        "reconciliation complete"
    );

    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestMember;
    use chrono::{TimeZone, Utc};
    use reelsmith_shared::CURRENT_SCHEMA_VERSION;

    fn member(id: &str, duration: u64) -> ManifestMember {
        ManifestMember {
            id: id.into(),
            title: id.into(),
            channel_title: "Channel".into(),
            url: format!("https://example.com/{id}"),
            duration_seconds: duration,
            published_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            attribution: format!("Source: Channel | Video ID: {id} | URL: https://example.com/{id}"),
        }
    }

    fn manifest(name: &str, members: Vec<ManifestMember>) -> CompilationManifest {
        let total = members.iter().map(|m| m.duration_seconds).sum();
        CompilationManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            name: name.into(),
            category: "a".into(),
            sequence_number: 1,
            members,
            total_duration_seconds: total,
            status: ManifestStatus::Ready,
            removed: Vec::new(),
        }
    }

    fn record_failure(id: &str) -> CollaboratorFailure {
        CollaboratorFailure::Record {
            id: id.into(),
            stage: CollaboratorStage::Fetch,
            reason: "HTTP 403".into(),
        }
    }

    #[test]
    fn failed_member_is_removed_and_duration_rederived() {
        let manifests = vec![
            manifest("a_compilation_001", vec![member("1", 300), member("2", 400), member("3", 200)]),
            manifest("a_compilation_002", vec![member("4", 500)]),
        ];
        let (out, report) = reconcile(&manifests, &[record_failure("2")]);

        let ids: Vec<&str> = out[0].member_ids().into_iter().map(RecordId::as_str).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(out[0].total_duration_seconds, 500);
        assert_eq!(out[0].removed[0].id.as_str(), "2");
        assert!(out[0].is_ready());
        assert_eq!(out[1], manifests[1], "sibling group untouched");

        assert_eq!(report.failures_applied, 1);
        assert_eq!(report.manifests.len(), 1);
        assert_eq!(report.manifests[0].removed_ids, vec![RecordId::from("2")]);
    }

    #[test]
    fn group_failure_keeps_members_and_siblings() {
        let manifests = vec![
            manifest("a_compilation_001", vec![member("1", 300)]),
            manifest("a_compilation_002", vec![member("2", 300)]),
        ];
        let failure = CollaboratorFailure::Group {
            name: "a_compilation_001".into(),
            stage: CollaboratorStage::Encode,
            reason: "encoder timeout".into(),
        };
        let (out, report) = reconcile(&manifests, &[failure]);

        assert!(!out[0].is_ready());
        assert_eq!(out[0].members.len(), 1);
        assert!(out[1].is_ready());
        assert!(report.manifests[0].failed);
        assert_eq!(out[0].sequence_number, 1);
    }

    #[test]
    fn removing_every_member_marks_manifest_failed() {
        let manifests = vec![manifest("a_compilation_001", vec![member("1", 300)])];
        let (out, report) = reconcile(&manifests, &[record_failure("1")]);
        assert!(out[0].members.is_empty());
        assert_eq!(out[0].total_duration_seconds, 0);
        assert!(!out[0].is_ready());
        assert!(report.manifests[0].emptied);
    }

    #[test]
    fn unknown_failures_are_reported_not_applied() {
        let manifests = vec![manifest("a_compilation_001", vec![member("1", 300)])];
        let (out, report) = reconcile(&manifests, &[record_failure("zzz")]);
        assert_eq!(out, manifests);
        assert_eq!(report.failures_applied, 0);
        assert_eq!(report.unmatched.len(), 1);
    }

    #[test]
    fn failures_decode_from_collaborator_json() {
        let json = r#"[
            {"scope": "record", "id": "abc", "stage": "fetch", "reason": "geo-blocked"},
            {"scope": "group", "name": "protest_compilation_002", "stage": "encode", "reason": "oom"}
        ]"#;
        let failures: Vec<CollaboratorFailure> = serde_json::from_str(json).expect("decode");
        assert_eq!(failures.len(), 2);
        assert!(matches!(&failures[1], CollaboratorFailure::Group { stage: CollaboratorStage::Encode, .. }));
    }
}
