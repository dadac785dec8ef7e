//! Compilation manifests: the sole hand-off to the encoding collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reelsmith_shared::{CURRENT_SCHEMA_VERSION, CompilationGroup, RecordId};

use crate::attribution::attribution;
use crate::reconcile::CollaboratorStage;

/// One ordered member of a compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMember {
    pub id: RecordId,
    pub title: String,
    pub channel_title: String,
    pub url: String,
    pub duration_seconds: u64,
    pub published_at: DateTime<Utc>,
    pub attribution: String,
}

/// A member taken out of the manifest after a collaborator failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedMember {
    pub id: RecordId,
    pub stage: CollaboratorStage,
    pub reason: String,
}

/// Whether the encoder should still produce this compilation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ManifestStatus {
    #[default]
    Ready,
    Failed {
        stage: CollaboratorStage,
        reason: String,
    },
}

/// `manifests/<name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationManifest {
    pub schema_version: u32,
    pub name: String,
    pub category: String,
    pub sequence_number: u32,
    /// Final order inside the compilation, fixed before dispatch.
    pub members: Vec<ManifestMember>,
    pub total_duration_seconds: u64,
    #[serde(default)]
    pub status: ManifestStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<RemovedMember>,
}

impl CompilationManifest {
    pub fn from_group(group: &CompilationGroup) -> Self {
        let members = group
            .members
            .iter()
            .map(|m| ManifestMember {
                id: m.record.id.clone(),
                title: m.record.title.clone(),
                channel_title: m.record.channel_title.clone(),
                url: m.record.url.clone(),
                duration_seconds: m.record.duration_seconds,
                published_at: m.record.published_at,
                attribution: attribution(&m.record),
            })
            .collect();

        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            name: group.name.clone(),
            category: group.category.clone(),
            sequence_number: group.sequence_number,
            members,
            total_duration_seconds: group.total_duration_seconds,
            status: ManifestStatus::Ready,
            removed: Vec::new(),
        }
    }

    pub fn member_ids(&self) -> Vec<&RecordId> {
        self.members.iter().map(|m| &m.id).collect()
    }

    pub fn attributions(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.attribution.as_str()).collect()
    }

    /// Sum of the remaining members' durations.
    pub fn derived_duration(&self) -> u64 {
        self.members
            .iter()
            .fold(0, |total, m| total.saturating_add(m.duration_seconds))
    }

    pub fn is_ready(&self) -> bool {
        self.status == ManifestStatus::Ready
    }

    /// `<name>.json`.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reelsmith_shared::{CandidateRecord, CategorizedRecord};

    fn member(id: &str, duration: u64) -> CategorizedRecord {
        CategorizedRecord {
            record: CandidateRecord {
                id: id.into(),
                title: format!("title {id}"),
                channel_id: "c".into(),
                channel_title: "Channel".into(),
                published_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
                duration_seconds: duration,
                view_count: 0,
                description: String::new(),
                tags: vec![],
                url: format!("https://example.com/{id}"),
                resolution_height: None,
                file_size_bytes: None,
            },
            category: "protest".into(),
            match_count: 1,
        }
    }

    #[test]
    fn manifest_mirrors_group_order() {
        let group = CompilationGroup {
            category: "protest".into(),
            sequence_number: 3,
            name: "protest_compilation_003".into(),
            members: vec![member("b", 100), member("a", 200)],
            total_duration_seconds: 300,
            below_min: true,
            overshoot: false,
        };
        let manifest = CompilationManifest::from_group(&group);

        let ids: Vec<&str> = manifest.member_ids().into_iter().map(RecordId::as_str).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(manifest.derived_duration(), 300);
        assert_eq!(manifest.file_name(), "protest_compilation_003.json");
        assert!(manifest.attributions()[0].starts_with("Source: Channel | Video ID: b"));
        assert!(manifest.is_ready());
    }

    #[test]
    fn derived_duration_saturates() {
        let group = CompilationGroup {
            category: "protest".into(),
            sequence_number: 1,
            name: "protest_compilation_001".into(),
            members: vec![member("a", u64::MAX), member("b", 5)],
            total_duration_seconds: u64::MAX,
            below_min: false,
            overshoot: true,
        };
        let manifest = CompilationManifest::from_group(&group);
        assert_eq!(manifest.derived_duration(), u64::MAX);
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let failed = ManifestStatus::Failed {
            stage: CollaboratorStage::Encode,
            reason: "ffmpeg exited 1".into(),
        };
        let json = serde_json::to_string(&failed).expect("serialize");
        assert_eq!(json, r#"{"state":"failed","stage":"encode","reason":"ffmpeg exited 1"}"#);

        let ready = serde_json::to_string(&ManifestStatus::Ready).expect("serialize");
        assert_eq!(ready, r#"{"state":"ready"}"#);
    }
}
