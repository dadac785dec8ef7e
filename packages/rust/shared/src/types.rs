//! Core domain types for reelsmith: candidate records and what each stage
//! derives from them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for session artifacts.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Category assigned to records that match no configured category.
pub const UNCATEGORIZED: &str = "uncategorized";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a candidate record (the source's video id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A UUID v7 wrapper for session identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord
// ---------------------------------------------------------------------------

/// A search result before any admission decision. Never mutated; later
/// stages wrap it rather than edit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: RecordId,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub description: String,
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
}

impl CandidateRecord {
    /// Title, description, and tags joined by spaces and case-folded.
    /// Both keyword admission and categorization match against this.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len() + self.description.len() + self.tags.len() * 8 + 2,
        );
        text.push_str(&self.title);
        text.push(' ');
        text.push_str(&self.description);
        text.push(' ');
        text.push_str(&self.tags.join(" "));
        text.to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Admission predicates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    Duration,
    Views,
    Channel,
    Keywords,
    Resolution,
    FileSize,
}

impl RuleName {
    /// All rules in the fixed evaluation order.
    pub const ALL: [RuleName; 6] = [
        RuleName::Duration,
        RuleName::Views,
        RuleName::Channel,
        RuleName::Keywords,
        RuleName::Resolution,
        RuleName::FileSize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleName::Duration => "duration",
            RuleName::Views => "views",
            RuleName::Channel => "channel",
            RuleName::Keywords => "keywords",
            RuleName::Resolution => "resolution",
            RuleName::FileSize => "file_size",
        }
    }
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RuleName::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown rule '{s}'"))
    }
}

/// Per-record admission verdict. `admitted` is true iff `failed_rules` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionResult {
    pub record: CandidateRecord,
    pub admitted: bool,
    pub failed_rules: BTreeSet<RuleName>,
}

impl AdmissionResult {
    pub fn new(record: CandidateRecord, failed_rules: BTreeSet<RuleName>) -> Self {
        Self {
            admitted: failed_rules.is_empty(),
            record,
            failed_rules,
        }
    }
}

/// An input element that could not become a [`CandidateRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedRecord {
    /// Position in the input array.
    pub index: usize,
    /// The id, when one was present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Categorization
// ---------------------------------------------------------------------------

/// A surviving record with its (stable) category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedRecord {
    pub record: CandidateRecord,
    /// A configured category name or [`UNCATEGORIZED`].
    pub category: String,
    /// Distinct keywords of `category` found in the searchable text.
    pub match_count: usize,
}

impl CategorizedRecord {
    pub fn is_uncategorized(&self) -> bool {
        self.category == UNCATEGORIZED
    }
}

// ---------------------------------------------------------------------------
// CompilationGroup
// ---------------------------------------------------------------------------

/// An ordered, duration-bounded set of records destined for one output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationGroup {
    pub category: String,
    /// 1-based, per category, in closing order.
    pub sequence_number: u32,
    /// `{category}_compilation_{nnn}`.
    pub name: String,
    /// Chronological by `published_at`, then `id`.
    pub members: Vec<CategorizedRecord>,
    pub total_duration_seconds: u64,
    /// Final group of its category that never reached the minimum.
    pub below_min: bool,
    /// Total exceeds the maximum because the minimum took precedence.
    pub overshoot: bool,
}

impl CompilationGroup {
    /// Display name for a group.
    pub fn group_name(category: &str, sequence_number: u32) -> String {
        format!("{category}_compilation_{sequence_number:03}")
    }

    pub fn member_ids(&self) -> Vec<RecordId> {
        self.members.iter().map(|m| m.record.id.clone()).collect()
    }
}
