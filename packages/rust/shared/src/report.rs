//! Aggregate statistics derived read-only from each stage's output.
//! Every report is a write-once session artifact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CompilationGroup, MalformedRecord, RecordId, RuleName};

// ---------------------------------------------------------------------------
// FilterReport
// ---------------------------------------------------------------------------

/// Outcome counts of the admission stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    /// Well-formed records evaluated against the rules.
    pub total_processed: usize,
    pub admitted: usize,
    pub rejected: usize,
    /// Input elements excluded before filtering.
    pub malformed: usize,
    /// Records failing each rule; a record failing three rules counts three times.
    pub failed_by_rule: BTreeMap<RuleName, usize>,
    /// Records that passed a rule only because the metadata it checks was absent.
    pub unknown_metadata: BTreeMap<RuleName, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed_records: Vec<MalformedRecord>,
}

impl Default for FilterReport {
    fn default() -> Self {
        Self {
            total_processed: 0,
            admitted: 0,
            rejected: 0,
            malformed: 0,
            failed_by_rule: RuleName::ALL.into_iter().map(|r| (r, 0)).collect(),
            unknown_metadata: BTreeMap::new(),
            malformed_records: Vec::new(),
        }
    }
}

impl FilterReport {
    /// Failure count for a single rule.
    pub fn failures(&self, rule: RuleName) -> usize {
        self.failed_by_rule.get(&rule).copied().unwrap_or(0)
    }

    /// Attach malformed input elements found during ingestion.
    pub fn with_malformed(mut self, malformed: Vec<MalformedRecord>) -> Self {
        self.malformed = malformed.len();
        self.malformed_records = malformed;
        self
    }
}

// ---------------------------------------------------------------------------
// DedupReport
// ---------------------------------------------------------------------------

/// A record dropped by the fuzzy pass and the retained record it resembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyDuplicate {
    pub dropped_id: RecordId,
    pub kept_id: RecordId,
    pub score: f64,
}

/// Outcome counts of the deduplication passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    pub input: usize,
    pub exact_duplicates: usize,
    pub fuzzy_duplicates: Vec<FuzzyDuplicate>,
    pub retained: usize,
}

// ---------------------------------------------------------------------------
// CategoryReport
// ---------------------------------------------------------------------------

/// Distribution of one category across the categorized set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub percentage: f64,
    pub total_duration_minutes: f64,
}

// ---------------------------------------------------------------------------
// GroupingReport
// ---------------------------------------------------------------------------

/// Per-group line of the grouping report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub sequence_number: u32,
    pub name: String,
    pub member_count: usize,
    pub total_duration_seconds: u64,
    pub below_min: bool,
    pub overshoot: bool,
}

/// Per-category section of the grouping report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryGrouping {
    pub group_count: usize,
    pub record_count: usize,
    pub total_duration_seconds: u64,
    pub groups: Vec<GroupStats>,
}

/// Outcome of the grouping stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingReport {
    pub total_groups: usize,
    pub total_records: usize,
    pub total_duration_seconds: u64,
    pub categories: BTreeMap<String, CategoryGrouping>,
    /// Records left out by category configuration, per category.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub excluded: BTreeMap<String, usize>,
}

impl GroupingReport {
    /// Summarize a finished set of groups.
    pub fn from_groups(groups: &[CompilationGroup], excluded: BTreeMap<String, usize>) -> Self {
        let mut report = GroupingReport {
            excluded,
            ..GroupingReport::default()
        };

        for group in groups {
            let entry = report.categories.entry(group.category.clone()).or_default();
            entry.group_count += 1;
            entry.record_count += group.members.len();
            entry.total_duration_seconds = entry
                .total_duration_seconds
                .saturating_add(group.total_duration_seconds);
            entry.groups.push(GroupStats {
                sequence_number: group.sequence_number,
                name: group.name.clone(),
                member_count: group.members.len(),
                total_duration_seconds: group.total_duration_seconds,
                below_min: group.below_min,
                overshoot: group.overshoot,
            });

            report.total_groups += 1;
            report.total_records += group.members.len();
            report.total_duration_seconds = report
                .total_duration_seconds
                .saturating_add(group.total_duration_seconds);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_report_lists_every_rule() {
        let report = FilterReport::default();
        assert_eq!(report.failed_by_rule.len(), RuleName::ALL.len());
        assert_eq!(report.failures(RuleName::Keywords), 0);
    }

    #[test]
    fn filter_report_serializes_rule_keys_as_strings() {
        let mut report = FilterReport::default();
        report.failed_by_rule.insert(RuleName::FileSize, 3);
        report.unknown_metadata.insert(RuleName::Resolution, 2);

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"file_size\":3"));
        assert!(json.contains("\"resolution\":2"));

        let parsed: FilterReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.failures(RuleName::FileSize), 3);
    }

    #[test]
    fn malformed_records_are_counted() {
        let report = FilterReport::default().with_malformed(vec![MalformedRecord {
            index: 4,
            id: None,
            reason: "missing id".into(),
        }]);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.malformed_records[0].index, 4);
    }
}
