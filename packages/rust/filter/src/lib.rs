//! Admission filter: decides which candidate records are eligible.
//!
//! Each rule is independently toggleable and evaluated in the fixed
//! [`RuleName::ALL`] order. Every enabled rule is evaluated for every record,
//! so a record failing several rules increments several counters but is
//! rejected once.

pub mod ingest;

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info, instrument};

use reelsmith_shared::{AdmissionResult, CandidateRecord, FilterConfig, FilterReport, RuleName};

pub use ingest::{RawRecord, load_records, normalize, parse_view_count};

/// Result of checking a single rule against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleCheck {
    Pass,
    Fail,
    /// Passed only because the metadata the rule inspects is absent.
    Unknown,
}

/// Precomputed, case-folded view of a [`FilterConfig`].
#[derive(Debug)]
pub struct AdmissionFilter<'a> {
    config: &'a FilterConfig,
    blocked_ids: HashSet<&'a str>,
    blocked_folded: HashSet<String>,
    required: Vec<String>,
    excluded: Vec<String>,
}

impl<'a> AdmissionFilter<'a> {
    pub fn new(config: &'a FilterConfig) -> Self {
        Self {
            config,
            blocked_ids: config.blocked_channels.iter().map(String::as_str).collect(),
            blocked_folded: config
                .blocked_channels
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            required: fold_keywords(&config.required_keywords),
            excluded: fold_keywords(&config.excluded_keywords),
        }
    }

    /// Check one rule, regardless of whether it is enabled.
    pub(crate) fn check(&self, rule: RuleName, record: &CandidateRecord, text: &str) -> RuleCheck {
        let passed = match rule {
            RuleName::Duration => {
                (self.config.min_duration_seconds..=self.config.max_duration_seconds)
                    .contains(&record.duration_seconds)
            }
            RuleName::Views => record.view_count >= self.config.min_views,
            RuleName::Channel => {
                !self.blocked_ids.contains(record.channel_id.as_str())
                    && !self
                        .blocked_folded
                        .contains(&record.channel_title.to_lowercase())
            }
            RuleName::Keywords => {
                let has_required =
                    self.required.is_empty() || self.required.iter().any(|k| text.contains(k));
                let has_excluded = self.excluded.iter().any(|k| text.contains(k));
                has_required && !has_excluded
            }
            RuleName::Resolution => match record.resolution_height {
                Some(height) => height >= self.config.min_resolution_height,
                None => return RuleCheck::Unknown,
            },
            RuleName::FileSize => match record.file_size_bytes {
                Some(size) => size <= self.config.max_file_size_bytes(),
                None => return RuleCheck::Unknown,
            },
        };

        if passed { RuleCheck::Pass } else { RuleCheck::Fail }
    }

    /// Evaluate every enabled rule; returns failed rules and unknown-metadata rules.
    pub fn evaluate(&self, record: &CandidateRecord) -> (BTreeSet<RuleName>, Vec<RuleName>) {
        let text = record.searchable_text();
        let mut failed = BTreeSet::new();
        let mut unknown = Vec::new();

        for rule in RuleName::ALL {
            if !self.config.is_enabled(rule) {
                continue;
            }
            match self.check(rule, record, &text) {
                RuleCheck::Pass => {}
                RuleCheck::Fail => {
                    failed.insert(rule);
                }
                RuleCheck::Unknown => unknown.push(rule),
            }
        }

        (failed, unknown)
    }
}

/// Lower-case keywords, dropping blanks (a blank keyword would match everything).
fn fold_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Evaluate every record and keep per-record verdicts.
#[instrument(skip_all, fields(records = records.len()))]
pub fn evaluate(
    records: Vec<CandidateRecord>,
    config: &FilterConfig,
) -> (Vec<AdmissionResult>, FilterReport) {
    let filter = AdmissionFilter::new(config);
    let mut report = FilterReport {
        total_processed: records.len(),
        ..FilterReport::default()
    };
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let (failed, unknown) = filter.evaluate(&record);

        for rule in &failed {
            *report.failed_by_rule.entry(*rule).or_insert(0) += 1;
        }
        for rule in unknown {
            *report.unknown_metadata.entry(rule).or_insert(0) += 1;
        }

        if failed.is_empty() {
            report.admitted += 1;
        } else {
            report.rejected += 1;
            debug!(
                id = %record.id,
                rules = ?failed,
                "record rejected"
            );
        }

        results.push(AdmissionResult::new(record, failed));
    }

    info!(
        processed = report.total_processed,
        admitted = report.admitted,
        rejected = report.rejected,
        "admission filter complete"
    );

    (results, report)
}

/// Partition records into the admitted sequence (input order kept) and a report.
pub fn filter(
    records: Vec<CandidateRecord>,
    config: &FilterConfig,
) -> (Vec<CandidateRecord>, FilterReport) {
    let (results, report) = evaluate(records, config);
    let admitted = results
        .into_iter()
        .filter(|r| r.admitted)
        .map(|r| r.record)
        .collect();
    (admitted, report)
}
