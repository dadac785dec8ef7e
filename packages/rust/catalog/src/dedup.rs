//! Two-pass, order-preserving deduplication. The first occurrence always wins.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use reelsmith_shared::{CandidateRecord, CategorizationConfig, DedupReport, FuzzyDuplicate};

use crate::similarity::RecordScorer;

/// Removes exact-id and near-duplicate records.
#[derive(Debug)]
pub struct Deduplicator {
    threshold: f64,
    scorer: RecordScorer,
}

impl Deduplicator {
    pub fn new(threshold: f64, scorer: RecordScorer) -> Self {
        Self { threshold, scorer }
    }

    pub fn from_config(config: &CategorizationConfig) -> Self {
        Self::new(
            config.similarity_threshold,
            RecordScorer::new(config.dedup_strategy),
        )
    }

    /// Run both passes and report what was dropped.
    #[instrument(skip_all, fields(records = records.len(), threshold = self.threshold))]
    pub fn dedupe(&self, records: Vec<CandidateRecord>) -> (Vec<CandidateRecord>, DedupReport) {
        let mut report = DedupReport {
            input: records.len(),
            ..DedupReport::default()
        };

        let unique = exact_pass(records);
        report.exact_duplicates = report.input - unique.len();

        let mut retained: Vec<CandidateRecord> = Vec::with_capacity(unique.len());
        for record in unique {
            match self.closest(&record, &retained) {
                Some((kept, score)) if score >= self.threshold => {
                    debug!(
                        dropped = %record.id,
                        kept = %kept.id,
                        score,
                        "near-duplicate dropped"
                    );
                    report.fuzzy_duplicates.push(FuzzyDuplicate {
                        dropped_id: record.id.clone(),
                        kept_id: kept.id.clone(),
                        score,
                    });
                }
                _ => retained.push(record),
            }
        }

        report.retained = retained.len();
        info!(
            input = report.input,
            exact = report.exact_duplicates,
            fuzzy = report.fuzzy_duplicates.len(),
            retained = report.retained,
            "deduplication complete"
        );

        (retained, report)
    }

    /// Highest-scoring retained record; the earliest wins ties.
    fn closest<'r>(
        &self,
        record: &CandidateRecord,
        retained: &'r [CandidateRecord],
    ) -> Option<(&'r CandidateRecord, f64)> {
        let mut best: Option<(&CandidateRecord, f64)> = None;
        for other in retained {
            let score = self.scorer.score(record, other);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((other, score));
            }
        }
        best
    }
}

/// Drop every record whose id has already been seen.
pub fn exact_pass(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let fresh = seen.insert(r.id.clone());
            if !fresh {
                debug!(id = %r.id, "duplicate id dropped");
            }
            fresh
        })
        .collect()
}
