//! Deduplication and categorization of admitted records.
//!
//! Deduplication runs first (exact ids, then fuzzy similarity); every
//! survivor is then assigned exactly one category by first-match keyword
//! priority.

pub mod categorize;
pub mod dedup;
pub mod similarity;

use tracing::instrument;

use reelsmith_shared::{CandidateRecord, CategorizedRecord, DedupReport};

pub use categorize::{CategoryEntry, CategorySet, distribution};
pub use dedup::{Deduplicator, exact_pass};
pub use similarity::{RecordScorer, TextSimilarity, TokenJaccard};

/// Output of [`dedupe_and_categorize`].
#[derive(Debug, Clone)]
pub struct CatalogOutput {
    /// Survivors in input order, each with its category.
    pub records: Vec<CategorizedRecord>,
    pub dedup: DedupReport,
}

/// Remove duplicates, then categorize what remains.
#[instrument(skip_all, fields(records = records.len()))]
pub fn dedupe_and_categorize(
    records: Vec<CandidateRecord>,
    categories: &CategorySet,
    deduplicator: &Deduplicator,
) -> CatalogOutput {
    let (survivors, dedup) = deduplicator.dedupe(records);
    CatalogOutput {
        records: categories.categorize_all(survivors),
        dedup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reelsmith_shared::{CategoryDef, DedupStrategy, UNCATEGORIZED};

    fn rec(id: &str, title: &str) -> CandidateRecord {
        CandidateRecord {
            id: id.into(),
            title: title.into(),
            channel_id: String::new(),
            channel_title: String::new(),
            published_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            duration_seconds: 60,
            view_count: 0,
            description: String::new(),
            tags: vec![],
            url: String::new(),
            resolution_height: None,
            file_size_bytes: None,
        }
    }

    #[test]
    fn duplicates_never_reach_categorization() {
        let categories = CategorySet::from_defs(&[CategoryDef {
            name: "protest".into(),
            keywords: vec!["protest".into()],
            priority: 1,
        }]);
        let dedup = Deduplicator::new(0.8, RecordScorer::new(DedupStrategy::Title));

        let out = dedupe_and_categorize(
            vec![
                rec("1", "Protest at city hall"),
                rec("1", "Protest at city hall"),
                rec("2", "protest at City Hall"),
                rec("3", "Quiet afternoon"),
            ],
            &categories,
            &dedup,
        );

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].category, "protest");
        assert_eq!(out.records[1].category, UNCATEGORIZED);
        assert_eq!(out.dedup.exact_duplicates, 1);
        assert_eq!(out.dedup.fuzzy_duplicates.len(), 1);
    }
}
