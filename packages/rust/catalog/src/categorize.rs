//! First-match keyword categorization.
//!
//! Categories are scanned in priority order (lower value first). The first
//! category with at least one keyword in the searchable text wins, however
//! many keywords a later category would match.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use reelsmith_shared::{CandidateRecord, CategorizedRecord, CategoryDef, CategoryStats, UNCATEGORIZED};

/// One category, keywords case-folded and de-duplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub name: String,
    pub keywords: Vec<String>,
    pub priority: u32,
}

/// Categories held in scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySet {
    entries: Vec<CategoryEntry>,
}

impl CategorySet {
    /// Sort once by priority; equal priorities keep declaration order.
    pub fn from_defs(defs: &[CategoryDef]) -> Self {
        let mut entries: Vec<CategoryEntry> = defs
            .iter()
            .map(|def| {
                let mut keywords: Vec<String> = Vec::with_capacity(def.keywords.len());
                for kw in &def.keywords {
                    let folded = kw.trim().to_lowercase();
                    if !folded.is_empty() && !keywords.contains(&folded) {
                        keywords.push(folded);
                    }
                }
                CategoryEntry {
                    name: def.name.trim().to_string(),
                    keywords,
                    priority: def.priority,
                }
            })
            .collect();
        entries.sort_by_key(|e| e.priority);
        Self { entries }
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Category names in scan order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Pick the category for pre-folded searchable text.
    pub fn classify(&self, text: &str) -> (&str, usize) {
        for entry in &self.entries {
            let matches = entry.keywords.iter().filter(|k| text.contains(k.as_str())).count();
            if matches > 0 {
                return (&entry.name, matches);
            }
        }
        (UNCATEGORIZED, 0)
    }

    /// Wrap a record with its category. The searchable text is built once.
    pub fn categorize(&self, record: CandidateRecord) -> CategorizedRecord {
        let text = record.searchable_text();
        let (category, match_count) = self.classify(&text);
        let category = category.to_string();
        debug!(id = %record.id, %category, match_count, "record categorized");
        CategorizedRecord {
            record,
            category,
            match_count,
        }
    }

    #[instrument(skip_all, fields(records = records.len(), categories = self.entries.len()))]
    pub fn categorize_all(&self, records: Vec<CandidateRecord>) -> Vec<CategorizedRecord> {
        let categorized: Vec<CategorizedRecord> =
            records.into_iter().map(|r| self.categorize(r)).collect();

        for (category, stats) in distribution(&categorized) {
            info!(%category, count = stats.count, "category assigned");
        }

        categorized
    }
}

/// Count, share, and total minutes per category that received records.
pub fn distribution(records: &[CategorizedRecord]) -> BTreeMap<String, CategoryStats> {
    let mut counts: BTreeMap<String, (usize, u64)> = BTreeMap::new();
    for r in records {
        let entry = counts.entry(r.category.clone()).or_default();
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(r.record.duration_seconds);
    }

    let total = records.len();
    counts
        .into_iter()
        .map(|(category, (count, seconds))| {
            let percentage = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            (
                category,
                CategoryStats {
                    count,
                    percentage,
                    total_duration_minutes: seconds as f64 / 60.0,
                },
            )
        })
        .collect()
}
