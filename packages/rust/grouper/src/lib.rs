//! Compilation grouper: packs each category's records, in publish order,
//! into duration-bounded groups.
//!
//! The packing is a greedy chronological bin-fill, not an optimal packing.
//! With the default [`OverflowPolicy::MinFirst`]:
//! - append while `total + next <= max`;
//! - otherwise append anyway while `total < min` (the minimum wins);
//! - otherwise close the group and open a new one with `next`.
//!
//! The final group of a category is kept even below the minimum.

pub mod attribution;
pub mod manifest;
pub mod reconcile;

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use reelsmith_shared::{
    CategorizedRecord, CompilationConfig, CompilationGroup, DurationBounds, GroupingReport,
    OverflowPolicy,
};

pub use attribution::attribution;
pub use manifest::{CompilationManifest, ManifestMember, ManifestStatus};
pub use reconcile::{CollaboratorFailure, CollaboratorStage, ReconcileEntry, ReconcileReport, reconcile};

/// Grouping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingOptions {
    pub bounds: DurationBounds,
    pub policy: OverflowPolicy,
    pub include_uncategorized: bool,
}

impl From<&CompilationConfig> for GroupingOptions {
    fn from(config: &CompilationConfig) -> Self {
        Self {
            bounds: config.bounds(),
            policy: config.overflow_policy,
            include_uncategorized: config.include_uncategorized,
        }
    }
}

/// Output of [`group`].
#[derive(Debug, Clone)]
pub struct GroupingOutput {
    /// Ordered by category name, then sequence number.
    pub groups: Vec<CompilationGroup>,
    pub report: GroupingReport,
}

/// Group every category independently.
#[instrument(skip_all, fields(records = categorized.len(), min = options.bounds.min, max = options.bounds.max))]
pub fn group(categorized: Vec<CategorizedRecord>, options: &GroupingOptions) -> GroupingOutput {
    let mut by_category: BTreeMap<String, Vec<CategorizedRecord>> = BTreeMap::new();
    let mut excluded: BTreeMap<String, usize> = BTreeMap::new();

    for record in categorized {
        if record.is_uncategorized() && !options.include_uncategorized {
            *excluded.entry(record.category.clone()).or_insert(0) += 1;
            continue;
        }
        by_category.entry(record.category.clone()).or_default().push(record);
    }

    let mut groups = Vec::new();
    for (category, records) in by_category {
        let packed = pack_category(&category, records, options);
        debug!(%category, groups = packed.len(), "category packed");
        groups.extend(packed);
    }

    let report = GroupingReport::from_groups(&groups, excluded);
    info!(
        groups = report.total_groups,
        records = report.total_records,
        excluded = report.excluded.values().sum::<usize>(),
        "grouping complete"
    );

    GroupingOutput { groups, report }
}

/// Sort one category chronologically (`id` breaks ties) and bin-fill it.
pub fn pack_category(
    category: &str,
    mut records: Vec<CategorizedRecord>,
    options: &GroupingOptions,
) -> Vec<CompilationGroup> {
    records.sort_by(|a, b| {
        a.record
            .published_at
            .cmp(&b.record.published_at)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    let DurationBounds { target, min, max } = options.bounds;
    let mut packer = Packer::new(category, options.bounds);

    for record in records {
        let next = record.record.duration_seconds;
        let total = packer.total;

        if !packer.members.is_empty() && total.saturating_add(next) > max && total >= min {
            packer.close();
        }
        packer.push(record);

        if options.policy == OverflowPolicy::TargetSplit && packer.total >= target && packer.total >= min {
            packer.close();
        }
    }

    packer.finish()
}

/// Open-group state for one category.
struct Packer<'a> {
    category: &'a str,
    bounds: DurationBounds,
    members: Vec<CategorizedRecord>,
    total: u64,
    closed: Vec<CompilationGroup>,
}

impl<'a> Packer<'a> {
    fn new(category: &'a str, bounds: DurationBounds) -> Self {
        Self {
            category,
            bounds,
            members: Vec::new(),
            total: 0,
            closed: Vec::new(),
        }
    }

    fn push(&mut self, record: CategorizedRecord) {
        self.total = self.total.saturating_add(record.record.duration_seconds);
        self.members.push(record);
    }

    fn close(&mut self) {
        if self.members.is_empty() {
            return;
        }
        let sequence_number = self.closed.len() as u32 + 1;
        let total = std::mem::take(&mut self.total);
        self.closed.push(CompilationGroup {
            category: self.category.to_string(),
            sequence_number,
            name: CompilationGroup::group_name(self.category, sequence_number),
            members: std::mem::take(&mut self.members),
            total_duration_seconds: total,
            below_min: total < self.bounds.min,
            overshoot: total > self.bounds.max,
        });
    }

    fn finish(mut self) -> Vec<CompilationGroup> {
        self.close();
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use reelsmith_shared::{CandidateRecord, RecordId, UNCATEGORIZED};
    use std::collections::BTreeSet;

    fn rec(id: &str, category: &str, duration: u64, day: i64) -> CategorizedRecord {
        CategorizedRecord {
            record: CandidateRecord {
                id: id.into(),
                title: format!("video {id}"),
                channel_id: "c".into(),
                channel_title: "Channel".into(),
                published_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
                    + Duration::days(day),
                duration_seconds: duration,
                view_count: 0,
                description: String::new(),
                tags: vec![],
                url: format!("https://example.com/{id}"),
                resolution_height: None,
                file_size_bytes: None,
            },
            category: category.into(),
            match_count: 1,
        }
    }

    fn options(target: u64, min: u64, max: u64) -> GroupingOptions {
        GroupingOptions {
            bounds: DurationBounds { target, min, max },
            policy: OverflowPolicy::MinFirst,
            include_uncategorized: true,
        }
    }

    fn ids(group: &CompilationGroup) -> Vec<&str> {
        group.members.iter().map(|m| m.record.id.as_str()).collect()
    }

    #[test]
    fn three_four_hundred_second_records() {
        let records = vec![rec("1", "a", 400, 0), rec("2", "a", 400, 1), rec("3", "a", 400, 2)];
        let out = group(records, &options(750, 600, 900));

        assert_eq!(out.groups.len(), 2);
        assert_eq!(ids(&out.groups[0]), vec!["1", "2"]);
        assert_eq!(out.groups[0].total_duration_seconds, 800);
        assert_eq!(out.groups[0].sequence_number, 1);
        assert!(!out.groups[0].below_min);

        assert_eq!(ids(&out.groups[1]), vec!["3"]);
        assert_eq!(out.groups[1].total_duration_seconds, 400);
        assert_eq!(out.groups[1].sequence_number, 2);
        assert!(out.groups[1].below_min);
        assert_eq!(out.groups[1].name, "a_compilation_002");
    }

    #[test]
    fn minimum_takes_precedence_over_maximum() {
        let records = vec![rec("1", "a", 500, 0), rec("2", "a", 500, 1), rec("3", "a", 100, 2)];
        let out = group(records, &options(750, 600, 900));

        assert_eq!(ids(&out.groups[0]), vec!["1", "2"]);
        assert_eq!(out.groups[0].total_duration_seconds, 1000);
        assert!(out.groups[0].overshoot);
        assert_eq!(ids(&out.groups[1]), vec!["3"]);
    }

    #[test]
    fn durations_near_u64_max_saturate_instead_of_wrapping() {
        let records = vec![rec("1", "a", 100, 0), rec("2", "a", u64::MAX - 10, 1), rec("3", "a", 300, 2)];
        let out = group(records, &options(750, 600, 900));

        assert_eq!(out.groups.len(), 2);
        assert_eq!(ids(&out.groups[0]), vec!["1", "2"]);
        assert_eq!(out.groups[0].total_duration_seconds, u64::MAX);
        assert!(out.groups[0].overshoot);
        assert_eq!(ids(&out.groups[1]), vec!["3"]);
        assert_eq!(out.report.total_duration_seconds, u64::MAX);
    }

    #[test]
    fn record_longer_than_max_opens_its_own_group() {
        let records = vec![rec("1", "a", 2000, 0), rec("2", "a", 300, 1)];
        let out = group(records, &options(0, 0, 900));
        assert_eq!(out.groups.len(), 2);
        assert!(out.groups[0].overshoot);
        assert_eq!(ids(&out.groups[1]), vec!["2"]);
    }

    #[test]
    fn chronological_order_with_id_tiebreak() {
        let records = vec![
            rec("c", "a", 60, 1),
            rec("b", "a", 60, 0),
            rec("a", "a", 60, 1),
        ];
        let out = group(records, &options(750, 600, 900));
        assert_eq!(ids(&out.groups[0]), vec!["b", "a", "c"]);
    }

    #[test]
    fn categories_grouped_independently() {
        let records = vec![
            rec("1", "a", 400, 0),
            rec("2", "b", 400, 1),
            rec("3", "a", 400, 2),
            rec("4", "b", 400, 3),
        ];
        let out = group(records, &options(750, 600, 900));
        assert_eq!(out.groups.len(), 2);
        assert_eq!(out.groups[0].category, "a");
        assert_eq!(out.groups[0].sequence_number, 1);
        assert_eq!(out.groups[1].category, "b");
        assert_eq!(out.groups[1].sequence_number, 1);
        assert_eq!(out.report.categories["a"].group_count, 1);
    }

    #[test]
    fn target_split_prefers_shorter_groups() {
        let records = vec![
            rec("1", "a", 400, 0),
            rec("2", "a", 400, 1),
            rec("3", "a", 50, 2),
            rec("4", "a", 400, 3),
        ];
        let mut opts = options(750, 600, 900);

        let min_first = group(records.clone(), &opts);
        assert_eq!(ids(&min_first.groups[0]), vec!["1", "2", "3"]);

        opts.policy = OverflowPolicy::TargetSplit;
        let split = group(records, &opts);
        assert_eq!(ids(&split.groups[0]), vec!["1", "2"]);
        assert_eq!(ids(&split.groups[1]), vec!["3", "4"]);
    }

    #[test]
    fn uncategorized_can_be_suppressed() {
        let records = vec![rec("1", "a", 400, 0), rec("2", UNCATEGORIZED, 400, 1)];
        let mut opts = options(750, 600, 900);

        let out = group(records.clone(), &opts);
        assert_eq!(out.groups.len(), 2);

        opts.include_uncategorized = false;
        let out = group(records, &opts);
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.report.excluded.get(UNCATEGORIZED), Some(&1));
    }

    #[test]
    fn closed_groups_respect_bounds_and_cover_every_record() {
        let durations = [120, 340, 75, 610, 90, 300, 45, 480, 200, 260, 30, 700, 150];
        let records: Vec<CategorizedRecord> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| rec(&format!("r{i:02}"), "a", *d, i as i64))
            .collect();
        let input: BTreeSet<RecordId> = records.iter().map(|r| r.record.id.clone()).collect();

        let opts = options(750, 600, 900);
        let out = group(records, &opts);

        let (last, closed) = out.groups.split_last().expect("at least one group");
        for g in closed {
            assert!(g.total_duration_seconds >= opts.bounds.min, "{}", g.name);
            if !g.overshoot {
                assert!(g.total_duration_seconds <= opts.bounds.max, "{}", g.name);
            }
        }
        assert_eq!(
            last.below_min,
            last.total_duration_seconds < opts.bounds.min
        );

        let mut seen: Vec<RecordId> = out.groups.iter().flat_map(|g| g.member_ids()).collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total, "no record in two groups");
        assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), input);
    }
}
