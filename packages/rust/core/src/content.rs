//! Content analysis report over the final categorized set.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use reelsmith_catalog::distribution;
use reelsmith_shared::{CategorizedRecord, CategoryStats};

/// How many channels the channel analysis keeps.
const TOP_CHANNELS: usize = 20;

/// `content_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentReport {
    pub summary: ContentSummary,
    pub categories: BTreeMap<String, CategoryStats>,
    pub quality: QualityMetrics,
    /// Records per publish year.
    pub temporal_distribution: BTreeMap<String, usize>,
    pub channels: Vec<ChannelStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub total_records: usize,
    pub total_duration_hours: f64,
    pub total_views: u64,
    pub unique_channels: usize,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: String,
    pub latest: String,
}

/// Min/max/avg over strictly positive values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub duration_seconds: Spread,
    pub views: Spread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel_title: String,
    pub record_count: usize,
    pub total_views: u64,
    pub total_duration_seconds: u64,
}

/// Build the report. Pure; does no I/O.
pub fn content_report(records: &[CategorizedRecord]) -> ContentReport {
    let total_seconds = saturating_sum(records.iter().map(|r| r.record.duration_seconds));
    let total_views = saturating_sum(records.iter().map(|r| r.record.view_count));
    let unique_channels = records
        .iter()
        .map(|r| r.record.channel_title.as_str())
        .collect::<HashSet<_>>()
        .len();

    let date_range = match (
        records.iter().map(|r| r.record.published_at).min(),
        records.iter().map(|r| r.record.published_at).max(),
    ) {
        (Some(earliest), Some(latest)) => Some(DateRange {
            earliest: earliest.format("%Y-%m-%d").to_string(),
            latest: latest.format("%Y-%m-%d").to_string(),
        }),
        _ => None,
    };

    let mut temporal_distribution = BTreeMap::new();
    for r in records {
        *temporal_distribution
            .entry(r.record.published_at.year().to_string())
            .or_insert(0) += 1;
    }

    ContentReport {
        summary: ContentSummary {
            total_records: records.len(),
            total_duration_hours: total_seconds as f64 / 3600.0,
            total_views,
            unique_channels,
            date_range,
        },
        categories: distribution(records),
        quality: QualityMetrics {
            duration_seconds: spread(records.iter().map(|r| r.record.duration_seconds)),
            views: spread(records.iter().map(|r| r.record.view_count)),
        },
        temporal_distribution,
        channels: top_channels(records),
    }
}

fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

fn spread(values: impl Iterator<Item = u64>) -> Spread {
    let positive: Vec<u64> = values.filter(|v| *v > 0).collect();
    if positive.is_empty() {
        return Spread::default();
    }
    Spread {
        min: positive.iter().copied().min().unwrap_or(0),
        max: positive.iter().copied().max().unwrap_or(0),
        avg: positive.iter().map(|v| *v as f64).sum::<f64>() / positive.len() as f64,
    }
}

/// Channels by record count (descending), title ascending on ties.
fn top_channels(records: &[CategorizedRecord]) -> Vec<ChannelStats> {
    let mut by_channel: HashMap<&str, ChannelStats> = HashMap::new();
    for r in records {
        let entry = by_channel
            .entry(r.record.channel_title.as_str())
            .or_insert_with(|| ChannelStats {
                channel_title: r.record.channel_title.clone(),
                record_count: 0,
                total_views: 0,
                total_duration_seconds: 0,
            });
        entry.record_count += 1;
        entry.total_views = entry.total_views.saturating_add(r.record.view_count);
        entry.total_duration_seconds = entry
            .total_duration_seconds
            .saturating_add(r.record.duration_seconds);
    }

    let mut channels: Vec<ChannelStats> = by_channel.into_values().collect();
    channels.sort_by(|a, b| {
        b.record_count
            .cmp(&a.record_count)
            .then_with(|| a.channel_title.cmp(&b.channel_title))
    });
    channels.truncate(TOP_CHANNELS);
    channels
}
