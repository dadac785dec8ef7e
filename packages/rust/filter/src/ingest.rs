//! Decoding of the search collaborator's records file into [`CandidateRecord`]s.
//!
//! Decoding is lenient per element: one bad element becomes a
//! [`MalformedRecord`] and never aborts the rest of the file.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use reelsmith_shared::{CandidateRecord, MalformedRecord, RecordId, ReelsmithError, Result};

/// One element of the records file, before validation.
///
/// Field aliases accept the search collaborator's native key names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "video_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default, alias = "published_time", alias = "upload_date")]
    pub published_at: Option<Value>,
    #[serde(default)]
    pub duration_seconds: Option<Value>,
    #[serde(default)]
    pub view_count: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "height")]
    pub resolution_height: Option<Value>,
    #[serde(default, alias = "filesize")]
    pub file_size_bytes: Option<Value>,
}

impl RawRecord {
    /// Validate required fields and produce an immutable record.
    pub fn into_candidate(self) -> std::result::Result<CandidateRecord, String> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "missing id".to_string())?
            .to_string();

        let duration_seconds = match &self.duration_seconds {
            None | Some(Value::Null) => return Err("missing duration_seconds".into()),
            Some(v) => parse_duration(v)?,
        };

        let published_at = match &self.published_at {
            None | Some(Value::Null) => return Err("missing published_at".into()),
            Some(v) => parse_timestamp(v)?,
        };

        let view_count = match &self.view_count {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(v), _, _) => v,
                (None, Some(_), _) => return Err("negative view_count".into()),
                (None, None, Some(f)) if f < 0.0 => return Err("negative view_count".into()),
                (None, None, Some(f)) => f as u64,
                _ => 0,
            },
            Some(Value::String(s)) => parse_view_count(s),
            Some(other) => return Err(format!("view_count has unsupported type: {other}")),
        };

        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));

        Ok(CandidateRecord {
            id: RecordId(id),
            title: self.title.unwrap_or_default(),
            channel_id: self.channel_id.unwrap_or_default(),
            channel_title: self.channel_title.unwrap_or_default(),
            published_at,
            duration_seconds,
            view_count,
            description: self.description.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            url,
            resolution_height: self
                .resolution_height
                .as_ref()
                .and_then(positive_u64)
                .and_then(|h| u32::try_from(h).ok()),
            file_size_bytes: self.file_size_bytes.as_ref().and_then(positive_u64),
        })
    }
}

/// Split decoded JSON elements into well-formed records and malformed ones.
#[instrument(skip_all, fields(elements = elements.len()))]
pub fn normalize(elements: Vec<Value>) -> (Vec<CandidateRecord>, Vec<MalformedRecord>) {
    let mut records = Vec::with_capacity(elements.len());
    let mut malformed = Vec::new();

    for (index, element) in elements.into_iter().enumerate() {
        let id_hint = element
            .get("id")
            .or_else(|| element.get("video_id"))
            .and_then(Value::as_str)
            .map(String::from);

        let outcome = serde_json::from_value::<RawRecord>(element)
            .map_err(|e| format!("undecodable record: {e}"))
            .and_then(RawRecord::into_candidate);

        match outcome {
            Ok(record) => records.push(record),
            Err(reason) => {
                warn!(index, id = id_hint.as_deref().unwrap_or(""), %reason, "malformed record excluded");
                malformed.push(MalformedRecord {
                    index,
                    id: id_hint.filter(|s| !s.trim().is_empty()),
                    reason,
                });
            }
        }
    }

    info!(
        records = records.len(),
        malformed = malformed.len(),
        "records normalized"
    );

    (records, malformed)
}

/// Read a records file (a JSON array) from disk and normalize it.
pub fn load_records(path: &Path) -> Result<(Vec<CandidateRecord>, Vec<MalformedRecord>)> {
    let content = std::fs::read_to_string(path).map_err(|e| ReelsmithError::io(path, e))?;
    let elements: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
        ReelsmithError::parse(format!(
            "{} is not a JSON array of records: {e}",
            path.display()
        ))
    })?;
    Ok(normalize(elements))
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

/// Parse a view count that may be a display string (`"1.2M views"`, `"500K"`,
/// `"12,345"`). Unparseable input counts as zero views.
pub fn parse_view_count(raw: &str) -> u64 {
    let cleaned = raw
        .to_lowercase()
        .replace("views", "")
        .replace("view", "")
        .replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0;
    }

    let multiplier = match cleaned.chars().last() {
        Some('k') => 1_000.0,
        Some('m') => 1_000_000.0,
        Some('b') => 1_000_000_000.0,
        _ => return cleaned.parse::<u64>().unwrap_or(0),
    };

    let number = &cleaned[..cleaned.len() - 1];
    match number.trim().parse::<f64>() {
        Ok(n) if n >= 0.0 => (n * multiplier) as u64,
        _ => 0,
    }
}

fn parse_duration(value: &Value) -> std::result::Result<u64, String> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(v)
            } else if n.as_i64().is_some() {
                Err("negative duration_seconds".into())
            } else {
                let f = n.as_f64().unwrap_or(-1.0);
                if f < 0.0 {
                    Err("negative duration_seconds".into())
                } else if f.fract() != 0.0 {
                    Err(format!("duration_seconds is not an integer: {f}"))
                } else {
                    Ok(f as u64)
                }
            }
        }
        Value::String(s) => parse_duration_str(s),
        other => Err(format!("duration_seconds has unsupported type: {other}")),
    }
}

/// Accepts plain seconds (`"253"`) or clock notation (`"4:13"`, `"1:02:03"`).
fn parse_duration_str(raw: &str) -> std::result::Result<u64, String> {
    static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})$").expect("valid regex")
    });

    let s = raw.trim();
    if s.starts_with('-') {
        return Err("negative duration_seconds".into());
    }
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    let unparseable = || format!("unparseable duration_seconds '{raw}'");
    let caps = CLOCK_RE.captures(s).ok_or_else(unparseable)?;
    let part = |i: usize| match caps.get(i) {
        None => Ok(0),
        Some(m) => m.as_str().parse::<u64>().map_err(|_| unparseable()),
    };
    let (hours, minutes, seconds) = (part(1)?, part(2)?, part(3)?);
    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .ok_or_else(unparseable)
}

/// Accepts RFC 3339, `YYYY-MM-DD`, `YYYYMMDD`, or unix seconds.
fn parse_timestamp(value: &Value) -> std::result::Result<DateTime<Utc>, String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d", "%Y%m%d"] {
                if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                    if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                        return Ok(Utc.from_utc_datetime(&dt));
                    }
                }
            }
            Err(format!("unparseable published_at '{s}'"))
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| format!("published_at out of range: {n}")),
        other => Err(format!("published_at has unsupported type: {other}")),
    }
}

/// Zero and unparseable values mean "unknown".
fn positive_u64(value: &Value) -> Option<u64> {
    let v = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f > 0.0)
                .map(|f| f.round() as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (v > 0).then_some(v)
}
