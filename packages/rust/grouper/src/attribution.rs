//! Source-citation text handed to the overlay renderer unmodified.

use reelsmith_shared::CandidateRecord;

/// `Source: {channel_title} | Video ID: {id} | URL: {url}`
pub fn attribution(record: &CandidateRecord) -> String {
    format!(
        "Source: {} | Video ID: {} | URL: {}",
        record.channel_title, record.id, record.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn attribution_format() {
        let record = CandidateRecord {
            id: "dQw4w9WgXcQ".into(),
            title: "Anything".into(),
            channel_id: "UC123".into(),
            channel_title: "City News".into(),
            published_at: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            duration_seconds: 212,
            view_count: 10,
            description: String::new(),
            tags: vec![],
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            resolution_height: None,
            file_size_bytes: None,
        };
        assert_eq!(
            attribution(&record),
            "Source: City News | Video ID: dQw4w9WgXcQ | URL: https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
