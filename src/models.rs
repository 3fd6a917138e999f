//! Core data types shared by the store, export, stats, and both front ends.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Display format for timestamps in listings and exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One saved extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: i64,
    pub filename: String,
    pub extracted_text: String,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn created_at_display(&self) -> String {
        self.created_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Search filters. Every supplied field must match; `None` fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RecordFilter {
    /// The keyword to match, with an empty string treated as absent.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().filter(|k| !k.is_empty())
    }

    /// Inclusive lower bound: `start_date 00:00:00.000000`.
    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
    }

    /// Inclusive upper bound: `end_date 23:59:59.999999`.
    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.end_date.and_then(|d| {
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
                .map(|t| Utc.from_utc_datetime(&d.and_time(t)))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keyword().is_none() && self.start_date.is_none() && self.end_date.is_none()
    }
}

/// Storage representation of a timestamp: microseconds since the Unix epoch.
pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub fn from_micros(us: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn bounds_cover_whole_days() {
        let filter = RecordFilter {
            keyword: None,
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-01-02")),
        };
        assert_eq!(
            filter.lower_bound().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
        let upper = filter.upper_bound().unwrap();
        assert_eq!(
            upper.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            "2024-01-02 23:59:59.999999"
        );
    }

    #[test]
    fn empty_keyword_is_absent() {
        let filter = RecordFilter {
            keyword: Some(String::new()),
            ..Default::default()
        };
        assert!(filter.keyword().is_none());
        assert!(filter.is_empty());
    }

    #[test]
    fn micros_keep_sub_second_precision() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(from_micros(to_micros(ts)), Some(ts));
    }
}
