//! Upstream source contract.
//!
//! A source yields at most one partial record per (security, date). How it
//! talks to its feed (HTTP, retries, rate limits) is its own business; the
//! pipeline only sees records or their absence.

use chrono::{Datelike, NaiveDate, Weekday};
use daybook_core::{PartialRecord, SourceKind};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

/// Failure reported by a source.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure (connection, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Feed payload could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Data(#[from] daybook_core::Error),
}

/// A per-feed fetcher.
pub trait Source: Sync {
    /// Dataset this source provides.
    fn kind(&self) -> SourceKind;

    /// Fetch the record for one security and date, if the feed has one.
    fn fetch(&self, security_id: &str, date: NaiveDate) -> Result<Option<PartialRecord>, FetchError>;

    /// Fetch every available record in `[start, end]`.
    ///
    /// The default walks the calendar one day at a time (weekdays only for
    /// per-trading-day feeds). A failing date is logged and skipped.
    fn fetch_range(
        &self,
        security_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PartialRecord>, FetchError> {
        Ok(walk_days(self, security_id, start, end))
    }
}

/// Fetch day by day over `[start, end]`, logging and skipping failed dates.
pub fn walk_days<S: Source + ?Sized>(
    source: &S,
    security_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PartialRecord> {
    let kind = source.kind();
    let mut records = Vec::new();
    for date in calendar_days(start, end, kind.is_per_trading_day()) {
        match source.fetch(security_id, date) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => {
                warn!(source = %kind, security_id, %date, %err, "fetch failed");
            }
        }
    }
    records
}

/// Days in `[start, end]`, optionally skipping Saturdays and Sundays.
pub fn calendar_days(
    start: NaiveDate,
    end: NaiveDate,
    weekdays_only: bool,
) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |d| *d <= end)
        .filter(move |d| !weekdays_only || !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

/// In-memory source backed by a fixed set of partial records.
#[derive(Debug, Clone)]
pub struct MemorySource {
    kind: SourceKind,
    records: Vec<PartialRecord>,
    failing: HashSet<NaiveDate>,
}

impl MemorySource {
    /// Create an empty source of the given kind.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            failing: HashSet::new(),
        }
    }

    /// Add a record.
    pub fn with_record(mut self, record: PartialRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Add several records.
    pub fn with_records(mut self, records: impl IntoIterator<Item = PartialRecord>) -> Self {
        self.records.extend(records);
        self
    }

    /// Make fetches for `date` fail with a network error.
    pub fn failing_on(mut self, date: NaiveDate) -> Self {
        self.failing.insert(date);
        self
    }
}

impl Source for MemorySource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch(&self, security_id: &str, date: NaiveDate) -> Result<Option<PartialRecord>, FetchError> {
        if self.failing.contains(&date) {
            return Err(FetchError::Network(format!("simulated failure on {date}")));
        }
        Ok(self
            .records
            .iter()
            .find(|r| r.security_id == security_id && r.date == date)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daybook_core::SourceField;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_calendar_days_skips_weekends() {
        // 2024-01-05 is a Friday.
        let days: Vec<NaiveDate> = calendar_days(d(2024, 1, 5), d(2024, 1, 8), true).collect();
        assert_eq!(days, vec![d(2024, 1, 5), d(2024, 1, 8)]);

        let all: Vec<NaiveDate> = calendar_days(d(2024, 1, 5), d(2024, 1, 8), false).collect();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_calendar_days_empty_when_reversed() {
        assert_eq!(calendar_days(d(2024, 1, 8), d(2024, 1, 5), false).count(), 0);
    }

    #[test]
    fn test_memory_source_fetch_range_skips_failures() {
        let source = MemorySource::new(SourceKind::Price)
            .with_record(PartialRecord::new(SourceKind::Price, "2330", d(2024, 1, 2)).with(SourceField::Close, "590"))
            .with_record(PartialRecord::new(SourceKind::Price, "2330", d(2024, 1, 3)).with(SourceField::Close, "595"))
            .with_record(PartialRecord::new(SourceKind::Price, "2317", d(2024, 1, 3)).with(SourceField::Close, "100"))
            .failing_on(d(2024, 1, 3));

        let records = source.fetch_range("2330", d(2024, 1, 1), d(2024, 1, 4)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, d(2024, 1, 2));
    }

    #[test]
    fn test_per_trading_day_source_not_queried_on_weekend() {
        let saturday = d(2024, 1, 6);
        let source = MemorySource::new(SourceKind::Institutional)
            .with_record(PartialRecord::new(SourceKind::Institutional, "2330", saturday).with(SourceField::ForeignNet, "1"));
        let records = source.fetch_range("2330", saturday, saturday).unwrap();
        assert!(records.is_empty());
    }
}
