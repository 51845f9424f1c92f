//! Fetch orchestration across sources.
//!
//! Sources may be queried concurrently, but their partial records are always
//! merged on the calling thread, in source order. The merger is the only
//! place where records for one key are combined.

use crate::merger::RecordMerger;
use crate::source::Source;
use chrono::NaiveDate;
use daybook_core::{Error, PartialRecord, Result};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Drives a set of sources over a date range.
pub struct Collector<'a> {
    sources: Vec<&'a dyn Source>,
    parallel: bool,
}

impl<'a> Collector<'a> {
    /// Create a collector over `sources`, merged in the given order.
    pub fn new(sources: Vec<&'a dyn Source>) -> Self {
        Self {
            sources,
            parallel: false,
        }
    }

    /// Fetch sources concurrently.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fetch every source over `[start, end]`.
    ///
    /// Returns one batch per source, in source order. A source that fails
    /// outright contributes an empty batch.
    pub fn collect(&self, security_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Vec<PartialRecord>>> {
        if start > end {
            return Err(Error::data(format!("start {start} is after end {end}")));
        }
        let fetch = |source: &&'a dyn Source| fetch_source(*source, security_id, start, end);
        let batches: Vec<Vec<PartialRecord>> = if self.parallel {
            self.sources.par_iter().map(fetch).collect()
        } else {
            self.sources.iter().map(fetch).collect()
        };
        Ok(batches)
    }

    /// Fetch every source and merge the results into `merger`.
    pub fn collect_into(
        &self,
        merger: &mut RecordMerger,
        security_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()> {
        for batch in self.collect(security_id, start, end)? {
            merger.merge_all(batch)?;
        }
        Ok(())
    }
}

fn fetch_source(source: &dyn Source, security_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<PartialRecord> {
    let kind = source.kind();
    match source.fetch_range(security_id, start, end) {
        Ok(records) => {
            let (kept, foreign): (Vec<_>, Vec<_>) = records
                .into_iter()
                .partition(|r| r.security_id == security_id && r.date >= start && r.date <= end);
            if !foreign.is_empty() {
                warn!(source = %kind, dropped = foreign.len(), "source returned records outside the request");
            }
            debug!(source = %kind, records = kept.len(), "fetched");
            kept
        }
        Err(err) => {
            warn!(source = %kind, security_id, %err, "source fetch failed");
            Vec::new()
        }
    }
}
