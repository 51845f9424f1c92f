//! Chronological sequencing of merged records.
//!
//! Every windowed metric downstream indexes by position in the
//! [`OrderedSeries`], so its ordering is checked on construction.

use daybook_core::{Error, MergedRecord, Result};
use tracing::{debug, error};

/// Merged records for one security, strictly ascending by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedSeries {
    records: Vec<MergedRecord>,
}

impl OrderedSeries {
    /// Sort records by date (stable) and validate the result.
    ///
    /// Fails with [`Error::Integrity`] if two records share a date or the
    /// records belong to more than one security.
    pub fn sequence(mut records: Vec<MergedRecord>) -> Result<Self> {
        records.sort_by_key(|r| r.date());
        validate(&records)?;
        debug!(records = records.len(), "sequenced series");
        Ok(Self { records })
    }

    /// Wrap records that are already in order, without sorting.
    ///
    /// Fails with [`Error::Integrity`] if they are not strictly ascending.
    pub fn from_sorted(records: Vec<MergedRecord>) -> Result<Self> {
        validate(&records)?;
        Ok(Self { records })
    }

    pub fn records(&self) -> &[MergedRecord] {
        &self.records
    }

    /// Mutable access for in-place enrichment. The length and dates are fixed.
    pub fn records_mut(&mut self) -> &mut [MergedRecord] {
        &mut self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MergedRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<MergedRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a OrderedSeries {
    type Item = &'a MergedRecord;
    type IntoIter = std::slice::Iter<'a, MergedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Sort merged records into an [`OrderedSeries`].
pub fn sequence(records: Vec<MergedRecord>) -> Result<OrderedSeries> {
    OrderedSeries::sequence(records)
}

fn validate(records: &[MergedRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    if let Some(other) = records.iter().find(|r| r.security_id != first.security_id) {
        error!(first = %first.security_id, other = %other.security_id, "mixed securities in series");
        return Err(Error::integrity(format!(
            "series mixes securities {} and {}",
            first.security_id, other.security_id
        )));
    }
    for pair in records.windows(2) {
        let (prev, next) = (pair[0].date(), pair[1].date());
        if prev == next {
            error!(date = %next, "duplicate date in series");
            return Err(Error::integrity(format!("duplicate record for {next}")));
        }
        if prev > next {
            error!(%prev, %next, "series out of order");
            return Err(Error::integrity(format!("{next} follows {prev}")));
        }
    }
    Ok(())
}
