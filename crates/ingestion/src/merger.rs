//! Record merging across sources.
//!
//! Folds partial records into one [`MergedRecord`] per (security, date),
//! keeping the order in which keys were first seen.

use chrono::NaiveDate;
use daybook_core::{
    ConflictPolicy, Error, FieldConflict, MergedRecord, PartialRecord, Result, WriteOutcome,
};
use indexmap::IndexMap;
use tracing::{debug, warn};

type RecordKey = (String, NaiveDate);

/// Merged records and any cross-source conflicts seen while building them.
#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    /// Records in first-seen key order.
    pub records: Vec<MergedRecord>,
    pub conflicts: Vec<FieldConflict>,
}

/// Accumulator for partial records.
///
/// Sources are expected to write disjoint fields. When two different
/// sources write the same field for one key, the configured
/// [`ConflictPolicy`] decides between recording the conflict (later value
/// wins) and rejecting the partial record.
#[derive(Debug, Clone, Default)]
pub struct RecordMerger {
    policy: ConflictPolicy,
    records: IndexMap<RecordKey, MergedRecord>,
    conflicts: Vec<FieldConflict>,
}

impl RecordMerger {
    /// Create a merger with the given conflict policy.
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            records: IndexMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Fold one partial record into the accumulated set.
    ///
    /// Values are stored as raw strings; nothing is parsed here. A partial
    /// with nothing beyond its key is a no-op. Under [`ConflictPolicy::Strict`]
    /// a cross-source write fails with [`Error::FieldConflict`], a date or
    /// security id value contradicting the key fails with
    /// [`Error::Integrity`], and the partial is not applied. Otherwise both
    /// are logged and merging continues.
    pub fn merge(&mut self, partial: PartialRecord) -> Result<()> {
        if partial.is_empty() {
            debug!(security_id = %partial.security_id, date = %partial.date, source = %partial.source, "empty partial record");
            return Ok(());
        }

        self.check_key_values(&partial)?;

        let key = (partial.security_id.clone(), partial.date);
        let conflicts = self.find_conflicts(&key, &partial);
        if let (ConflictPolicy::Strict, Some(first)) = (self.policy, conflicts.first()) {
            return Err(Error::FieldConflict {
                date: first.date.to_string(),
                field: first.field.clone(),
                existing: first.existing.clone(),
                written_by: first.written_by.to_string(),
                incoming: first.incoming_source.to_string(),
            });
        }
        for conflict in &conflicts {
            warn!(
                security_id = %conflict.security_id,
                date = %conflict.date,
                field = %conflict.field,
                written_by = %conflict.written_by,
                incoming_source = %conflict.incoming_source,
                "field written by more than one source"
            );
        }
        self.conflicts.extend(conflicts);

        let PartialRecord {
            source,
            security_id,
            date,
            values,
        } = partial;
        let record = self.records.entry(key).or_insert_with(|| {
            debug!(%security_id, %date, "new record");
            MergedRecord::new(security_id.clone(), date)
        });
        for (name, value) in values {
            if let WriteOutcome::Ignored = record.write(&name, value, source) {
                debug!(%security_id, %date, field = %name, "key field already fixed by record key");
            }
        }
        Ok(())
    }

    /// Merge every partial record in order, stopping at the first error.
    pub fn merge_all(&mut self, partials: impl IntoIterator<Item = PartialRecord>) -> Result<()> {
        for partial in partials {
            self.merge(partial)?;
        }
        Ok(())
    }

    fn check_key_values(&self, partial: &PartialRecord) -> Result<()> {
        for (name, value) in partial.key_mismatches() {
            if self.policy == ConflictPolicy::Strict {
                return Err(Error::integrity(format!(
                    "{name} = {value:?} contradicts record key ({}, {})",
                    partial.security_id, partial.date
                )));
            }
            warn!(
                security_id = %partial.security_id,
                date = %partial.date,
                source = %partial.source,
                field = name,
                value,
                "key value contradicts record key"
            );
        }
        Ok(())
    }

    fn find_conflicts(&self, key: &RecordKey, partial: &PartialRecord) -> Vec<FieldConflict> {
        let Some(record) = self.records.get(key) else {
            return Vec::new();
        };
        partial
            .values
            .iter()
            .filter_map(|(name, incoming)| {
                let (existing, written_by) = record.existing(name)?;
                (written_by != partial.source).then(|| FieldConflict {
                    security_id: partial.security_id.clone(),
                    date: partial.date,
                    field: name.clone(),
                    existing: existing.to_string(),
                    written_by,
                    incoming: incoming.clone(),
                    incoming_source: partial.source,
                })
            })
            .collect()
    }

    /// Look up a merged record.
    pub fn get(&self, security_id: &str, date: NaiveDate) -> Option<&MergedRecord> {
        self.records.get(&(security_id.to_string(), date))
    }

    /// Number of distinct keys merged so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Conflicts recorded so far.
    pub fn conflicts(&self) -> &[FieldConflict] {
        &self.conflicts
    }

    /// Hand over the merged records in first-seen order.
    pub fn finish(self) -> MergeOutput {
        MergeOutput {
            records: self.records.into_values().collect(),
            conflicts: self.conflicts,
        }
    }
}
