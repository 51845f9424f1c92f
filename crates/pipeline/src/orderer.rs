//! Projection of merged records into the presentation field order.
//!
//! Order: key, price, traded volume, volume analytics, moving averages by
//! increasing period, institutional flow, fundamentals. Fields outside the
//! catalogue follow in the order they were first seen.

use crate::record::OrderedRecord;
use daybook_core::{format_date, DerivedField, Field, FieldNaming, MergedRecord, SourceField};

const HEAD: [Field; 14] = [
    Field::Date,
    Field::SecurityId,
    Field::Source(SourceField::Open),
    Field::Source(SourceField::High),
    Field::Source(SourceField::Low),
    Field::Source(SourceField::Close),
    Field::Source(SourceField::Change),
    Field::Derived(DerivedField::ChangePct),
    Field::Source(SourceField::Shares),
    Field::Source(SourceField::Value),
    Field::Source(SourceField::Transactions),
    Field::Derived(DerivedField::VolumeHundredMillion),
    Field::Derived(DerivedField::VolumeChangePct),
    Field::Derived(DerivedField::VolumeRatio),
];

const TAIL: [Field; 13] = [
    Field::Source(SourceField::ForeignBuy),
    Field::Source(SourceField::ForeignSell),
    Field::Source(SourceField::ForeignNet),
    Field::Source(SourceField::TrustBuy),
    Field::Source(SourceField::TrustSell),
    Field::Source(SourceField::TrustNet),
    Field::Source(SourceField::DealerNet),
    Field::Source(SourceField::InstitutionalTotal),
    Field::Source(SourceField::PeRatio),
    Field::Source(SourceField::DividendYield),
    Field::Source(SourceField::PbRatio),
    Field::Source(SourceField::DividendYear),
    Field::Source(SourceField::ReportPeriod),
];

/// Canonical field order for a given set of moving average periods.
pub fn canonical_fields(ma_periods: impl IntoIterator<Item = u32>) -> Vec<Field> {
    let mut periods: Vec<u32> = ma_periods.into_iter().collect();
    periods.sort_unstable();
    periods.dedup();

    let mut fields = HEAD.to_vec();
    fields.extend(periods.into_iter().map(|p| Field::Derived(DerivedField::MovingAverage(p))));
    fields.extend(TAIL);
    fields
}

/// Projects records into [`OrderedRecord`]s.
#[derive(Debug, Clone)]
pub struct FieldOrderer {
    naming: FieldNaming,
    decimals: u32,
}

impl FieldOrderer {
    pub fn new(naming: FieldNaming, decimals: u32) -> Self {
        Self { naming, decimals }
    }

    fn name(&self, field: Field) -> String {
        match self.naming {
            FieldNaming::Key => field.key(),
            FieldNaming::Label => field.label(),
        }
    }

    fn value(&self, record: &MergedRecord, field: Field) -> Option<String> {
        match field {
            Field::Date => Some(format_date(record.date())),
            Field::SecurityId => Some(record.security_id.clone()),
            Field::Source(f) => record.get(f).map(str::to_string),
            Field::Derived(f) => record
                .derived
                .get(f)
                .map(|v| format!("{:.*}", self.decimals as usize, v)),
        }
    }

    /// Copy every present field of `record` in canonical order, then extras.
    ///
    /// Every field on the record appears exactly once. An extra whose name
    /// collides with a canonical name is dropped in favour of the canonical
    /// value.
    pub fn project(&self, record: &MergedRecord) -> OrderedRecord {
        let mut out = OrderedRecord::new();
        for field in canonical_fields(record.derived.moving_averages.keys().copied()) {
            if let Some(value) = self.value(record, field) {
                out.push(self.name(field), value);
            }
        }
        for (name, value) in &record.extras {
            if !out.push(name.clone(), value.clone()) {
                tracing::debug!(field = %name, date = %record.date(), "extra field shadowed by canonical field");
            }
        }
        out
    }
}

impl Default for FieldOrderer {
    fn default() -> Self {
        Self::new(FieldNaming::Key, 2)
    }
}
