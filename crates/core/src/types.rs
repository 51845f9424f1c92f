//! Core record types for the daybook pipeline.

use crate::fields::{DerivedField, Field, SourceField, SourceKind};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Date format used for record keys and output.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a date as `YYYY-MM-DD`.
#[inline]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Sparse set of raw values contributed by one source for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    /// Source that produced the record.
    pub source: SourceKind,
    /// Security identifier (e.g., "2330").
    pub security_id: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Field name (key or exchange label) to raw string value, in feed order.
    pub values: IndexMap<String, String>,
}

impl PartialRecord {
    /// Create an empty partial record.
    pub fn new(source: SourceKind, security_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            source,
            security_id: security_id.into(),
            date,
            values: IndexMap::new(),
        }
    }

    /// Add a known field.
    pub fn with(mut self, field: SourceField, value: impl Into<String>) -> Self {
        self.values.insert(field.key().to_string(), value.into());
        self
    }

    /// Add a field by raw name.
    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// True if the record carries nothing beyond its key.
    pub fn is_empty(&self) -> bool {
        self.values.keys().all(|name| is_key_name(name))
    }

    /// Date or security id values that contradict the record's own key.
    ///
    /// Returned as (name, value) pairs in feed order.
    pub fn key_mismatches(&self) -> Vec<(&str, &str)> {
        self.values
            .iter()
            .filter(|(name, value)| match Field::from_name(name) {
                Some(Field::Date) => NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
                    .map_or(true, |date| date != self.date),
                Some(Field::SecurityId) => value.trim() != self.security_id,
                _ => false,
            })
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }
}

/// Price and change fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceFields {
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub change: Option<String>,
}

/// Traded volume fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeFields {
    pub shares: Option<String>,
    pub value: Option<String>,
    pub transactions: Option<String>,
}

/// Institutional flow by actor class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalFields {
    pub foreign_buy: Option<String>,
    pub foreign_sell: Option<String>,
    pub foreign_net: Option<String>,
    pub trust_buy: Option<String>,
    pub trust_sell: Option<String>,
    pub trust_net: Option<String>,
    pub dealer_net: Option<String>,
    pub total_net: Option<String>,
}

/// Valuation ratios and dividend data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalFields {
    pub pe_ratio: Option<String>,
    pub dividend_yield: Option<String>,
    pub pb_ratio: Option<String>,
    pub dividend_year: Option<String>,
    pub report_period: Option<String>,
}

/// Metrics computed over the ordered series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedValues {
    pub change_pct: Option<f64>,
    pub volume_hundred_million: Option<f64>,
    pub volume_change_pct: Option<f64>,
    pub volume_ratio: Option<f64>,
    /// Moving averages keyed by period, ascending.
    pub moving_averages: BTreeMap<u32, f64>,
}

impl DerivedValues {
    pub fn get(&self, field: DerivedField) -> Option<f64> {
        match field {
            DerivedField::ChangePct => self.change_pct,
            DerivedField::VolumeHundredMillion => self.volume_hundred_million,
            DerivedField::VolumeChangePct => self.volume_change_pct,
            DerivedField::VolumeRatio => self.volume_ratio,
            DerivedField::MovingAverage(n) => self.moving_averages.get(&n).copied(),
        }
    }

    pub fn set(&mut self, field: DerivedField, value: f64) {
        match field {
            DerivedField::ChangePct => self.change_pct = Some(value),
            DerivedField::VolumeHundredMillion => self.volume_hundred_million = Some(value),
            DerivedField::VolumeChangePct => self.volume_change_pct = Some(value),
            DerivedField::VolumeRatio => self.volume_ratio = Some(value),
            DerivedField::MovingAverage(n) => {
                self.moving_averages.insert(n, value);
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What a single field write did to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Field was absent.
    Inserted,
    /// Field was present with a different value, which was replaced.
    Overwritten {
        previous: String,
        previous_source: SourceKind,
    },
    /// Field already held this value.
    Unchanged,
    /// Key fields (date, security id) are fixed by the record key.
    Ignored,
}

/// Canonical per-(security, date) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub security_id: String,
    date: NaiveDate,
    pub price: PriceFields,
    pub volume: VolumeFields,
    pub institutional: InstitutionalFields,
    pub fundamental: FundamentalFields,
    pub derived: DerivedValues,
    /// Fields with no catalogue entry, in encounter order.
    pub extras: IndexMap<String, String>,
    /// Which source wrote each stored field, by field key.
    #[serde(skip)]
    provenance: HashMap<String, SourceKind>,
}

impl MergedRecord {
    /// Create an empty record seeded with its key.
    pub fn new(security_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            security_id: security_id.into(),
            date,
            price: PriceFields::default(),
            volume: VolumeFields::default(),
            institutional: InstitutionalFields::default(),
            fundamental: FundamentalFields::default(),
            derived: DerivedValues::default(),
            extras: IndexMap::new(),
            provenance: HashMap::new(),
        }
    }

    /// Trading date. Fixed at creation.
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Raw value of a source field.
    pub fn get(&self, field: SourceField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Close price as stored.
    #[inline]
    pub fn close(&self) -> Option<&str> {
        self.price.close.as_deref()
    }

    /// Traded shares as stored.
    #[inline]
    pub fn shares(&self) -> Option<&str> {
        self.volume.shares.as_deref()
    }

    /// Existing value and writer for a raw field name, if stored.
    pub fn existing(&self, name: &str) -> Option<(&str, SourceKind)> {
        let value = match Field::from_name(name) {
            Some(Field::Source(f)) => self.get(f)?,
            Some(Field::Date | Field::SecurityId) => return None,
            Some(Field::Derived(_)) | None => self.extras.get(name)?.as_str(),
        };
        let key = storage_key(name);
        let source = *self.provenance.get(&key)?;
        Some((value, source))
    }

    /// Store a raw value by field name, recording the writing source.
    ///
    /// Names that resolve to a source field go into their typed slot. Any
    /// other name, including one shaped like a derived field (`MA60`), is kept
    /// verbatim in `extras`; computed values take precedence on output.
    pub fn write(&mut self, name: &str, value: String, source: SourceKind) -> WriteOutcome {
        let key = storage_key(name);
        let slot = match Field::from_name(name) {
            Some(Field::Source(f)) => self.slot_mut(f),
            Some(Field::Date | Field::SecurityId) => return WriteOutcome::Ignored,
            Some(Field::Derived(_)) | None => {
                let previous = self.extras.insert(name.to_string(), value.clone());
                let previous_source = self.provenance.insert(key, source);
                return outcome(previous, previous_source, &value, source);
            }
        };
        let previous = slot.replace(value.clone());
        let previous_source = self.provenance.insert(key, source);
        outcome(previous, previous_source, &value, source)
    }

    /// Iterate the stored source fields in catalogue order.
    pub fn source_fields(&self) -> impl Iterator<Item = (SourceField, &str)> + '_ {
        SourceField::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|v| (f, v)))
    }

    fn slot(&self, field: SourceField) -> &Option<String> {
        use SourceField::*;
        match field {
            Open => &self.price.open,
            High => &self.price.high,
            Low => &self.price.low,
            Close => &self.price.close,
            Change => &self.price.change,
            Shares => &self.volume.shares,
            Value => &self.volume.value,
            Transactions => &self.volume.transactions,
            ForeignBuy => &self.institutional.foreign_buy,
            ForeignSell => &self.institutional.foreign_sell,
            ForeignNet => &self.institutional.foreign_net,
            TrustBuy => &self.institutional.trust_buy,
            TrustSell => &self.institutional.trust_sell,
            TrustNet => &self.institutional.trust_net,
            DealerNet => &self.institutional.dealer_net,
            InstitutionalTotal => &self.institutional.total_net,
            PeRatio => &self.fundamental.pe_ratio,
            DividendYield => &self.fundamental.dividend_yield,
            PbRatio => &self.fundamental.pb_ratio,
            DividendYear => &self.fundamental.dividend_year,
            ReportPeriod => &self.fundamental.report_period,
        }
    }

    fn slot_mut(&mut self, field: SourceField) -> &mut Option<String> {
        use SourceField::*;
        match field {
            Open => &mut self.price.open,
            High => &mut self.price.high,
            Low => &mut self.price.low,
            Close => &mut self.price.close,
            Change => &mut self.price.change,
            Shares => &mut self.volume.shares,
            Value => &mut self.volume.value,
            Transactions => &mut self.volume.transactions,
            ForeignBuy => &mut self.institutional.foreign_buy,
            ForeignSell => &mut self.institutional.foreign_sell,
            ForeignNet => &mut self.institutional.foreign_net,
            TrustBuy => &mut self.institutional.trust_buy,
            TrustSell => &mut self.institutional.trust_sell,
            TrustNet => &mut self.institutional.trust_net,
            DealerNet => &mut self.institutional.dealer_net,
            InstitutionalTotal => &mut self.institutional.total_net,
            PeRatio => &mut self.fundamental.pe_ratio,
            DividendYield => &mut self.fundamental.dividend_yield,
            PbRatio => &mut self.fundamental.pb_ratio,
            DividendYear => &mut self.fundamental.dividend_year,
            ReportPeriod => &mut self.fundamental.report_period,
        }
    }
}

/// Labels and keys of the same source field share one provenance entry.
fn storage_key(name: &str) -> String {
    match Field::from_name(name) {
        Some(field @ Field::Source(_)) => field.key(),
        _ => name.to_string(),
    }
}

fn is_key_name(name: &str) -> bool {
    matches!(Field::from_name(name), Some(Field::Date | Field::SecurityId))
}

fn outcome(
    previous: Option<String>,
    previous_source: Option<SourceKind>,
    value: &str,
    source: SourceKind,
) -> WriteOutcome {
    match previous {
        None => WriteOutcome::Inserted,
        Some(prev) if prev == value => WriteOutcome::Unchanged,
        Some(prev) => WriteOutcome::Overwritten {
            previous: prev,
            previous_source: previous_source.unwrap_or(source),
        },
    }
}

/// A field written by two different sources for the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub security_id: String,
    pub date: NaiveDate,
    /// Field name as supplied by the later source.
    pub field: String,
    /// Value kept before the later write.
    pub existing: String,
    pub written_by: SourceKind,
    /// Value supplied by the later source.
    pub incoming: String,
    pub incoming_source: SourceKind,
}
