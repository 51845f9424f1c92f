//! End-to-end pipeline: merge, sequence, derive, project.
//!
//! Each stage takes the previous stage's output by value or by exclusive
//! reference; nothing is shared between runs.

use crate::orderer::FieldOrderer;
use crate::record::OrderedRecord;
use chrono::NaiveDate;
use daybook_core::{Config, FieldConflict, PartialRecord, Result};
use daybook_features::{IndicatorCalculator, VolumeAnalytics};
use daybook_ingestion::{Collector, MergeOutput, OrderedSeries, RecordMerger, Source};
use serde::Serialize;
use tracing::{info, warn};

/// Final ordered records plus any merge conflicts that were tolerated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub records: Vec<OrderedRecord>,
    pub conflicts: Vec<FieldConflict>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    data: &'a [OrderedRecord],
    count: usize,
    #[serde(skip_serializing_if = "no_conflicts")]
    conflicts: &'a [FieldConflict],
}

fn no_conflicts(conflicts: &&[FieldConflict]) -> bool {
    conflicts.is_empty()
}

impl PipelineOutput {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Render as `{"success": true, "data": [...], "count": n}`.
    ///
    /// Conflicts, if any, are listed under `"conflicts"`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&Envelope {
            success: true,
            data: &self.records,
            count: self.records.len(),
            conflicts: &self.conflicts,
        })?)
    }
}

/// Configured merge-and-derive pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    indicators: IndicatorCalculator,
    volume: VolumeAnalytics,
    orderer: FieldOrderer,
}

impl Pipeline {
    /// Build a pipeline, rejecting invalid configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let decimals = config.output.decimals;
        Ok(Self {
            indicators: IndicatorCalculator::new(&config.indicators, decimals),
            volume: VolumeAnalytics::new(&config.volume, decimals),
            orderer: FieldOrderer::new(config.output.naming, decimals),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Merge partial records into one record per (security, date).
    pub fn merge(&self, partials: impl IntoIterator<Item = PartialRecord>) -> Result<MergeOutput> {
        let mut merger = RecordMerger::new(self.config.merge.policy);
        merger.merge_all(partials)?;
        Ok(merger.finish())
    }

    /// Run the enabled calculators over the series in place.
    pub fn derive(&self, series: &mut OrderedSeries) {
        if self.config.indicators.enabled {
            self.indicators.apply(series);
        }
        if self.config.volume.enabled {
            self.volume.apply(series);
        }
    }

    /// Project every record of the series.
    pub fn project(&self, series: &OrderedSeries) -> Vec<OrderedRecord> {
        series.iter().map(|r| self.orderer.project(r)).collect()
    }

    /// Run every stage over already-fetched partial records.
    pub fn process(&self, partials: impl IntoIterator<Item = PartialRecord>) -> Result<PipelineOutput> {
        let MergeOutput { records, conflicts } = self.merge(partials)?;
        let mut series = OrderedSeries::sequence(records)?;
        self.derive(&mut series);
        let records = self.project(&series);
        info!(records = records.len(), conflicts = conflicts.len(), "pipeline complete");
        Ok(PipelineOutput { records, conflicts })
    }

    /// Fetch the configured sources for a security and run every stage.
    ///
    /// Sources whose kind is not requested are skipped; the rest are merged
    /// in the configured source order.
    pub fn run(
        &self,
        security_id: &str,
        sources: &[&dyn Source],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PipelineOutput> {
        let requested = &self.config.sources.sources;
        let mut selected: Vec<&dyn Source> = Vec::new();
        for kind in requested {
            match sources.iter().find(|s| s.kind() == *kind) {
                Some(source) => selected.push(*source),
                None => warn!(source = %kind, "requested source not available"),
            }
        }

        let batches = Collector::new(selected)
            .parallel(self.config.sources.parallel_fetch)
            .collect(security_id, start, end)?;
        self.process(batches.into_iter().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daybook_core::{ConflictPolicy, Error, SourceField, SourceKind};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn price(day: u32, close: &str) -> PartialRecord {
        PartialRecord::new(SourceKind::Price, "2330", d(day)).with(SourceField::Close, close)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.volume.ratio_window = 0;
        assert!(matches!(Pipeline::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_process_orders_by_date() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let out = pipeline
            .process(vec![price(4, "600"), price(2, "590"), price(3, "595")])
            .unwrap();
        let dates: Vec<&str> = out.records.iter().filter_map(|r| r.get("date")).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);
    }

    #[test]
    fn test_disabled_calculators() {
        let mut config = Config::default();
        config.indicators.enabled = false;
        config.volume.enabled = false;
        let pipeline = Pipeline::new(config).unwrap();
        let partials = (1..=5).map(|day| {
            price(day, "100").with(SourceField::Change, "1").with(SourceField::Shares, "1,000")
        });
        let out = pipeline.process(partials).unwrap();
        let last = out.records.last().unwrap();
        assert!(last.get("ma5").is_none());
        assert!(last.get("change_pct").is_none());
        assert!(last.get("volume_ratio").is_none());
    }

    #[test]
    fn test_strict_conflict_aborts() {
        let mut config = Config::default();
        config.merge.policy = ConflictPolicy::Strict;
        let pipeline = Pipeline::new(config).unwrap();
        let clash = PartialRecord::new(SourceKind::Fundamental, "2330", d(2)).with(SourceField::Close, "1");
        assert!(matches!(
            pipeline.process(vec![price(2, "590"), clash]),
            Err(Error::FieldConflict { .. })
        ));
    }

    #[test]
    fn test_tie_renders_like_fixed_point_formatting() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let closes = ["1", "1", "1", "1", "1.625"];
        let partials = closes.iter().zip(1..).map(|(close, day)| price(day, close));
        let out = pipeline.process(partials).unwrap();
        assert_eq!(out.records[4].get("ma5"), Some("1.12"));
    }

    #[test]
    fn test_feed_field_named_like_derived_survives() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let feed = PartialRecord::new(SourceKind::Fundamental, "2330", d(2)).with_named("MA60", "588.10");
        let out = pipeline.process(vec![price(2, "590"), feed]).unwrap();
        assert_eq!(out.records[0].get("MA60"), Some("588.10"));
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn test_envelope_json() {
        let pipeline = Pipeline::new(Config::default()).unwrap();
        let out = pipeline.process(vec![price(2, "590")]).unwrap();
        let json = out.to_json().unwrap();
        assert!(json.starts_with(r#"{"success":true,"data":[{"date":"2024-01-02","security_id":"2330","close":"590""#));
        assert!(json.ends_with(r#""count":1}"#));
    }
}
