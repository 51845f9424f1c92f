//! Derived metrics for the daybook pipeline.
//!
//! This crate handles:
//! - Day-over-day price change percent
//! - Simple moving averages of the close
//! - Volume change, volume ratio and scaled volume
//!
//! Both calculators enrich an [`OrderedSeries`](daybook_ingestion::OrderedSeries)
//! in place and never fail: a metric that cannot be computed is left absent.

pub mod indicators;
pub mod volume;

pub use indicators::IndicatorCalculator;
pub use volume::VolumeAnalytics;
