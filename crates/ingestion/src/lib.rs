//! Data ingestion and normalization for the daybook pipeline.
//!
//! This crate handles:
//! - The source contract and the exchange report adapters
//! - Merging partial records into one record per (security, date)
//! - Chronological sequencing of merged records
//! - Fetch orchestration across sources

pub mod collector;
pub mod exchange;
pub mod merger;
pub mod sequencer;
pub mod source;

pub use collector::Collector;
pub use exchange::{ExchangeSource, ReportResponse, Transport};
pub use merger::{MergeOutput, RecordMerger};
pub use sequencer::{sequence, OrderedSeries};
pub use source::{FetchError, MemorySource, Source};
