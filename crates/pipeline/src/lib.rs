//! Merge-and-derive pipeline for daily security records.
//!
//! This crate provides:
//! - The field orderer that fixes the presentation order
//! - An insertion-ordered output record
//! - The pipeline driver (merge, sequence, derive, project)

pub mod orderer;
pub mod pipeline;
pub mod record;

pub use orderer::{canonical_fields, FieldOrderer};
pub use pipeline::{Pipeline, PipelineOutput};
pub use record::OrderedRecord;
