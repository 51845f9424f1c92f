//! Core types and configuration for the daybook pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Field catalogue (keys, exchange labels, source ownership)
//! - Partial and merged record types
//! - Numeric parsing of exchange-formatted values
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod fields;
pub mod parse;
pub mod types;

pub use config::{Config, ConflictPolicy, FieldNaming};
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use fields::{DerivedField, Field, SourceField, SourceKind};
pub use parse::{parse_decimal, parse_opt, round_to};
pub use types::*;
