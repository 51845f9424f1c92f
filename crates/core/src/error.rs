//! Error types for the daybook pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the daybook pipeline.
///
/// Data-quality gaps (unparseable numbers, short windows) never reach this
/// type; calculators drop the affected field instead. Only configuration
/// problems and broken record invariants are reported.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed upstream data (bad date, short row).
    #[error("Data error: {0}")]
    Data(String),

    /// Record invariant violated (duplicate date, unsorted series, mixed securities).
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Two different sources wrote the same field under a strict merge policy.
    #[error("Field conflict on {date} for {field}: {existing} already written by {written_by}, {incoming} also wrote it")]
    FieldConflict {
        date: String,
        field: String,
        existing: String,
        written_by: String,
        incoming: String,
    },

    /// Numeric parse error.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an integrity error.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }
}

/// Why a raw value could not be read as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Nothing left after trimming and removing separators.
    Empty,
    /// Not a decimal number.
    Invalid,
    /// Parsed to NaN or infinity.
    NonFinite,
}

/// Failure to parse a locale-formatted decimal string.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot parse {input:?} as a number ({kind:?})")]
pub struct ParseError {
    pub input: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(input: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            input: input.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_converts() {
        let err: Error = ParseError::new("x", ParseErrorKind::Invalid).into();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("\"x\""));
    }

    #[test]
    fn test_conflict_message() {
        let err = Error::FieldConflict {
            date: "2024-01-02".into(),
            field: "close".into(),
            existing: "590".into(),
            written_by: "price".into(),
            incoming: "fundamental".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-01-02"));
        assert!(msg.contains("fundamental"));
    }
}
