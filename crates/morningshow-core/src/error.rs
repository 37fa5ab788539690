use thiserror::Error;

/// Invalid or unparseable configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("unknown IANA time zone '{value}'")]
    UnknownTimezone { value: String },
    #[error("quote list must contain at least one quote")]
    EmptyQuoteList,
}

/// A fetched value that cannot be displayed.
///
/// Always recovered by the renderer, which shows the placeholder instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormatError {
    #[error("'{raw}' is not a number")]
    NotANumber { raw: String },
    #[error("field '{field}' is not finite")]
    NonFinite { field: &'static str },
    #[error("field '{field}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
