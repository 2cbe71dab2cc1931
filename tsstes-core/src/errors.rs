use thiserror::Error;

/// Errors raised while tokenizing one input line. These are always
/// recoverable: the caller skips the line and keeps reading.
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Expected at least {expected} tab-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Can't parse {field} as an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Can't parse {field} as a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Unknown strand: {0:?}")]
    InvalidStrand(String),

    #[error("Splice percentages must be four hyphen-separated numbers: {0:?}")]
    InvalidSpliceEvidence(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid detection parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
