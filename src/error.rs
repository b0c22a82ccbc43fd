use thiserror::Error;

/// Error taxonomy shared by every reader, writer, and filter.
///
/// Variants name the *kind* of failure, not a concrete source type: callers
/// match on the kind to decide whether a condition is recoverable (parse,
/// skip one line) or fatal for the whole conversion.
#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("structure error: {0}")]
    Structure(String),
    #[error("domain error: {0}")]
    Domain(String),
    #[error("missing region: {0}")]
    MissingRegion(String),
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("filter error: {0}")]
    FilterError(String),
    #[error("usage error: {0}")]
    Usage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
