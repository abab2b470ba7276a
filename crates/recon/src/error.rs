use thiserror::Error;

/// Input-level failures. Per-record problems never surface here; they are
/// routed into buckets, statistics and diagnostics instead.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (empty path, bad prefix, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("catalog line {line}: {message}")]
    CatalogParse { line: u64, message: String },

    #[error("mapping line {line}: {message}")]
    MappingParse { line: u64, message: String },

    #[error("detection database: {0}")]
    DetectionDbParse(String),

    #[error("reviewed file '{file}': {message}")]
    ReviewedParse { file: String, message: String },

    /// Report rendering error (CSV writer failure).
    #[error("report error: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;
