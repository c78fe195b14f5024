//! Domain errors raised by the reduction engine. Orchestration wraps these in `anyhow`
//! with the offending partition path attached.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("ANONYMIZATION_SALT is missing or empty; refusing to anonymize with a weak salt")]
    MissingSalt,

    #[error("column `{column}` not found in {}", path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("column `{column}` has unsupported type {data_type}")]
    UnsupportedColumnType { column: String, data_type: String },

    #[error("timestamp {0} (ns) is out of range")]
    InvalidTimestamp(i128),

    #[error("no conversion rate for currency `{0}`")]
    UnknownCurrency(String),

    #[error("bad partition {}: {reason}", path.display())]
    InvalidPartition { path: PathBuf, reason: String },

    #[error("invalid matcher `{matcher}`: {reason}")]
    InvalidMatcher { matcher: String, reason: String },
}
