use std::path::PathBuf;
use thiserror::Error;

/// Failure to construct a catalog, an index, or an engine. Always fatal:
/// a process that hits one of these must not start serving.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid binary artifact {path}: {source}")]
    Bincode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("{path}: required column `{column}` is missing")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{path}: row {row}: {reason}")]
    Malformed { path: PathBuf, row: usize, reason: String },
    #[error("{path}: duplicate book id {id}")]
    DuplicateId { path: PathBuf, id: i64 },
    #[error("unsupported catalog format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("index artifact {0} is missing")]
    ArtifactMissing(PathBuf),
    #[error("index artifact {path} is corrupt: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },
    #[error(transparent)]
    Stale(#[from] IndexStaleError),
}

/// The persisted index was built from a different catalog revision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("index is stale: built for catalog {expected}, current catalog is {found}")]
pub struct IndexStaleError {
    pub expected: String,
    pub found: String,
}

/// Query text that cannot be used as-is. Never surfaced to callers of
/// `suggest`; the engine substitutes an empty query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("query contains control characters")]
    ControlCharacters,
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io { path: path.into(), source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LoadError::ArtifactCorrupt { path: path.into(), reason: reason.into() }
    }
}
