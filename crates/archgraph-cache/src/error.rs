use archgraph_core::ArchGraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Scope {scope} is content-derived and cannot carry a TTL")]
    TtlOnLocalScope { scope: String },

    #[error("TTL {ttl:?} for scope {scope} is not a whole number of seconds")]
    FractionalTtl { scope: String, ttl: std::time::Duration },

    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl From<CacheError> for ArchGraphError {
    fn from(e: CacheError) -> Self {
        ArchGraphError::Cache(e.to_string())
    }
}

impl From<ArchGraphError> for CacheError {
    fn from(e: ArchGraphError) -> Self {
        CacheError::Encoding(e.to_string())
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
