//! Content-hash-addressed cache shared by the extractor and any consumer of
//! externally sourced metadata.

pub mod error;
pub mod key;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod storage;

pub use error::*;
pub use key::*;
pub use manager::CacheManager;
pub use metrics::*;
pub use storage::{MemoryStore, PersistentStore, SqliteStore, StoredEntry};
