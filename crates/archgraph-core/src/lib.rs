//! Shared vocabulary of the ArchGraph analysis pipeline: errors, structural
//! facts, module identifiers, configuration and logging setup.

pub mod cancellation;
pub mod codec;
pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod module_id;
pub mod types;

pub use cancellation::*;
pub use config::*;
pub use error::*;
pub use hashing::*;
pub use logging::init_logging;
pub use module_id::*;
pub use types::*;
