mod tasks;
pub use tasks::sync::{fetch_document, synchronize};

mod mapping;
pub use mapping::{apply_document, apply_members, parse_document};

mod config;
pub use config::{DEFAULT_CONTEXT, DEFAULT_TIMEOUT_MS, SyncConfig};

mod errors;
pub use errors::SyncError;
