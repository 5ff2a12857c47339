use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
