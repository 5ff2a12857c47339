use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{}: possible symlink attack", path.display())]
    SymlinkAttack { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: write failed ({source}) and the partial file could not be removed: {cleanup}", path.display())]
    PartialWriteCleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
        cleanup: io::Error,
    },
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn attack(path: impl Into<PathBuf>) -> Self {
        FsError::SymlinkAttack { path: path.into() }
    }
}
