use std::{fs::Metadata, io, os::unix::fs::MetadataExt, path::Path};

/// `(device, inode, mode)` of a filesystem object.
///
/// Two identities taken from the path and from the opened descriptor must be
/// equal, otherwise the path was swapped between check and use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
}

impl FileIdentity {
    pub fn of(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
        }
    }
}

/// Identity plus the size reported at check time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot {
    pub identity: FileIdentity,
    pub len: u64,
}

/// Non-following stat of `path`; `Ok(None)` when nothing exists there.
pub(crate) fn snapshot(path: &Path) -> io::Result<Option<Snapshot>> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(Snapshot {
            identity: FileIdentity::of(&meta),
            len: meta.len(),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn missing_path_has_no_snapshot() {
        let dir = TempDir::new().unwrap();
        assert!(snapshot(&dir.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn symlink_snapshot_differs_from_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        std::fs::write(&target, b"data").unwrap();
        symlink(&target, &link).unwrap();

        let t = snapshot(&target).unwrap().unwrap();
        let l = snapshot(&link).unwrap().unwrap();
        assert_ne!(t.identity, l.identity);
        assert_eq!(t.len, 4);
    }
}
