use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    os::unix::{
        fs::OpenOptionsExt,
        io::IntoRawFd,
    },
    path::Path,
};

use tracing::{debug, trace, warn};

use crate::{
    error::{FsError, FsResult},
    identity::{FileIdentity, Snapshot, snapshot},
};

/// Created files are readable and writable by the owner only.
const CREATE_MODE: u32 = 0o600;

/// Step by which the read buffer grows when a file outgrows its stat size.
const GROW_STEP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

/// Read the whole file at `path`.
///
/// A missing file is created exclusively (owner-only) and reads as empty.
/// Contents are returned verbatim, embedded zero bytes included.
pub fn read_file(path: impl AsRef<Path>) -> FsResult<Vec<u8>> {
    let path = path.as_ref();
    read_inner(path).inspect_err(|e| warn!(target: "scanr.fs", error = %e, "read_file failed"))
}

fn read_inner(path: &Path) -> FsResult<Vec<u8>> {
    let snap = snapshot(path).map_err(|e| FsError::io(path, e))?;
    let mut file = open_checked(path, snap, Access::Read)?;

    let hint = snap.map(|s| s.len as usize).unwrap_or(0);
    let buf = read_growing(&mut file, hint).map_err(|e| FsError::io(path, e))?;
    trace!(target: "scanr.fs", path = %path.display(), len = buf.len(), "read");
    Ok(buf)
}

/// Replace the contents of `path` with `data`.
///
/// On a failed write or close the partially written file is removed.
/// Returns the number of bytes written.
pub fn write_file(path: impl AsRef<Path>, data: &[u8]) -> FsResult<usize> {
    let path = path.as_ref();
    write_inner(path, data)
        .inspect_err(|e| warn!(target: "scanr.fs", error = %e, "write_file failed"))
}

fn write_inner(path: &Path, data: &[u8]) -> FsResult<usize> {
    let snap = snapshot(path).map_err(|e| FsError::io(path, e))?;
    let mut file = open_checked(path, snap, Access::Write)?;

    file.set_len(0).map_err(|e| FsError::io(path, e))?;

    if let Err(e) = write_all_retrying(&mut file, data) {
        drop(file);
        return Err(discard_partial(path, e));
    }

    let fd = file.into_raw_fd();
    // SAFETY: `fd` was just released by `File` and is closed exactly once here.
    if unsafe { libc::close(fd) } != 0 {
        return Err(discard_partial(path, io::Error::last_os_error()));
    }

    trace!(target: "scanr.fs", path = %path.display(), len = data.len(), "written");
    Ok(data.len())
}

/// Unlink `path`.
pub fn delete_file(path: impl AsRef<Path>) -> FsResult<()> {
    let path = path.as_ref();
    std::fs::remove_file(path)
        .map_err(|e| FsError::io(path, e))
        .inspect_err(|e| warn!(target: "scanr.fs", error = %e, "delete_file failed"))
}

/// Size of the file at `path`, following symlinks.
///
/// Every stat failure, "not found" included, yields `None`.
pub fn stat_size(path: impl AsRef<Path>) -> Option<u64> {
    let path = path.as_ref();
    match std::fs::metadata(path) {
        Ok(meta) => Some(meta.len()),
        Err(e) => {
            debug!(target: "scanr.fs", path = %path.display(), error = %e, "stat failed");
            None
        }
    }
}

/// Open `path` and verify it is still the object described by `snap`.
///
/// `snap == None` means nothing existed at check time, so the file is
/// created exclusively; finding something there now is treated as an attack.
pub(crate) fn open_checked(path: &Path, snap: Option<Snapshot>, access: Access) -> FsResult<File> {
    let mut opts = OpenOptions::new();
    match access {
        Access::Read => opts.read(true),
        Access::Write => opts.write(true),
    };

    let Some(snap) = snap else {
        match access {
            // Read-only exclusive create is not expressible through
            // `OpenOptions::create_new`, which insists on write access.
            Access::Read => opts.custom_flags(libc::O_CREAT | libc::O_EXCL | libc::O_NOFOLLOW),
            Access::Write => opts.create_new(true).custom_flags(libc::O_NOFOLLOW),
        };
        opts.mode(CREATE_MODE);

        return opts.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => FsError::attack(path),
            _ => FsError::io(path, e),
        });
    };

    opts.custom_flags(libc::O_NOFOLLOW);
    let file = opts.open(path).map_err(|e| {
        // ELOOP: a symlink was planted; ENOENT: the checked file vanished.
        match e.raw_os_error() {
            Some(libc::ELOOP) | Some(libc::ENOENT) => FsError::attack(path),
            _ => FsError::io(path, e),
        }
    })?;

    let meta = file.metadata().map_err(|_| FsError::attack(path))?;
    if FileIdentity::of(&meta) != snap.identity {
        return Err(FsError::attack(path));
    }
    Ok(file)
}

/// Read until EOF into a buffer pre-sized to `hint` bytes.
///
/// Reading past `hint` grows the buffer in [`GROW_STEP`] increments.
pub(crate) fn read_growing<R: Read>(reader: &mut R, hint: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; hint + 1];
    let mut len = 0;

    loop {
        match reader.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => {
                len += n;
                if len == buf.len() {
                    buf.resize(buf.len() + GROW_STEP, 0);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    buf.truncate(len);
    buf.shrink_to_fit();
    Ok(buf)
}

fn write_all_retrying<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn discard_partial(path: &Path, source: io::Error) -> FsError {
    match std::fs::remove_file(path) {
        Ok(()) => FsError::io(path, source),
        Err(cleanup) => FsError::PartialWriteCleanup {
            path: path.to_path_buf(),
            source,
            cleanup,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::Cursor,
        os::unix::fs::{PermissionsExt, symlink},
    };
    use tempfile::TempDir;

    #[test]
    fn write_then_read_roundtrip_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        let data: Vec<u8> = (0..=255u8).chain([0, 0, 7, 0]).collect();

        assert_eq!(write_file(&path, &data).unwrap(), data.len());
        let back = read_file(&path).unwrap();

        assert_eq!(back, data);
        assert_eq!(back.len(), data.len());
    }

    #[test]
    fn write_creates_owner_only_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret");
        write_file(&path, b"k").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn write_truncates_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"a much longer previous content").unwrap();

        write_file(&path, b"short").unwrap();
        assert_eq!(read_file(&path).unwrap(), b"short");
    }

    #[test]
    fn read_missing_file_creates_it_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh");

        assert!(read_file(&path).unwrap().is_empty());
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.permissions().mode() & 0o077, 0);
    }

    #[test]
    fn read_rejects_planted_symlink() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        std::fs::write(&target, b"secret").unwrap();
        symlink(&target, &link).unwrap();

        assert!(matches!(read_file(&link), Err(FsError::SymlinkAttack { .. })));
    }

    #[test]
    fn write_through_symlink_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        std::fs::write(&target, b"original").unwrap();
        symlink(&target, &link).unwrap();

        assert!(matches!(
            write_file(&link, b"evil"),
            Err(FsError::SymlinkAttack { .. })
        ));
        assert_eq!(std::fs::read(&target).unwrap(), b"original");
    }

    #[test]
    fn swap_to_symlink_after_check_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("victim");
        let other = dir.path().join("other");
        std::fs::write(&path, b"checked").unwrap();
        std::fs::write(&other, b"other").unwrap();

        let snap = snapshot(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        symlink(&other, &path).unwrap();

        for access in [Access::Read, Access::Write] {
            assert!(matches!(
                open_checked(&path, snap, access),
                Err(FsError::SymlinkAttack { .. })
            ));
        }
        assert_eq!(std::fs::read(&other).unwrap(), b"other");
    }

    #[test]
    fn swap_to_other_file_after_check_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("victim");
        let replacement = dir.path().join("replacement");
        std::fs::write(&path, b"checked").unwrap();
        std::fs::write(&replacement, b"swapped").unwrap();

        let snap = snapshot(&path).unwrap();
        std::fs::rename(&replacement, &path).unwrap();

        assert!(matches!(
            open_checked(&path, snap, Access::Read),
            Err(FsError::SymlinkAttack { .. })
        ));
    }

    #[test]
    fn creation_race_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late");

        let snap = snapshot(&path).unwrap();
        assert!(snap.is_none());
        std::fs::write(&path, b"planted").unwrap();

        for access in [Access::Read, Access::Write] {
            assert!(matches!(
                open_checked(&path, snap, access),
                Err(FsError::SymlinkAttack { .. })
            ));
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"planted");
    }

    #[test]
    fn read_growing_handles_growth_past_hint() {
        let data = vec![0xabu8; 3 * GROW_STEP + 17];
        let out = read_growing(&mut Cursor::new(data.clone()), 10).unwrap();

        assert_eq!(out, data);
        assert_eq!(out.capacity(), out.len());
    }

    #[test]
    fn read_growing_exact_hint() {
        let out = read_growing(&mut Cursor::new(b"abc".to_vec()), 3).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn read_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(read_file(dir.path()), Err(FsError::Io { .. })));
    }

    #[test]
    fn delete_removes_and_reports_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        std::fs::write(&path, b"x").unwrap();

        delete_file(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(delete_file(&path), Err(FsError::Io { .. })));
    }

    #[test]
    fn stat_size_collapses_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sized");
        std::fs::write(&path, vec![1u8; 1234]).unwrap();

        assert_eq!(stat_size(&path), Some(1234));
        assert_eq!(stat_size(dir.path().join("missing")), None);
    }

    /// Writer that accepts `budget` bytes and then fails.
    struct FailAfter<W> {
        inner: W,
        budget: usize,
    }

    impl<W: Write> Write for FailAfter<W> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("device gone"));
            }
            let n = buf.len().min(self.budget);
            let n = self.inner.write(&buf[..n])?;
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn failed_write_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial");
        let mut writer = FailAfter {
            inner: File::create(&path).unwrap(),
            budget: 3,
        };

        let err = write_all_retrying(&mut writer, b"0123456789").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        drop(writer);
        assert_eq!(std::fs::read(&path).unwrap(), b"012");

        let err = discard_partial(&path, err);
        assert!(matches!(err, FsError::Io { ref source, .. } if source.kind() == io::ErrorKind::Other));
        assert!(!path.exists());
    }

    #[test]
    fn write_retries_interrupted_writes() {
        struct Interrupting {
            out: Vec<u8>,
            interrupt: bool,
        }

        impl Write for Interrupting {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.interrupt = !self.interrupt;
                if self.interrupt {
                    return Err(io::ErrorKind::Interrupted.into());
                }
                let n = buf.len().min(2);
                self.out.extend_from_slice(&buf[..n]);
                Ok(n)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = Interrupting {
            out: Vec::new(),
            interrupt: false,
        };
        write_all_retrying(&mut writer, b"abcdefg").unwrap();
        assert_eq!(writer.out, b"abcdefg");
    }

    #[test]
    fn undeletable_partial_file_is_reported() {
        // A directory cannot be unlinked like a file, whatever the privileges.
        let dir = TempDir::new().unwrap();
        let source = io::Error::other("device gone");

        let err = discard_partial(dir.path(), source);

        assert!(matches!(err, FsError::PartialWriteCleanup { .. }));
        assert!(dir.path().is_dir());
    }

    #[test]
    fn partial_file_in_read_only_directory_is_reported() {
        // Permission bits do not bind root.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let dir = TempDir::new().unwrap();
        let sealed = dir.path().join("sealed");
        std::fs::create_dir(&sealed).unwrap();
        let path = sealed.join("partial");
        std::fs::write(&path, b"012").unwrap();
        std::fs::set_permissions(&sealed, std::fs::Permissions::from_mode(0o500)).unwrap();

        let err = discard_partial(&path, io::Error::other("device gone"));
        std::fs::set_permissions(&sealed, std::fs::Permissions::from_mode(0o700)).unwrap();

        assert!(matches!(err, FsError::PartialWriteCleanup { .. }));
        assert!(path.exists());
    }
}
