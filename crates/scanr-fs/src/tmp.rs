use std::{
    ffi::CString,
    io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::error::{FsError, FsResult};

/// Platform temporary directory, verified to be readable, writable and searchable.
pub fn temp_directory() -> FsResult<PathBuf> {
    let dir = std::env::temp_dir();
    check_access(&dir).inspect_err(|e| {
        warn!(target: "scanr.fs", error = %e, "temporary directory not available, check the installation")
    })?;
    Ok(dir)
}

fn check_access(dir: &Path) -> FsResult<()> {
    let c_path = CString::new(dir.as_os_str().as_bytes()).map_err(|e| {
        FsError::io(dir, io::Error::new(io::ErrorKind::InvalidInput, e))
    })?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK | libc::X_OK) };
    if rc != 0 {
        return Err(FsError::io(dir, io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn temp_directory_is_usable() {
        let dir = temp_directory().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn missing_directory_fails_access_check() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        assert!(matches!(check_access(&missing), Err(FsError::Io { .. })));
    }

    #[test]
    fn accessible_directory_passes() {
        let dir = TempDir::new().unwrap();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700)).unwrap();
        assert!(check_access(dir.path()).is_ok());
    }
}
