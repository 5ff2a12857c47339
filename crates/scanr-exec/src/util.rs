use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Absolute path of `command` as found through `PATH`.
pub fn find_in_path(command: &str) -> Option<PathBuf> {
    which::which(command).ok()
}

/// Command running `program` with `argv` as its full argument vector.
///
/// `argv[0]` becomes the name the child sees itself as; the remaining
/// entries are its arguments.
pub(crate) fn cmd_program(program: &Path, argv: &[String]) -> Command {
    let mut cmd = Command::new(program);
    if let Some((arg0, rest)) = argv.split_first() {
        cmd.arg0(arg0);
        cmd.args(rest);
    }
    cmd
}

/// Directory containing `program`.
pub(crate) fn containing_dir(program: &Path) -> PathBuf {
    match program.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_shell() {
        let sh = find_in_path("sh").expect("sh in PATH");
        assert!(sh.is_absolute());
    }

    #[test]
    fn unknown_command_is_none() {
        assert!(find_in_path("scanr-definitely-not-a-command").is_none());
    }

    #[test]
    fn containing_dir_of_absolute_path() {
        assert_eq!(
            containing_dir(Path::new("/usr/bin/nmap")),
            PathBuf::from("/usr/bin")
        );
        assert_eq!(containing_dir(Path::new("/nmap")), PathBuf::from("/"));
    }
}
