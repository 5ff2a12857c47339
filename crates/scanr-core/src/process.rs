use std::io;

use tracing::trace;

/// Process-group and child-process primitives used by the controller.
pub trait ProcessControl: Send + Sync {
    /// Make the calling process the leader of its own process group.
    fn become_group_leader(&self) -> io::Result<()>;

    /// Deliver `signal` to every member of process group `pgid`.
    ///
    /// `pgid` must be strictly positive.
    fn kill_group(&self, pgid: i32, signal: i32) -> io::Result<()>;

    /// Harvest exited children without blocking. Returns how many were
    /// collected.
    fn reap_children(&self) -> usize;
}

/// [`ProcessControl`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        impl ProcessControl for SystemProcess {
            fn become_group_leader(&self) -> io::Result<()> {
                let rc = unsafe { libc::setpgid(0, 0) };
                if rc == 0 {
                    Ok(())
                } else {
                    Err(io::Error::last_os_error())
                }
            }

            fn kill_group(&self, pgid: i32, signal: i32) -> io::Result<()> {
                if pgid <= 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("refusing to signal process group {pgid}"),
                    ));
                }
                let rc = unsafe { libc::killpg(pgid, signal) };
                if rc == 0 {
                    Ok(())
                } else {
                    Err(io::Error::last_os_error())
                }
            }

            fn reap_children(&self) -> usize {
                let mut reaped = 0;
                loop {
                    let mut status = 0;
                    let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
                    if pid <= 0 {
                        break;
                    }
                    trace!(target: "scanr.core", pid, status, "child reaped");
                    reaped += 1;
                }
                reaped
            }
        }
    } else {
        impl ProcessControl for SystemProcess {
            fn become_group_leader(&self) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Unsupported, "process groups require unix"))
            }

            fn kill_group(&self, _pgid: i32, _signal: i32) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Unsupported, "process groups require unix"))
            }

            fn reap_children(&self) -> usize {
                trace!(target: "scanr.core", "child reaping unsupported");
                0
            }
        }
    }
}
