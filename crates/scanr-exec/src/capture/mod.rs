//! Run one external command and capture its standard output.
use std::{path::PathBuf, process::Stdio, sync::Arc};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    runtime::Handle,
};
use tracing::{debug, trace, warn};

use scanr_model::keys;
use scanr_store::KvStore;

use crate::{
    args::{Arg, split_args},
    error::{ExecError, ExecResult},
    slot::{ExecutionSlot, SlotGuard},
    util::{cmd_program, containing_dir, find_in_path},
};

const CHUNK: usize = 8192;

/// Non-reentrant command executor.
///
/// While a command runs its pid is published in the shared store under
/// `internal/child/<caller pid>` so outside cleanup can find orphans.
#[derive(Clone)]
pub struct Executor {
    slot: ExecutionSlot,
    store: Arc<dyn KvStore>,
    caller_pid: u32,
}

impl Executor {
    /// Executor bound to the process-wide slot.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            slot: ExecutionSlot::process(),
            store,
            caller_pid: std::process::id(),
        }
    }

    pub fn with_slot(mut self, slot: ExecutionSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Override the pid used to scope the child-process record.
    pub fn with_caller_pid(mut self, pid: u32) -> Self {
        self.caller_pid = pid;
        self
    }

    pub fn slot(&self) -> &ExecutionSlot {
        &self.slot
    }

    /// Run `command` with `args` and return everything it wrote to stdout.
    ///
    /// With `change_dir` the command is resolved to an absolute path and
    /// started inside its own directory; the caller's working directory is
    /// never touched. Empty output is not an error.
    ///
    /// The call returns when the child closes its stdout, whether or not it
    /// has exited. Dropping the returned future kills the child.
    pub async fn execute_capture(
        &self,
        command: &str,
        args: &[Arg],
        change_dir: bool,
    ) -> ExecResult<Vec<u8>> {
        let guard = self.slot.try_acquire().inspect_err(|_| {
            warn!(target: "scanr.exec", command, "execute_capture is not reentrant")
        })?;

        let (program, workdir) = if change_dir {
            let program = resolve(command)?;
            let dir = containing_dir(&program);
            guard.set_workdir(dir.clone());
            (program, Some(dir))
        } else {
            (PathBuf::from(command), None)
        };

        let (argv, ignored) = split_args(args);
        if !ignored.is_empty() {
            warn!(target: "scanr.exec", ?ignored, "named elements in the argument list are ignored");
        }

        let mut cmd = cmd_program(&program, &argv);
        if let Some(dir) = &workdir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        trace!(target: "scanr.exec", program = %program.display(), ?argv, ?workdir, "spawn");
        let mut child = cmd.spawn().map_err(|e| {
            warn!(target: "scanr.exec", program = %program.display(), error = %e, "spawn failed");
            ExecError::Spawn(format!("{}: {e}", program.display()))
        })?;

        let pid = child.id();
        let stdout = child.stdout.take();
        if let Some(pid) = pid {
            guard.set_child(pid);
        }

        let key = keys::child_key(self.caller_pid);
        let tracked = Tracked {
            running: Some((child, guard)),
            store: Arc::clone(&self.store),
            key: key.clone(),
        };
        if let Some(pid) = pid
            && let Err(e) = self.store.set(&key, &pid.to_string()).await
        {
            warn!(target: "scanr.exec", key, error = %e, "failed to record child pid");
        }

        let output = match stdout {
            Some(stdout) => Ok(capture_stream(stdout).await),
            None => Err(ExecError::Io("child stdout was not captured".into())),
        };

        if let Some((child, guard)) = tracked.finish() {
            settle(child);
            self.release(guard, &key).await;
        }
        output
    }

    async fn release(&self, guard: SlotGuard, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(target: "scanr.exec", key, error = %e, "failed to remove child pid record");
        }
        drop(guard);
    }
}

/// A spawned child together with the slot and store record it holds.
///
/// Dropped before [`Tracked::finish`], i.e. when the caller abandons the
/// call, the child is killed and the record removed in the background.
/// The slot stays occupied until the record is gone.
struct Tracked {
    running: Option<(Child, SlotGuard)>,
    store: Arc<dyn KvStore>,
    key: String,
}

impl Tracked {
    fn finish(mut self) -> Option<(Child, SlotGuard)> {
        self.running.take()
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let Some((mut child, guard)) = self.running.take() else {
            return;
        };
        if let Err(e) = child.start_kill() {
            debug!(target: "scanr.exec", error = %e, "abandoned child already gone");
        }

        let Ok(handle) = Handle::try_current() else {
            warn!(target: "scanr.exec", key = %self.key, "no runtime left to remove child pid record");
            return;
        };
        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        handle.spawn(async move {
            if let Err(e) = store.delete(&key).await {
                warn!(target: "scanr.exec", key, error = %e, "failed to remove child pid record");
            }
            drop(guard);
            let _ = child.wait().await;
        });
    }
}

/// Collect `child` if it has exited, otherwise wait for it off the caller's path.
///
/// The capture ends with the output stream; a child may keep running after
/// closing its stdout.
fn settle(mut child: Child) {
    match child.try_wait() {
        Ok(Some(status)) => debug!(target: "scanr.exec", %status, "child exited"),
        Ok(None) => {
            debug!(target: "scanr.exec", pid = child.id(), "child outlived its output");
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => debug!(target: "scanr.exec", %status, "child exited"),
                    Err(e) => warn!(target: "scanr.exec", error = %e, "failed to reap child"),
                }
            });
        }
        Err(e) => warn!(target: "scanr.exec", error = %e, "failed to reap child"),
    }
}

fn resolve(command: &str) -> ExecResult<PathBuf> {
    let path = PathBuf::from(command);
    if path.is_absolute() {
        return Ok(path);
    }
    find_in_path(command).ok_or_else(|| {
        warn!(target: "scanr.exec", command, "not found in PATH");
        ExecError::Spawn(format!("'{command}' not found in PATH"))
    })
}

/// Drain `reader` until end-of-stream.
///
/// Interrupted reads are retried. Any other error ends the capture but
/// keeps the bytes read so far.
pub async fn capture_stream<R>(mut reader: R) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut chunk = [0u8; CHUNK];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(target: "scanr.exec", error = %e, captured = out.len(), "read from child failed");
                break;
            }
        }
    }
    out
}
