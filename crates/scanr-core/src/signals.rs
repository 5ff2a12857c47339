//! Signal bookkeeping for the scan process.
//!
//! Listener tasks only record what arrived. The controller observes the
//! record from its own loop and does the actual work.
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicI32, AtomicU64, Ordering},
};

use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, trace};

#[derive(Default)]
struct SignalState {
    /// Last graceful-stop signal, `0` when none arrived.
    termination: AtomicI32,
    terminated: Notify,
    /// Child exits not yet harvested.
    children: AtomicU64,
    child_exited: Notify,
}

impl SignalState {
    fn terminate(&self, signo: i32) {
        self.termination.store(signo, Ordering::Release);
        self.terminated.notify_waiters();
    }

    fn child_exit(&self) {
        self.children.fetch_add(1, Ordering::AcqRel);
        self.child_exited.notify_waiters();
    }
}

/// Graceful-stop and child-exit record shared with the listener tasks.
#[derive(Clone, Default)]
pub struct SignalMonitor {
    state: Arc<SignalState>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SignalMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start listening for `SIGTERM`, `SIGINT`, `SIGQUIT`, `SIGUSR1`
    /// (graceful stop) and `SIGCHLD` (child exit).
    ///
    /// Must be called from within a tokio runtime. Installing twice is a
    /// no-op.
    pub fn install(&self) -> std::io::Result<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            return Ok(());
        }
        tasks.extend(listeners(&self.state)?);
        debug!(target: "scanr.core", listeners = tasks.len(), "signal handlers installed");
        Ok(())
    }

    /// Note a graceful-stop signal.
    pub fn record_termination(&self, signo: i32) {
        trace!(target: "scanr.core", signo, "termination signal");
        self.state.terminate(signo);
    }

    /// Note one child exit.
    pub fn record_child_exit(&self) {
        self.state.child_exit();
    }

    /// Graceful-stop signal received so far, if any.
    pub fn termination(&self) -> Option<i32> {
        match self.state.termination.load(Ordering::Acquire) {
            0 => None,
            signo => Some(signo),
        }
    }

    /// Resolve with the signal number once a graceful stop was requested.
    pub async fn terminated(&self) -> i32 {
        loop {
            let notified = self.state.terminated.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(signo) = self.termination() {
                return signo;
            }
            notified.await;
        }
    }

    /// Resolve with the number of child exits recorded since the last call,
    /// resetting the count.
    pub async fn child_exits(&self) -> u64 {
        loop {
            let notified = self.state.child_exited.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let pending = self.state.children.swap(0, Ordering::AcqRel);
            if pending > 0 {
                return pending;
            }
            notified.await;
        }
    }
}

impl Drop for SignalMonitor {
    fn drop(&mut self) {
        // Last handle stops the listeners.
        if Arc::strong_count(&self.tasks) == 1 {
            let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            for task in tasks.iter() {
                task.abort();
            }
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn listeners(state: &Arc<SignalState>) -> std::io::Result<Vec<JoinHandle<()>>> {
            use tokio::signal::unix::{SignalKind, signal};

            let graceful = [
                (SignalKind::terminate(), libc::SIGTERM),
                (SignalKind::interrupt(), libc::SIGINT),
                (SignalKind::quit(), libc::SIGQUIT),
                (SignalKind::user_defined1(), libc::SIGUSR1),
            ];

            let mut tasks = Vec::with_capacity(graceful.len() + 1);
            for (kind, signo) in graceful {
                let mut stream = signal(kind)?;
                let state = Arc::clone(state);
                tasks.push(tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        state.terminate(signo);
                    }
                }));
            }

            let mut chld = signal(SignalKind::child())?;
            let state = Arc::clone(state);
            tasks.push(tokio::spawn(async move {
                while chld.recv().await.is_some() {
                    state.child_exit();
                }
            }));
            Ok(tasks)
        }
    } else {
        fn listeners(_state: &Arc<SignalState>) -> std::io::Result<Vec<JoinHandle<()>>> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "signal handling requires a unix platform",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn termination_wakes_waiter() {
        let monitor = SignalMonitor::new();
        assert_eq!(monitor.termination(), None);

        let waiter = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.terminated().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        monitor.record_termination(libc::SIGUSR1);

        assert_eq!(waiter.await.unwrap(), libc::SIGUSR1);
        assert_eq!(monitor.termination(), Some(libc::SIGUSR1));
    }

    #[tokio::test]
    async fn recorded_termination_resolves_immediately() {
        let monitor = SignalMonitor::new();
        monitor.record_termination(libc::SIGTERM);
        assert_eq!(monitor.terminated().await, libc::SIGTERM);
    }

    #[tokio::test]
    async fn child_exits_are_counted_and_reset() {
        let monitor = SignalMonitor::new();
        monitor.record_child_exit();
        monitor.record_child_exit();

        assert_eq!(monitor.child_exits().await, 2);

        let pending = tokio::time::timeout(Duration::from_millis(20), monitor.child_exits()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn delivered_signal_is_recorded() {
        let monitor = SignalMonitor::new();
        monitor.install().unwrap();
        monitor.install().unwrap();

        unsafe {
            libc::kill(libc::getpid(), libc::SIGUSR1);
        }

        let signo = tokio::time::timeout(Duration::from_secs(2), monitor.terminated())
            .await
            .unwrap();
        assert_eq!(signo, libc::SIGUSR1);
    }
}
