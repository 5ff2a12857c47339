use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex, OnceLock, PoisonError,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use crate::error::ExecError;

static PROCESS_SLOT: OnceLock<ExecutionSlot> = OnceLock::new();

/// Ownership token for "one external command is running".
///
/// Clones refer to the same slot. Acquisition never waits: a second
/// caller gets [`ExecError::Reentrant`] while the slot is held.
#[derive(Clone, Default)]
pub struct ExecutionSlot {
    inner: Arc<SlotInner>,
}

#[derive(Default)]
struct SlotInner {
    busy: AtomicBool,
    /// Pid of the running child, `0` when none was spawned yet.
    child: AtomicU32,
    workdir: Mutex<Option<PathBuf>>,
}

impl ExecutionSlot {
    /// A fresh, unoccupied slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot shared by the whole process.
    pub fn process() -> Self {
        PROCESS_SLOT.get_or_init(ExecutionSlot::new).clone()
    }

    /// Occupy the slot; released when the returned guard drops.
    pub fn try_acquire(&self) -> Result<SlotGuard, ExecError> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExecError::Reentrant)?;
        Ok(SlotGuard { slot: self.clone() })
    }

    pub fn is_occupied(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Pid of the command currently holding the slot.
    pub fn child_pid(&self) -> Option<u32> {
        match self.inner.child.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Working directory of the command currently holding the slot, if it
    /// was started with a directory change.
    pub fn workdir(&self) -> Option<PathBuf> {
        let workdir = self
            .inner
            .workdir
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        workdir.clone()
    }
}

/// Occupancy of an [`ExecutionSlot`].
pub struct SlotGuard {
    slot: ExecutionSlot,
}

impl SlotGuard {
    pub(crate) fn set_child(&self, pid: u32) {
        self.slot.inner.child.store(pid, Ordering::Release);
    }

    pub(crate) fn set_workdir(&self, dir: PathBuf) {
        let mut workdir = self
            .slot
            .inner
            .workdir
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *workdir = Some(dir);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let inner = &self.slot.inner;
        inner.child.store(0, Ordering::Release);
        inner
            .workdir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        inner.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_fast() {
        let slot = ExecutionSlot::new();
        let guard = slot.try_acquire().unwrap();

        assert!(slot.is_occupied());
        assert!(matches!(slot.try_acquire(), Err(ExecError::Reentrant)));
        drop(guard);
    }

    #[test]
    fn drop_releases_and_clears() {
        let slot = ExecutionSlot::new();
        {
            let guard = slot.try_acquire().unwrap();
            guard.set_child(1234);
            guard.set_workdir(PathBuf::from("/usr/bin"));
            assert_eq!(slot.child_pid(), Some(1234));
            assert_eq!(slot.workdir(), Some(PathBuf::from("/usr/bin")));
        }

        assert!(!slot.is_occupied());
        assert!(slot.child_pid().is_none());
        assert!(slot.workdir().is_none());
        assert!(slot.try_acquire().is_ok());
    }

    #[test]
    fn clones_share_occupancy() {
        let slot = ExecutionSlot::new();
        let other = slot.clone();
        let _guard = slot.try_acquire().unwrap();

        assert!(other.is_occupied());
        assert!(ExecutionSlot::new().try_acquire().is_ok());
    }

    #[test]
    fn process_slot_is_shared() {
        let a = ExecutionSlot::process();
        let b = ExecutionSlot::process();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}
