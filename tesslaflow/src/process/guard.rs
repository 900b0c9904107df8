//! The single slot for the running pipeline subprocess.

use crate::core::StageKind;
use crate::errors::PipelineError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug)]
struct ActiveProcess {
    id: u64,
    stage: StageKind,
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
}

/// Ensures at most one pipeline subprocess runs at a time.
///
/// A stage acquires a [`ProcessTicket`] before spawning; a second acquire
/// while the slot is taken is rejected, never queued. Dropping the ticket
/// frees the slot.
#[derive(Debug, Default)]
pub struct ProcessGuard {
    slot: Mutex<Option<ActiveProcess>>,
    next_id: AtomicU64,
}

impl ProcessGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `stage`.
    pub fn acquire(self: &Arc<Self>, stage: StageKind) -> Result<ProcessTicket, PipelineError> {
        let mut slot = self.slot.lock();
        if let Some(ref active) = *slot {
            return Err(PipelineError::busy(stage, active.stage));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (kill_tx, kill_rx) = oneshot::channel();
        *slot = Some(ActiveProcess {
            id,
            stage,
            pid: None,
            kill: Some(kill_tx),
        });
        debug!(%stage, ticket = id, "Process slot acquired");

        Ok(ProcessTicket {
            guard: Arc::clone(self),
            id,
            stage,
            kill_rx: Some(kill_rx),
        })
    }

    /// Asks the running subprocess to die.
    ///
    /// Returns `false` when nothing is running or a kill was already sent.
    /// The slot stays taken until the process has actually exited.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        let Some(active) = slot.as_mut() else {
            return false;
        };
        let Some(kill) = active.kill.take() else {
            return false;
        };
        info!(stage = %active.stage, pid = ?active.pid, "Cancelling running process");
        kill.send(()).is_ok()
    }

    /// The stage whose subprocess holds the slot.
    #[must_use]
    pub fn active_stage(&self) -> Option<StageKind> {
        self.slot.lock().as_ref().map(|active| active.stage)
    }

    /// OS process id of the running subprocess, once spawned.
    #[must_use]
    pub fn active_pid(&self) -> Option<u32> {
        self.slot.lock().as_ref().and_then(|active| active.pid)
    }

    /// Whether a subprocess holds the slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn release(&self, id: u64) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
            debug!(ticket = id, "Process slot released");
        }
    }

    fn record_pid(&self, id: u64, pid: u32) {
        if let Some(active) = self.slot.lock().as_mut().filter(|active| active.id == id) {
            active.pid = Some(pid);
        }
    }
}

/// Proof of holding the [`ProcessGuard`] slot.
#[derive(Debug)]
pub struct ProcessTicket {
    guard: Arc<ProcessGuard>,
    id: u64,
    stage: StageKind,
    kill_rx: Option<oneshot::Receiver<()>>,
}

impl ProcessTicket {
    /// The stage the slot was claimed for.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Records the OS process id after spawning.
    pub fn set_pid(&self, pid: u32) {
        self.guard.record_pid(self.id, pid);
    }

    /// Takes the receiver that fires on [`ProcessGuard::cancel`].
    pub(crate) fn take_kill_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        self.kill_rx.take()
    }
}

impl Drop for ProcessTicket {
    fn drop(&mut self) {
        self.guard.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let guard = Arc::new(ProcessGuard::new());
        assert!(!guard.is_busy());

        let ticket = guard.acquire(StageKind::CompileC).unwrap();
        assert!(guard.is_busy());
        assert_eq!(guard.active_stage(), Some(StageKind::CompileC));
        assert_eq!(ticket.stage(), StageKind::CompileC);

        drop(ticket);
        assert!(!guard.is_busy());
        assert_eq!(guard.active_stage(), None);
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = Arc::new(ProcessGuard::new());
        let _ticket = guard.acquire(StageKind::RunBinary).unwrap();

        let err = guard.acquire(StageKind::CompileC).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Busy {
                requested: StageKind::CompileC,
                active: StageKind::RunBinary
            }
        ));
    }

    #[test]
    fn test_cancel_without_process() {
        let guard = ProcessGuard::new();
        assert!(!guard.cancel());
    }

    #[test]
    fn test_cancel_signals_once_and_keeps_slot() {
        let guard = Arc::new(ProcessGuard::new());
        let mut ticket = guard.acquire(StageKind::RunInstrumentedBinary).unwrap();
        let mut kill_rx = ticket.take_kill_signal().unwrap();

        assert!(guard.cancel());
        assert!(!guard.cancel());
        assert!(kill_rx.try_recv().is_ok());
        assert!(guard.is_busy());

        drop(ticket);
        assert!(!guard.is_busy());
    }

    #[test]
    fn test_cancel_after_receiver_dropped() {
        let guard = Arc::new(ProcessGuard::new());
        let mut ticket = guard.acquire(StageKind::RunBinary).unwrap();
        drop(ticket.take_kill_signal());

        assert!(!guard.cancel());
    }

    #[test]
    fn test_pid_is_recorded() {
        let guard = Arc::new(ProcessGuard::new());
        let ticket = guard.acquire(StageKind::RunBinary).unwrap();
        assert_eq!(guard.active_pid(), None);

        ticket.set_pid(4242);
        assert_eq!(guard.active_pid(), Some(4242));
    }

    #[test]
    fn test_stale_release_does_not_clear_new_holder() {
        let guard = Arc::new(ProcessGuard::new());
        let first = guard.acquire(StageKind::CompileC).unwrap();
        let stale_id = first.id;
        drop(first);

        let _second = guard.acquire(StageKind::Assemble).unwrap();
        guard.release(stale_id);

        assert_eq!(guard.active_stage(), Some(StageKind::Assemble));
    }
}
