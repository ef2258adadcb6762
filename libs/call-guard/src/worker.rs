/// Start-once latch for lazily spawned background workers
///
/// Decorators that need a background task (the debounce poller, the throttle
/// refiller) start it from the first call that finds the latch `Idle`. What
/// happens after the task ends is decided by the latch's [`RestartPolicy`].
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No worker running, the next call may start one
    Idle,
    Running,
    /// Worker ended and will not be started again
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Running → Idle on finish: a later burst gets a fresh worker
    Rearm,
    /// Running → Stopped on finish: the instance never starts another worker
    Never,
}

#[derive(Debug)]
pub(crate) struct WorkerLatch {
    name: &'static str,
    state: WorkerState,
    policy: RestartPolicy,
}

impl WorkerLatch {
    pub(crate) fn new(name: &'static str, policy: RestartPolicy) -> Self {
        Self {
            name,
            state: WorkerState::Idle,
            policy,
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    /// Returns true if the caller won the right to spawn the worker.
    pub(crate) fn try_start(&mut self) -> bool {
        if self.state != WorkerState::Idle {
            return false;
        }

        debug!(worker = self.name, "background worker: Idle → Running");
        self.state = WorkerState::Running;
        true
    }

    pub(crate) fn finish(&mut self) {
        let next = match self.policy {
            RestartPolicy::Rearm => WorkerState::Idle,
            RestartPolicy::Never => WorkerState::Stopped,
        };

        debug!(worker = self.name, ?next, "background worker finished");
        self.state = next;
    }
}
