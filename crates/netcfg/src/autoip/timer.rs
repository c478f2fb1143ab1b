//! Timer handles owned by a device.
//!
//! The timer subsystem itself is external; all the device model needs
//! is an opaque handle it can cancel synchronously. Cancellation on
//! drop guarantees a timer never outlives its owning device.

use std::time::Duration;

use tokio::task::JoinHandle;

/// An armed one-shot timer.
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Arm a timer that runs `f` after `delay`.
    pub fn arm<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        Self { task }
    }

    /// Cancel the timer. A timer that already fired is a no-op.
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
