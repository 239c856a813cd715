use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Collapses bursts of calls into one: the scheduled action only runs once
/// `wait` has elapsed without a newer call replacing it.
///
/// Must be used from within a tokio runtime; each call spawns a timer task
/// and aborts the previous one.
pub struct Debouncer {
    wait: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action` after the wait period, cancelling any previously
    /// scheduled action that has not fired yet.
    pub fn call<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let wait = self.wait;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            action();
        });

        let mut pending = self.pending.lock().unwrap();
        if let Some(prev) = pending.replace(handle) {
            prev.abort();
        }
    }

    /// Drop any scheduled action without running it.
    pub fn cancel(&self) {
        if let Some(prev) = self.pending.lock().unwrap().take() {
            prev.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
