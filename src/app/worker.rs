// LogTrail - app/worker.rs
//
// Long-lived background thread with a cooperative cancel flag.
//
// The loop body owns a `CancelToken`; it sleeps between cycles in slices of
// CANCEL_CHECK_INTERVAL_MS so a stop request is observed promptly no matter
// how long the refresh interval is. Stopping never interrupts a cycle that is
// already running.

use crate::util::constants::CANCEL_CHECK_INTERVAL_MS;
use crate::util::error::ConfigurationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shared handle to a worker's cancel flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Ask the worker owning this flag to stop after its current cycle.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Sleep for `total`, waking every CANCEL_CHECK_INTERVAL_MS to check the
    /// flag. Returns `true` if cancellation was requested.
    pub fn sleep(&self, total: Duration) -> bool {
        let slice = Duration::from_millis(CANCEL_CHECK_INTERVAL_MS);
        let deadline = Instant::now() + total;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }
}

/// Handle to a running background thread.
#[derive(Debug)]
pub struct Worker {
    name: &'static str,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a named thread running `body` with a fresh cancel token.
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self, ConfigurationError>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let token = CancelToken {
            flag: Arc::clone(&cancel),
        };
        let handle = std::thread::Builder::new()
            .name(format!("logtrail-{name}"))
            .spawn(move || body(token))
            .map_err(|e| ConfigurationError::WorkerSpawn {
                worker: name,
                source: e,
            })?;

        tracing::debug!(worker = name, "Worker started");
        Ok(Self {
            name,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A handle that can stop this worker from another thread.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            flag: Arc::clone(&self.cancel),
        }
    }

    /// Ask the thread to stop after its current cycle.
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request a stop and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(worker = self.name, "Worker thread panicked");
            } else {
                tracing::debug!(worker = self.name, "Worker stopped");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
