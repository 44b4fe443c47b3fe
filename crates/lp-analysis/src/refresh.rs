//! Cancellable refresh: a new pass supersedes the one in flight.
//!
//! Passes only read chain state and fill idempotent caches, so aborting one
//! midway leaves nothing half-written.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;
use tracing::debug;

/// Aborts the spawned pass when its caller stops waiting for it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug, Default)]
pub struct Refresher {
    in_flight: Mutex<Option<AbortHandle>>,
}

impl Refresher {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `pass`, aborting any pass started earlier.
    ///
    /// Returns `None` if this pass was itself superseded before finishing.
    /// Dropping the returned future aborts the pass.
    pub async fn run<F, T>(&self, pass: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(pass);
        let _guard = AbortOnDrop(handle.abort_handle());
        if let Some(previous) = self.slot().replace(handle.abort_handle()) {
            debug!("superseding in-flight refresh");
            previous.abort();
        }

        match handle.await {
            Ok(output) => Some(output),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                debug!(error = %e, "refresh task failed");
                None
            }
        }
    }

    /// Abort the pass in flight, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }
}
