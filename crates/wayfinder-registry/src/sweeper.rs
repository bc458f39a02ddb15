//! Periodic expiry sweep
//!
//! Drives `Storage::sweep_expired` on a fixed interval so expired instances
//! disappear even when nobody queries them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::Storage;

pub struct ExpirySweeper {
    storage: Arc<dyn Storage>,
    interval: Duration,
    running: Arc<AtomicBool>,
    stopped: Arc<Notify>,
}

impl ExpirySweeper {
    pub fn new(storage: Arc<dyn Storage>, interval: Duration) -> Self {
        Self {
            storage,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(Notify::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the sweep loop; returns `None` if it is already running
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Expiry sweeper already running");
            return None;
        }

        info!(
            backend = self.storage.kind(),
            interval_ms = self.interval.as_millis() as u64,
            "Starting expiry sweeper"
        );

        let storage = self.storage.clone();
        let running = self.running.clone();
        let stopped = self.stopped.clone();
        let period = self.interval.max(Duration::from_millis(1));

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stopped.notified() => break,
                }

                match storage.sweep_expired().await {
                    Ok(0) => {}
                    Ok(evicted) => debug!(evicted, "Expiry sweep removed entries"),
                    Err(e) if e.is_transient() => {
                        warn!(error = %e, "Expiry sweep failed; retrying next tick")
                    }
                    Err(e) => warn!(error = %e, "Expiry sweep failed"),
                }
            }

            info!("Expiry sweeper stopped");
        }))
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stopped.notify_one();
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
