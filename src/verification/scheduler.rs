//! Background scheduler for move-in verification
//!
//! One long-lived task owned by whoever holds the scheduler. `start` and `stop` are
//! idempotent; a running flag keeps at most one loop alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::VerificationService;

struct RunningTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct VerificationScheduler {
    service: Arc<VerificationService>,
    interval: Duration,
    running: AtomicBool,
    task: Mutex<Option<RunningTask>>,
}

impl VerificationScheduler {
    pub fn new(service: Arc<VerificationService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            running: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the scan loop. Returns false if it was already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if task.is_some() {
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let service = self.service.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            tracing::info!(interval_secs = period.as_secs(), "Verification scheduler started");

            let mut ticker = tokio::time::interval(period);
            // A slow tick pushes the next one back instead of bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match service.run_tick().await {
                            Ok(summary) => {
                                if summary.reminders_sent > 0 || !summary.finalized.is_empty() {
                                    tracing::info!(
                                        reminders = summary.reminders_sent,
                                        finalized = summary.finalized.len(),
                                        skipped = summary.skipped,
                                        "Verification tick completed"
                                    );
                                } else {
                                    tracing::debug!(skipped = summary.skipped, "Verification tick idle");
                                }
                            }
                            Err(e) => tracing::error!("Verification tick failed: {:#}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Verification scheduler stopped");
        });

        *task = Some(RunningTask { shutdown, handle });
        self.running.store(true, Ordering::SeqCst);
        true
    }

    /// Stop the loop and wait for the in-flight tick to finish. Returns false if it was not running.
    pub async fn stop(&self) -> bool {
        let running = {
            let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            task.take()
        };

        let Some(RunningTask { shutdown, handle }) = running else {
            return false;
        };
        self.running.store(false, Ordering::SeqCst);

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            tracing::error!("Verification scheduler task ended abnormally: {}", e);
        }

        true
    }
}
