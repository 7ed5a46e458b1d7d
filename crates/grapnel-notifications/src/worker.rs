//! Notification Worker
//!
//! Background loop that drains the notification queue on a fixed interval.
//! Stops after the current tick once shutdown is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

use crate::services::dispatcher::{DispatchReport, Dispatcher};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Delay between queue passes.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Worker that periodically calls [`Dispatcher::process_queue`].
#[derive(Clone)]
pub struct NotificationWorker {
    dispatcher: Dispatcher,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl NotificationWorker {
    pub fn new(dispatcher: Dispatcher, config: WorkerConfig) -> Self {
        Self {
            dispatcher,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            target: "notification_worker",
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting notification worker"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_shutdown() {
                        break;
                    }
                    self.tick().await;
                }
                () = self.wake.notified() => {}
            }
            if self.is_shutdown() {
                break;
            }
        }

        info!(target: "notification_worker", "Notification worker stopped");
    }

    /// One queue pass. Errors are logged; the loop keeps going.
    pub async fn tick(&self) -> Option<DispatchReport> {
        match self.dispatcher.process_queue().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(target: "notification_worker", error = %e, "Queue pass failed");
                None
            }
        }
    }

    /// Request graceful shutdown. An in-flight pass finishes first.
    pub fn shutdown(&self) {
        info!(target: "notification_worker", "Shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
        self.wake.notify_one();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Run the worker on a new task. The returned handle completes once the
    /// loop exits.
    pub fn spawn(&self) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move { worker.run().await })
    }
}
