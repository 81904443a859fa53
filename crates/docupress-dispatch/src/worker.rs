// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue worker — the consumer side of continuous dispatch.
//
// A single long-lived task drains the dispatch queue, handing each popped
// job to the delivery executor on its own spawned task so the loop is never
// blocked by a transfer.  An empty queue parks on the store's wake signal
// with a fallback idle tick, rather than spinning on a fixed sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use docupress_core::types::{DispatchMode, JobStatus};

use crate::executor::{DeliveryExecutor, Transport};
use crate::store::JobStore;

/// Long-lived background loop that drains the continuous dispatch queue.
pub struct QueueWorker<T: Transport> {
    store: Arc<JobStore>,
    executor: DeliveryExecutor<T>,
    idle: Duration,
    shutdown: Arc<Notify>,
}

impl<T: Transport> QueueWorker<T> {
    pub fn new(store: Arc<JobStore>, executor: DeliveryExecutor<T>, idle: Duration) -> Self {
        Self {
            store,
            executor,
            idle,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to request a graceful stop; the loop exits the next time
    /// it goes idle.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Start the worker loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!("print queue worker started");
        loop {
            if let Some(id) = self.store.pop_queued() {
                let Some(job) = self.store.get(id) else {
                    error!(job_id = %id, "queued job missing from store, skipping");
                    continue;
                };
                if job.status == JobStatus::Printing {
                    warn!(job_id = %id, "job already marked Printing, skipping");
                    continue;
                }
                let Some(target) = job.target else {
                    warn!(job_id = %id, "queued job has no delivery target, skipping");
                    continue;
                };

                debug!(job_id = %id, "worker pulled job from the queue");
                let executor = self.executor.clone();
                tokio::spawn(async move {
                    // claim conflicts are expected when a manual dispatch won
                    // the race; the delivery itself records its own outcome
                    if let Err(e) = executor
                        .dispatch(id, target, DispatchMode::Continuous)
                        .await
                    {
                        warn!(job_id = %id, error = %e, "continuous dispatch not started");
                    }
                });
                continue;
            }

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("print queue worker stopping");
                    break;
                }
                _ = self.store.wait_for_work(self.idle) => {}
            }
        }
    }
}
