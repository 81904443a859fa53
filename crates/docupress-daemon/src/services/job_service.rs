// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator-facing job operations: register a finished artifact, read a
// job snapshot, request a manual dispatch, request continuous dispatch.
//
// Dispatch requests return immediately — the transfer runs on its own
// spawned task and records its outcome on the job.  Conflict
// (`AlreadyPrinting`), `JobNotFound`, and `NothingReady` are distinct error
// variants so the caller can answer precisely.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use docupress_core::error::Result;
use docupress_core::types::{DeliveryTarget, DispatchMode, Job, JobId};
use docupress_dispatch::executor::Transport;
use docupress_dispatch::{DeliveryExecutor, JobStore};

/// Shared entry point for everything the outside world asks of the
/// dispatcher.  Cheaply cloneable; safe to call from any task.
pub struct JobService<T: Transport> {
    store: Arc<JobStore>,
    executor: DeliveryExecutor<T>,
}

impl<T: Transport> Clone for JobService<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            executor: self.executor.clone(),
        }
    }
}

impl<T: Transport> JobService<T> {
    pub fn new(store: Arc<JobStore>, executor: DeliveryExecutor<T>) -> Self {
        Self { store, executor }
    }

    /// Register a new job for an artifact the producer has finished merging
    /// and splitting.  The job starts `Ready` with a fresh id.
    pub fn register_job(&self, part_count: u32, artifact_path: PathBuf) -> Result<Job> {
        let job = Job::new(part_count, artifact_path);
        self.store.insert(job.clone())?;
        Ok(job)
    }

    /// Snapshot of all jobs in display order (newest first).
    pub fn jobs(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Request a single explicit delivery for one job — no automatic retry.
    ///
    /// The retry counter is reset and the target stored under the lock; the
    /// transfer itself runs in the background.  Returns the prepared job, or
    /// `JobNotFound` / `AlreadyPrinting` without mutating anything.
    pub fn manual_dispatch(&self, id: JobId, target: DeliveryTarget) -> Result<Job> {
        let prepared = self.store.prepare_dispatch(id, &target)?;
        info!(
            job_id = %id,
            printer = %target.printer_addr,
            ring = target.ring_number,
            "manual dispatch requested"
        );

        let executor = self.executor.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.dispatch(id, target, DispatchMode::Manual).await {
                warn!(job_id = %id, error = %e, "manual dispatch not started");
            }
        });
        Ok(prepared)
    }

    /// Enqueue every `Ready` job for unattended delivery and let the queue
    /// worker drain them.  Returns the count enqueued, or `NothingReady`.
    pub fn continuous_dispatch(&self, target: &DeliveryTarget) -> Result<usize> {
        self.store.enqueue_ready(target)
    }
}
