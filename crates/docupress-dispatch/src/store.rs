// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Durable job record store — the single source of truth for job state.
//
// The whole table is held in memory and serialized to a flat JSON file after
// every mutation, using a write-temp-then-atomic-rename pattern so a crash
// mid-write never corrupts the on-disk copy.  The store and the continuous
// dispatch queue share one mutex: job state and queue membership can only
// change together, and network I/O never happens under the lock.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use docupress_core::error::{DocupressError, Result};
use docupress_core::types::{DeliveryTarget, DispatchMode, Job, JobId, JobStatus};

use crate::queue::DispatchQueue;
use crate::retry::{FailureAction, RetryPolicy};

/// Result of one delivery attempt, as reported by the executor.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// All parts transferred; `summary` becomes the job detail.
    Delivered { summary: String },
    /// The attempt failed; `detail` becomes the job detail.
    Failed { detail: String },
}

struct Inner {
    /// Display order: newest job first.
    jobs: Vec<Job>,
    queue: DispatchQueue,
}

/// Durable, in-memory job table plus the continuous dispatch queue,
/// guarded by a single mutex.
pub struct JobStore {
    inner: Mutex<Inner>,
    path: PathBuf,
    policy: RetryPolicy,
    /// Signalled whenever the queue gains work, so the worker can skip
    /// its idle interval.
    wake: Notify,
}

impl JobStore {
    /// Open the store, loading the job table from `path`.
    ///
    /// A missing or unreadable file yields an empty store rather than a
    /// startup failure.  Any job found in `Printing` is reverted to `Ready`
    /// — a transfer interrupted by process death is assumed incomplete and
    /// must be retried, never assumed printed.  `retry_count` is preserved.
    pub fn open(path: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        let path = path.into();
        let jobs = load_jobs(&path);
        Self {
            inner: Mutex::new(Inner {
                jobs,
                queue: DispatchQueue::new(),
            }),
            path,
            policy,
            wake: Notify::new(),
        }
    }

    /// Insert a new job at the front of the display order and persist.
    ///
    /// Fails with `DuplicateJob` if the id already exists.
    pub fn insert(&self, job: Job) -> Result<()> {
        let mut inner = self.lock();
        if inner.jobs.iter().any(|j| j.id == job.id) {
            return Err(DocupressError::DuplicateJob(job.id));
        }
        info!(job_id = %job.id, parts = job.part_count, "job registered");
        inner.jobs.insert(0, job);
        self.persist_locked(&inner);
        Ok(())
    }

    /// Return a copy of a single job.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.lock().jobs.iter().find(|j| j.id == id).cloned()
    }

    /// Return a snapshot of all jobs in display order, safe to read without
    /// holding the lock.
    pub fn list(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    /// Apply a field-level update to one job under exclusive access, persist,
    /// and return the updated copy.
    pub fn mutate(&self, id: JobId, f: impl FnOnce(&mut Job)) -> Result<Job> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(DocupressError::JobNotFound(id))?;
        f(job);
        let updated = job.clone();
        self.persist_locked(&inner);
        Ok(updated)
    }

    /// Serialize the full table to durable storage.
    ///
    /// A failure leaves the prior on-disk snapshot intact.
    pub fn persist(&self) -> Result<()> {
        let inner = self.lock();
        write_snapshot(&self.path, &inner.jobs)
    }

    // -- Dispatch-request handling --------------------------------------

    /// Reset a job for an explicit new dispatch request: conflict check,
    /// retry counter back to zero, delivery parameters stored.
    ///
    /// Fails with `AlreadyPrinting` if a delivery attempt is in flight.
    pub fn prepare_dispatch(&self, id: JobId, target: &DeliveryTarget) -> Result<Job> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(DocupressError::JobNotFound(id))?;
        if job.status == JobStatus::Printing {
            return Err(DocupressError::AlreadyPrinting(id));
        }
        job.retry_count = 0;
        job.status = JobStatus::Ready;
        job.target = Some(target.clone());
        let updated = job.clone();
        self.persist_locked(&inner);
        Ok(updated)
    }

    /// Enqueue every `Ready` job that is not already queued for continuous
    /// dispatch, storing `target` on each and resetting its retry counter.
    ///
    /// Returns the number enqueued, or `NothingReady` if none qualify.
    /// Wakes the queue worker.
    pub fn enqueue_ready(&self, target: &DeliveryTarget) -> Result<usize> {
        let mut inner = self.lock();
        let Inner { jobs, queue } = &mut *inner;
        let mut count = 0;
        for job in jobs.iter_mut() {
            // a Ready job still sitting in the queue from an earlier request
            // must not be enqueued twice, or have its parameters rewritten
            if job.status == JobStatus::Ready && !queue.contains(job.id) {
                job.retry_count = 0;
                job.target = Some(target.clone());
                queue.push_back(job.id);
                count += 1;
            }
        }
        if count == 0 {
            return Err(DocupressError::NothingReady);
        }
        self.persist_locked(&inner);
        info!(
            count,
            printer = %target.printer_addr,
            ring = target.ring_number,
            "jobs enqueued for continuous dispatch"
        );
        self.wake.notify_one();
        Ok(count)
    }

    /// Pop the head of the continuous dispatch queue.
    pub fn pop_queued(&self) -> Option<JobId> {
        self.lock().queue.pop_front()
    }

    pub fn queued_count(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_queued(&self, id: JobId) -> bool {
        self.lock().queue.contains(id)
    }

    /// Test hook: enqueue an id without the `Ready` scan.
    #[cfg(test)]
    pub(crate) fn enqueue_direct(&self, id: JobId) {
        self.lock().queue.push_back(id);
        self.wake.notify_one();
    }

    /// Wait until the queue gains work or `idle` elapses, whichever is first.
    pub async fn wait_for_work(&self, idle: Duration) {
        let _ = tokio::time::timeout(idle, self.wake.notified()).await;
    }

    // -- Attempt state machine -------------------------------------------

    /// Atomically claim a job for a delivery attempt: flip its status to
    /// `Printing`, stamp `start_time`, persist, and return a snapshot.
    ///
    /// The check and the flip happen under one lock acquisition, so two
    /// racing dispatch paths cannot both claim the same job — the loser
    /// gets `AlreadyPrinting`.
    pub fn begin_attempt(&self, id: JobId) -> Result<Job> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(DocupressError::JobNotFound(id))?;
        if job.status == JobStatus::Printing {
            return Err(DocupressError::AlreadyPrinting(id));
        }
        job.status = JobStatus::Printing;
        job.start_time = Some(Utc::now());
        let snapshot = job.clone();
        self.persist_locked(&inner);
        Ok(snapshot)
    }

    /// Record the outcome of a delivery attempt and apply the retry policy.
    ///
    /// Success: `Printed`, `end_time` stamped, summary recorded.
    /// Failure: `end_time` stamped, `retry_count` incremented, detail
    /// recorded; then either reinserted at the queue head and flipped back
    /// to `Ready` (continuous, retries remaining) or marked `Error`.
    pub fn complete_attempt(
        &self,
        id: JobId,
        outcome: AttemptOutcome,
        mode: DispatchMode,
    ) -> Result<Job> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(DocupressError::JobNotFound(id))?;
        job.end_time = Some(Utc::now());

        let mut requeue = false;
        match outcome {
            AttemptOutcome::Delivered { summary } => {
                job.status = JobStatus::Printed;
                job.detail = summary;
                info!(job_id = %id, "delivery finished");
            }
            AttemptOutcome::Failed { detail } => {
                job.retry_count += 1;
                job.detail = detail;
                match self.policy.on_failure(mode, job.retry_count) {
                    FailureAction::Requeue => {
                        job.status = JobStatus::Ready;
                        requeue = true;
                        warn!(
                            job_id = %id,
                            attempt = job.retry_count,
                            max = self.policy.max_retry,
                            "delivery failed, reinserting at queue head for retry"
                        );
                    }
                    FailureAction::Fail => {
                        job.status = JobStatus::Error;
                        error!(
                            job_id = %id,
                            attempts = job.retry_count,
                            "delivery failed terminally"
                        );
                    }
                }
            }
        }

        let updated = job.clone();
        if requeue {
            inner.queue.push_front(id);
        }
        self.persist_locked(&inner);
        if requeue {
            self.wake.notify_one();
        }
        Ok(updated)
    }

    // -- Internals ---------------------------------------------------------

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("job store lock poisoned")
    }

    /// Persist while holding the lock. A serialize failure is logged and
    /// leaves the prior on-disk snapshot intact; the triggering operation
    /// is never aborted.
    fn persist_locked(&self, inner: &Inner) {
        if let Err(e) = write_snapshot(&self.path, &inner.jobs) {
            error!(path = %self.path.display(), error = %e, "failed to persist job table");
        } else {
            debug!(count = inner.jobs.len(), "job table persisted");
        }
    }
}

/// Write the job table to `path` via a temp file and an atomic rename.
fn write_snapshot(path: &Path, jobs: &[Job]) -> Result<()> {
    let json = serde_json::to_string_pretty(jobs)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load the job table from `path`, applying the crash-recovery rule.
fn load_jobs(path: &Path) -> Vec<Job> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no job table on disk, starting empty");
            return Vec::new();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "could not read job table, starting empty");
            return Vec::new();
        }
    };

    let mut jobs: Vec<Job> = match serde_json::from_str(&data) {
        Ok(jobs) => jobs,
        Err(e) => {
            error!(path = %path.display(), error = %e, "job table unparseable, starting empty");
            return Vec::new();
        }
    };

    for job in jobs.iter_mut() {
        if job.status == JobStatus::Printing {
            job.status = JobStatus::Ready;
            warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                "job was mid-transfer at shutdown, reverted to Ready"
            );
        }
    }

    info!(count = jobs.len(), path = %path.display(), "job table loaded");
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_target() -> DeliveryTarget {
        DeliveryTarget {
            printer_addr: "192.168.1.50".into(),
            user: "anonymous".into(),
            password: String::new(),
            ring_number: 1,
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> JobStore {
        JobStore::open(dir.path().join("jobs_data.json"), RetryPolicy::default())
    }

    fn test_job() -> Job {
        Job::new(3, PathBuf::from("/out/Merged_Job_1_FULL.pdf"))
    }

    #[test]
    fn insert_then_get_returns_ready_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");

        let got = store.get(job.id).expect("found");
        assert_eq!(got.status, JobStatus::Ready);
        assert_eq!(got.retry_count, 0);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("first insert");
        assert!(matches!(
            store.insert(job),
            Err(DocupressError::DuplicateJob(_))
        ));
    }

    #[test]
    fn list_puts_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let first = test_job();
        let second = test_job();
        store.insert(first.clone()).expect("insert");
        store.insert(second.clone()).expect("insert");

        let jobs = store.list();
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }

    #[test]
    fn reload_preserves_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs_data.json");
        let job = test_job();
        {
            let store = JobStore::open(&path, RetryPolicy::default());
            store.insert(job.clone()).expect("insert");
        }
        let reopened = JobStore::open(&path, RetryPolicy::default());
        let got = reopened.get(job.id).expect("survived reload");
        assert_eq!(got.part_count, 3);
    }

    #[test]
    fn crash_recovery_reverts_printing_to_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs_data.json");
        let job = test_job();
        {
            let store = JobStore::open(&path, RetryPolicy::default());
            store.insert(job.clone()).expect("insert");
            store
                .mutate(job.id, |j| j.retry_count = 2)
                .expect("set retries");
            store.begin_attempt(job.id).expect("claim");
            // process "crashes" here with the job still Printing
        }
        let reopened = JobStore::open(&path, RetryPolicy::default());
        let got = reopened.get(job.id).expect("found");
        assert_eq!(got.status, JobStatus::Ready);
        assert_eq!(got.retry_count, 2);
    }

    #[test]
    fn corrupt_file_yields_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobs_data.json");
        std::fs::write(&path, "{ not json").expect("write garbage");
        let store = JobStore::open(&path, RetryPolicy::default());
        assert!(store.list().is_empty());
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(store.list().is_empty());
    }

    #[test]
    fn enqueue_ready_sets_target_and_resets_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");
        store
            .mutate(job.id, |j| j.retry_count = 2)
            .expect("set retries");

        let count = store.enqueue_ready(&test_target()).expect("enqueue");
        assert_eq!(count, 1);

        let got = store.get(job.id).expect("found");
        assert_eq!(got.retry_count, 0);
        assert_eq!(got.target, Some(test_target()));
        assert!(store.is_queued(job.id));
    }

    #[test]
    fn consecutive_enqueues_never_double_queue_a_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.insert(test_job()).expect("insert");

        assert_eq!(store.enqueue_ready(&test_target()).expect("first"), 1);
        // still Ready and still queued — the second request has nothing new
        assert!(matches!(
            store.enqueue_ready(&test_target()),
            Err(DocupressError::NothingReady)
        ));
        assert_eq!(store.queued_count(), 1);
    }

    #[test]
    fn enqueue_with_nothing_ready_signals_nothing_to_do() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(matches!(
            store.enqueue_ready(&test_target()),
            Err(DocupressError::NothingReady)
        ));
    }

    #[test]
    fn begin_attempt_rejects_a_printing_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");

        store.begin_attempt(job.id).expect("first claim");
        assert!(matches!(
            store.begin_attempt(job.id),
            Err(DocupressError::AlreadyPrinting(_))
        ));
    }

    #[test]
    fn begin_attempt_on_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(matches!(
            store.begin_attempt(JobId::new()),
            Err(DocupressError::JobNotFound(_))
        ));
    }

    #[test]
    fn prepare_dispatch_rejects_a_printing_job_without_mutating() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");
        store
            .mutate(job.id, |j| j.retry_count = 2)
            .expect("set retries");
        store.begin_attempt(job.id).expect("claim");

        assert!(matches!(
            store.prepare_dispatch(job.id, &test_target()),
            Err(DocupressError::AlreadyPrinting(_))
        ));
        let got = store.get(job.id).expect("found");
        assert_eq!(got.status, JobStatus::Printing);
        assert_eq!(got.retry_count, 2);
    }

    #[test]
    fn successful_attempt_ends_printed_with_times_stamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");

        store.begin_attempt(job.id).expect("claim");
        let done = store
            .complete_attempt(
                job.id,
                AttemptOutcome::Delivered {
                    summary: "delivered 3 file(s)".into(),
                },
                DispatchMode::Manual,
            )
            .expect("complete");

        assert_eq!(done.status, JobStatus::Printed);
        assert!(done.end_time.expect("end") >= done.start_time.expect("start"));
        assert_eq!(done.detail, "delivered 3 file(s)");
    }

    #[test]
    fn continuous_failure_requeues_at_the_head() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let failing = test_job();
        let waiting = test_job();
        store.insert(failing.clone()).expect("insert");
        store.insert(waiting.clone()).expect("insert");
        store.enqueue_ready(&test_target()).expect("enqueue");

        // worker pops the head and the attempt fails
        let popped = store.pop_queued().expect("head");
        store.begin_attempt(popped).expect("claim");
        let after = store
            .complete_attempt(
                popped,
                AttemptOutcome::Failed {
                    detail: "connection error: refused".into(),
                },
                DispatchMode::Continuous,
            )
            .expect("complete");

        assert_eq!(after.status, JobStatus::Ready);
        assert_eq!(after.retry_count, 1);
        // the retried job jumps ahead of the one enqueued after it
        assert_eq!(store.pop_queued(), Some(popped));
    }

    #[test]
    fn manual_failure_is_terminal_and_never_requeued() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");

        store.begin_attempt(job.id).expect("claim");
        let after = store
            .complete_attempt(
                job.id,
                AttemptOutcome::Failed {
                    detail: "connection error: refused".into(),
                },
                DispatchMode::Manual,
            )
            .expect("complete");

        assert_eq!(after.status, JobStatus::Error);
        assert_eq!(after.retry_count, 1);
        assert_eq!(store.queued_count(), 0);
    }

    #[test]
    fn continuous_failure_at_retry_cap_is_terminal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let job = test_job();
        store.insert(job.clone()).expect("insert");
        store
            .mutate(job.id, |j| j.retry_count = 2)
            .expect("set retries");

        store.begin_attempt(job.id).expect("claim");
        let after = store
            .complete_attempt(
                job.id,
                AttemptOutcome::Failed {
                    detail: "connection error: refused".into(),
                },
                DispatchMode::Continuous,
            )
            .expect("complete");

        assert_eq!(after.status, JobStatus::Error);
        assert_eq!(after.retry_count, 3);
        assert_eq!(store.queued_count(), 0);
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = std::sync::Arc::new(store_in(&dir));
        store.insert(test_job()).expect("insert");

        let waiter = std::sync::Arc::clone(&store);
        let handle = tokio::spawn(async move {
            waiter.wait_for_work(Duration::from_secs(30)).await;
        });
        // give the waiter a moment to park on the notify
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.enqueue_ready(&test_target()).expect("enqueue");

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("woken before the idle interval")
            .expect("join");
    }
}
