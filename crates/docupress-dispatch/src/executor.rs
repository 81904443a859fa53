// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delivery executor — performs the per-job transfer protocol against the
// printer, independent of whether it was triggered manually or by the
// queue worker.
//
// The store lock is held only to claim the job and to record the outcome;
// part enumeration and all network I/O happen between those two points.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use docupress_core::error::{DocupressError, Result};
use docupress_core::types::{DeliveryTarget, DispatchMode, Job, JobId};

use crate::ftp_client::{FTP_PORT, FtpSession};
use crate::retry::classify_failure;
use crate::store::{AttemptOutcome, JobStore};

/// Marker embedded in every delivered filename. Konica Minolta bizhub
/// devices treat it as the stapling trigger, so it must be reproduced
/// bit-exact.
pub const STAPLE_TAG: &str = "_STAPLE";

/// One part file scheduled for upload.
#[derive(Debug, Clone)]
pub struct PartUpload {
    pub local_path: PathBuf,
    pub remote_name: String,
}

/// Seam between the executor and the wire protocol, so delivery logic is
/// testable without a printer.
pub trait Transport: Send + Sync + 'static {
    /// Deliver every upload in order within one session. Returns the number
    /// of files stored. Any failure fails the whole attempt — there is no
    /// partial success.
    fn deliver(
        &self,
        target: &DeliveryTarget,
        uploads: &[PartUpload],
    ) -> impl Future<Output = Result<usize>> + Send;
}

/// Production transport: one FTP session per attempt, one binary STOR per
/// part, best-effort QUIT regardless of outcome.
#[derive(Debug, Clone)]
pub struct FtpTransport {
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for FtpTransport {
    fn default() -> Self {
        Self {
            port: FTP_PORT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Transport for FtpTransport {
    fn deliver(
        &self,
        target: &DeliveryTarget,
        uploads: &[PartUpload],
    ) -> impl Future<Output = Result<usize>> + Send {
        let target = target.clone();
        let uploads = uploads.to_vec();
        let port = self.port;
        let connect_timeout = self.connect_timeout;

        async move {
            let mut session =
                FtpSession::connect(&target.printer_addr, port, connect_timeout).await?;
            let result = store_all(&mut session, &target, &uploads).await;
            session.quit().await;
            result
        }
    }
}

async fn store_all(
    session: &mut FtpSession,
    target: &DeliveryTarget,
    uploads: &[PartUpload],
) -> Result<usize> {
    session.login(&target.user, &target.password).await?;

    let mut stored = 0;
    for upload in uploads {
        let data = tokio::fs::read(&upload.local_path).await?;
        session.store(&upload.remote_name, &data).await?;
        stored += 1;
        info!(
            file = %upload.local_path.display(),
            remote = %upload.remote_name,
            "part transferred"
        );
    }
    Ok(stored)
}

/// Remote filename for one part: original stem, staple marker, ring
/// identifier, original extension.
///
/// `Merged_Job_1_P001.pdf` with ring 7 becomes
/// `Merged_Job_1_P001_STAPLE_R7.pdf`.
pub fn remote_part_name(local: &Path, ring_number: u32) -> String {
    let stem = local
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let ext = local
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("pdf");
    format!("{stem}{STAPLE_TAG}_R{ring_number}.{ext}")
}

/// Enumerate a job's part files in lexicographic order.
///
/// Parts live next to the merged artifact, named `<stem>_P###.<ext>`.
/// An empty set is a missing-artifact failure, never a silent success.
pub fn enumerate_parts(job: &Job) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}_P", job.part_stem());
    let mut parts: Vec<PathBuf> = std::fs::read_dir(job.artifact_dir())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        return Err(DocupressError::MissingArtifact(job.part_stem()));
    }
    Ok(parts)
}

/// Runs the per-job delivery protocol and records its outcome in the store.
pub struct DeliveryExecutor<T: Transport> {
    store: Arc<JobStore>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for DeliveryExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> DeliveryExecutor<T> {
    pub fn new(store: Arc<JobStore>, transport: Arc<T>) -> Self {
        Self { store, transport }
    }

    /// Run one delivery attempt for `id` and return the job's final state.
    ///
    /// Claim conflicts (`AlreadyPrinting`) and unknown ids propagate as
    /// errors so the caller can distinguish them; delivery failures are
    /// recovered locally — they are recorded on the job (with the retry
    /// policy applied) and the updated job is returned.
    pub async fn dispatch(
        &self,
        id: JobId,
        target: DeliveryTarget,
        mode: DispatchMode,
    ) -> Result<Job> {
        let claimed = self.store.begin_attempt(id)?;
        info!(
            job_id = %id,
            attempt = claimed.retry_count + 1,
            printer = %target.printer_addr,
            ring = target.ring_number,
            "delivery attempt started"
        );

        // the store lock is released here; everything below runs unlocked
        let outcome = match self.transfer(&claimed, &target).await {
            Ok(files) => AttemptOutcome::Delivered {
                summary: format!(
                    "delivered {} file(s) to {} with ring {}",
                    files, target.printer_addr, target.ring_number
                ),
            },
            Err(e) => {
                let kind = classify_failure(&e);
                error!(job_id = %id, error = %e, "delivery attempt failed");
                AttemptOutcome::Failed {
                    detail: format!("{}: {}", kind.label(), e),
                }
            }
        };

        self.store.complete_attempt(id, outcome, mode)
    }

    async fn transfer(&self, job: &Job, target: &DeliveryTarget) -> Result<usize> {
        let uploads: Vec<PartUpload> = enumerate_parts(job)?
            .into_iter()
            .map(|path| {
                let remote_name = remote_part_name(&path, target.ring_number);
                PartUpload {
                    local_path: path,
                    remote_name,
                }
            })
            .collect();
        self.transport.deliver(target, &uploads).await
    }
}
