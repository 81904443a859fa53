// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Docupress print dispatcher.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Eligible for dispatch (initial state, also reached after a
    /// retryable continuous failure).
    Ready,
    /// A delivery attempt is in flight.
    Printing,
    /// All parts transferred (terminal).
    Printed,
    /// Delivery failed with no retries remaining (terminal).
    Error,
}

/// How a delivery was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One explicit request for one job; no automatic retry.
    Manual,
    /// Worker-driven backlog drain with automatic retry.
    Continuous,
}

/// Delivery-target parameters supplied by a dispatch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    /// Printer host or IP for the FTP session.
    pub printer_addr: String,
    /// FTP login user.
    pub user: String,
    /// FTP login password (empty permitted for anonymous-style access).
    pub password: String,
    /// Ring number embedded in delivered filenames; routes finishing on
    /// the printer side.
    pub ring_number: u32,
}

/// A complete print job — one artifact-delivery unit tracked from `Ready`
/// through to `Printed` or `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Number of part files composing the job.
    pub part_count: u32,
    /// Failed delivery attempts so far; reset only by a new dispatch request.
    pub retry_count: u32,
    /// Delivery parameters; `None` until a dispatch is requested.
    pub target: Option<DeliveryTarget>,
    /// Start of the most recent delivery attempt.
    pub start_time: Option<DateTime<Utc>>,
    /// End of the most recent delivery attempt.
    pub end_time: Option<DateTime<Utc>>,
    /// Free-text outcome of the most recent attempt.
    pub detail: String,
    /// The full merged artifact (`<stem>_FULL.pdf`); part files live next
    /// to it and are only ever read for delivery enumeration.
    pub artifact_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(part_count: u32, artifact_path: PathBuf) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Ready,
            part_count,
            retry_count: 0,
            target: None,
            start_time: None,
            end_time: None,
            detail: "not dispatched yet".into(),
            artifact_path,
            created_at: Utc::now(),
        }
    }

    /// The filename stem shared by this job's part files.
    ///
    /// The artifact producer writes `<stem>_FULL.pdf` plus
    /// `<stem>_P001.pdf`, `<stem>_P002.pdf`, … into the same directory.
    pub fn part_stem(&self) -> String {
        let stem = self
            .artifact_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        stem.strip_suffix("_FULL").unwrap_or(stem).to_string()
    }

    /// Directory containing the artifact and its part files.
    pub fn artifact_dir(&self) -> &Path {
        self.artifact_path.parent().unwrap_or(Path::new("."))
    }
}
