// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docupress.

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all Docupress operations.
///
/// The first three variants are caller-facing signals: the service layer
/// must be able to tell a missing job and a busy job apart from a genuine
/// delivery failure.
#[derive(Debug, Error)]
pub enum DocupressError {
    // -- Dispatch signaling --
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("job {0} is already being transmitted")]
    AlreadyPrinting(JobId),

    #[error("no jobs are ready for dispatch")]
    NothingReady,

    #[error("job {0} already exists in the store")]
    DuplicateJob(JobId),

    #[error("job {0} has no delivery target set")]
    TargetUnset(JobId),

    // -- Delivery errors --
    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("printer login rejected: {0}")]
    LoginRejected(String),

    #[error("no part files found for artifact {0}")]
    MissingArtifact(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocupressError>;
