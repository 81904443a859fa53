// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for failed deliveries.
//
// Continuous-mode failures with attempts remaining go back to the front of
// the dispatch queue; manual failures and exhausted jobs are terminal.
// All failure kinds are retried identically — only the recorded detail
// differs.

use docupress_core::error::DocupressError;
use docupress_core::types::DispatchMode;

/// Retry configuration for continuous dispatch.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum delivery attempts before a job is marked `Error`.
    pub max_retry: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retry: 3 }
    }
}

/// What to do with a job after a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Reinsert at the queue head and flip back to `Ready`.
    Requeue,
    /// Terminal — mark the job `Error`.
    Fail,
}

impl RetryPolicy {
    /// Decide the fate of a job whose attempt just failed.
    ///
    /// `retry_count` is the count *after* the failed attempt was recorded.
    pub fn on_failure(&self, mode: DispatchMode, retry_count: u32) -> FailureAction {
        match mode {
            DispatchMode::Continuous if retry_count < self.max_retry => FailureAction::Requeue,
            _ => FailureAction::Fail,
        }
    }
}

/// Coarse failure taxonomy used to prefix the recorded attempt detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport unreachable, timed out, or credentials rejected.
    Connection,
    /// Expected part files are absent.
    MissingArtifact,
    /// Anything else that went wrong during transfer.
    Unexpected,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connection => "connection error",
            Self::MissingArtifact => "missing artifact",
            Self::Unexpected => "unexpected error",
        }
    }
}

/// Classify a delivery error for the recorded detail string.
pub fn classify_failure(err: &DocupressError) -> FailureKind {
    match err {
        DocupressError::Transfer(_) | DocupressError::LoginRejected(_) | DocupressError::Io(_) => {
            FailureKind::Connection
        }
        DocupressError::MissingArtifact(_) => FailureKind::MissingArtifact,
        _ => FailureKind::Unexpected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_failure_with_attempts_left_requeues() {
        let policy = RetryPolicy { max_retry: 3 };
        assert_eq!(
            policy.on_failure(DispatchMode::Continuous, 1),
            FailureAction::Requeue
        );
        assert_eq!(
            policy.on_failure(DispatchMode::Continuous, 2),
            FailureAction::Requeue
        );
    }

    #[test]
    fn continuous_failure_at_cap_is_terminal() {
        let policy = RetryPolicy { max_retry: 3 };
        assert_eq!(
            policy.on_failure(DispatchMode::Continuous, 3),
            FailureAction::Fail
        );
    }

    #[test]
    fn manual_failure_never_requeues() {
        let policy = RetryPolicy { max_retry: 3 };
        assert_eq!(policy.on_failure(DispatchMode::Manual, 1), FailureAction::Fail);
    }

    #[test]
    fn timeout_is_a_connection_failure() {
        let err = DocupressError::Transfer("FTP connection to 10.0.0.9:21 timed out".into());
        assert_eq!(classify_failure(&err), FailureKind::Connection);
    }

    #[test]
    fn rejected_login_is_a_connection_failure() {
        let err = DocupressError::LoginRejected("530 Not logged in".into());
        assert_eq!(classify_failure(&err), FailureKind::Connection);
    }

    #[test]
    fn absent_parts_are_a_missing_artifact_failure() {
        let err = DocupressError::MissingArtifact("Merged_Job_1".into());
        assert_eq!(classify_failure(&err), FailureKind::MissingArtifact);
    }
}
