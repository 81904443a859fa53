// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where the artifact producer writes merged PDFs and parts.
    pub artifact_dir: PathBuf,
    /// Durable job-table file (JSON array, written via temp + rename).
    pub jobs_file: PathBuf,
    /// Maximum delivery attempts under continuous dispatch.
    pub max_retry: u32,
    /// FTP control port on the printer (default 21).
    pub ftp_port: u16,
    /// Bound on FTP connect time, in seconds.
    pub connect_timeout_secs: u64,
    /// Worker fallback idle interval when the queue is empty, in seconds.
    pub worker_idle_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("output_jobs"),
            jobs_file: PathBuf::from("jobs_data.json"),
            max_retry: 3,
            ftp_port: 21,
            connect_timeout_secs: 10,
            worker_idle_secs: 3,
        }
    }
}
