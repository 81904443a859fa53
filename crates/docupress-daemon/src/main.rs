// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docupress daemon entry point.  Restores the job table from disk, starts
// the queue worker, and runs until Ctrl-C.

mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use docupress_core::config::AppConfig;
use docupress_dispatch::{DeliveryExecutor, FtpTransport, JobStore, QueueWorker, RetryPolicy};

use services::data_dir::data_dir;
use services::job_service::JobService;

const CONFIG_FILE: &str = "config.json";

fn load_config(dir: &Path) -> AppConfig {
    let path = dir.join(CONFIG_FILE);
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                AppConfig::default()
            }
        },
        Err(_) => {
            let config = AppConfig::default();
            persist_config(dir, &config);
            config
        }
    }
}

fn persist_config(dir: &Path, config: &AppConfig) {
    let path = dir.join(CONFIG_FILE);
    match serde_json::to_string_pretty(config) {
        Ok(raw) => {
            if let Err(e) = std::fs::write(&path, raw) {
                error!(path = %path.display(), error = %e, "failed to write config");
            }
        }
        Err(e) => error!(error = %e, "failed to serialize config"),
    }
}

/// Relative store paths resolve against the data directory.
fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Docupress daemon starting");

    let dir = data_dir();
    let config = load_config(&dir);
    info!(data_dir = %dir.display(), "configuration loaded");

    let store = Arc::new(JobStore::open(
        resolve(&dir, &config.jobs_file),
        RetryPolicy {
            max_retry: config.max_retry,
        },
    ));
    let transport = Arc::new(FtpTransport {
        port: config.ftp_port,
        connect_timeout: Duration::from_secs(config.connect_timeout_secs),
    });
    let executor = DeliveryExecutor::new(Arc::clone(&store), transport);
    let service = JobService::new(Arc::clone(&store), executor.clone());
    info!(jobs = service.jobs().len(), "job table restored");

    let worker = QueueWorker::new(
        Arc::clone(&store),
        executor,
        Duration::from_secs(config.worker_idle_secs),
    );
    let shutdown = worker.shutdown_handle();
    let handle = worker.spawn();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
    shutdown.notify_one();
    if let Err(e) = handle.await {
        error!(error = %e, "queue worker task panicked");
    }
    info!("Docupress daemon stopped");
}
