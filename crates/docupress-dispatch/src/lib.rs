// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docupress Dispatch — durable job record store, FIFO continuous dispatch
// queue, FTP delivery executor, and the background queue worker.  This crate
// bridges between the core domain types defined in `docupress-core` and the
// actual printer delivery infrastructure.

pub mod executor;
pub mod ftp_client;
pub mod queue;
pub mod retry;
pub mod store;
pub mod worker;

pub use executor::{DeliveryExecutor, FtpTransport, Transport};
pub use retry::RetryPolicy;
pub use store::{AttemptOutcome, JobStore};
pub use worker::QueueWorker;
