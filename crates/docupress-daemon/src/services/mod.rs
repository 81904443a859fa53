// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — the boundary external collaborators (artifact producer,
// presentation layer) call into.  Each operation maps onto the dispatch
// crate and signals not-found / conflict / nothing-ready distinctly.

pub mod data_dir;
pub mod job_service;
