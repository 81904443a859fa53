// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Continuous dispatch queue — an ordered sequence of job ids awaiting
// unattended delivery.  Strictly FIFO for first-time enqueues; retried jobs
// are reinserted at the front so they jump ahead of fresh work.
//
// The queue references jobs by id and never owns the records; it lives
// inside the `JobStore` mutex so queue membership and job state can only
// change together.

use std::collections::VecDeque;

use docupress_core::types::JobId;

/// FIFO queue of job ids with head-reinsertion for retries.
///
/// Invariant: no id is present more than once at any time.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    ids: VecDeque<JobId>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an id at the tail. Returns `false` (and leaves the queue
    /// unchanged) if the id is already queued.
    pub fn push_back(&mut self, id: JobId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_back(id);
        true
    }

    /// Reinsert an id at the head, giving it priority over everything
    /// enqueued after it. Returns `false` if the id is already queued.
    pub fn push_front(&mut self, id: JobId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_front(id);
        true
    }

    /// Remove and return the head of the queue.
    pub fn pop_front(&mut self) -> Option<JobId> {
        self.ids.pop_front()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_for_first_time_enqueues() {
        let mut q = DispatchQueue::new();
        let (a, b, c) = (JobId::new(), JobId::new(), JobId::new());
        assert!(q.push_back(a));
        assert!(q.push_back(b));
        assert!(q.push_back(c));
        assert_eq!(q.pop_front(), Some(a));
        assert_eq!(q.pop_front(), Some(b));
        assert_eq!(q.pop_front(), Some(c));
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut q = DispatchQueue::new();
        let a = JobId::new();
        assert!(q.push_back(a));
        assert!(!q.push_back(a));
        assert!(!q.push_front(a));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn retry_reinsertion_jumps_ahead_of_fresh_work() {
        let mut q = DispatchQueue::new();
        let (retried, fresh) = (JobId::new(), JobId::new());
        assert!(q.push_back(fresh));
        assert!(q.push_front(retried));
        assert_eq!(q.pop_front(), Some(retried));
        assert_eq!(q.pop_front(), Some(fresh));
    }
}
