//! Bounded queue of claims awaiting dispatch.
//!
//! FIFO with id-level dedup: resubmitting a queued claim is a no-op, and
//! a full queue refuses new claims rather than evicting old ones (the
//! external submitter owns the retry).

use std::collections::{HashSet, VecDeque};

use attest_types::{Claim, ClaimId};

/// Bounded FIFO of pending claims.
pub struct ClaimQueue {
    queue: VecDeque<Claim>,
    queued_ids: HashSet<ClaimId>,
    capacity: usize,
}

impl ClaimQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            queued_ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Enqueue a claim. Returns `false` when the queue is full or the
    /// claim id is already queued.
    pub fn try_push(&mut self, claim: Claim) -> bool {
        if self.queue.len() >= self.capacity || self.queued_ids.contains(&claim.id) {
            return false;
        }
        self.queued_ids.insert(claim.id);
        self.queue.push_back(claim);
        true
    }

    /// Take every pending claim, oldest first.
    pub fn drain(&mut self) -> Vec<Claim> {
        self.queued_ids.clear();
        self.queue.drain(..).collect()
    }

    /// Whether a claim with this id is currently queued.
    pub fn contains(&self, id: &ClaimId) -> bool {
        self.queued_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_types::Timestamp;

    fn claim(tag: &str) -> Claim {
        Claim::new(tag, vec![], 3, 30_000, Timestamp::from_millis(0))
    }

    #[test]
    fn drains_in_fifo_order() {
        let mut queue = ClaimQueue::new(8);
        assert!(queue.try_push(claim("a")));
        assert!(queue.try_push(claim("b")));
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].statement, "a");
        assert_eq!(drained[1].statement, "b");
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_ids_are_refused_while_queued() {
        let mut queue = ClaimQueue::new(8);
        let c = claim("a");
        assert!(queue.try_push(c.clone()));
        assert!(!queue.try_push(c.clone()));
        assert_eq!(queue.len(), 1);

        // After draining, the same claim may be requeued.
        queue.drain();
        assert!(queue.try_push(c));
    }

    #[test]
    fn full_queue_refuses_new_claims() {
        let mut queue = ClaimQueue::new(2);
        assert!(queue.try_push(claim("a")));
        assert!(queue.try_push(claim("b")));
        assert!(!queue.try_push(claim("c")));
        assert_eq!(queue.len(), 2);
    }
}
