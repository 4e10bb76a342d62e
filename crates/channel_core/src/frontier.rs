use std::collections::{HashSet, VecDeque};

use crate::Handle;

/// Working state of one breadth-first spider run.
///
/// Invariant: `visited` and `queued` never share a handle. A handle is queued
/// at most once per run and moves to `visited` when it is popped.
#[derive(Debug, Clone, Default)]
pub struct TraversalFrontier {
    visited: HashSet<Handle>,
    queued: VecDeque<Handle>,
    queued_index: HashSet<Handle>,
    current_depth: usize,
}

impl TraversalFrontier {
    pub fn new(seeds: impl IntoIterator<Item = Handle>) -> Self {
        let mut frontier = Self::default();
        for seed in seeds {
            frontier.enqueue(seed);
        }
        frontier
    }

    /// Returns `false` if the handle was already visited or queued.
    pub fn enqueue(&mut self, handle: Handle) -> bool {
        if self.visited.contains(&handle) || self.queued_index.contains(&handle) {
            return false;
        }
        self.queued_index.insert(handle.clone());
        self.queued.push_back(handle);
        true
    }

    /// Pops the oldest queued handle and marks it visited.
    pub fn pop_next(&mut self) -> Option<Handle> {
        let next = self.queued.pop_front()?;
        self.queued_index.remove(&next);
        self.visited.insert(next.clone());
        Some(next)
    }

    pub fn is_visited(&self, handle: &Handle) -> bool {
        self.visited.contains(handle)
    }

    pub fn is_queued(&self, handle: &Handle) -> bool {
        self.queued_index.contains(handle)
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn current_depth(&self) -> usize {
        self.current_depth
    }

    pub fn advance_depth(&mut self) {
        self.current_depth += 1;
    }

    /// Queued handles in the order they would be visited.
    pub fn pending(&self) -> Vec<Handle> {
        self.queued.iter().cloned().collect()
    }

    pub fn is_disjoint(&self) -> bool {
        self.queued_index.is_disjoint(&self.visited)
            && self.queued.len() == self.queued_index.len()
    }
}
