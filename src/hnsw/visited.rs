//! Generation-stamped visited set for graph traversal.

use std::cell::RefCell;

use super::NodeId;

thread_local! {
    static VISITED_POOL: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// Runs `f` with this thread's cleared visited set, sized for `capacity` nodes.
pub(crate) fn with_visited<R>(capacity: usize, f: impl FnOnce(&mut VisitedSet) -> R) -> R {
    VISITED_POOL.with(|cell| match cell.try_borrow_mut() {
        Ok(mut visited) => {
            visited.ensure_capacity(capacity);
            visited.clear();
            f(&mut visited)
        }
        // Re-entrant use from inside `f`: fall back to a private set.
        Err(_) => f(&mut VisitedSet::new(capacity)),
    })
}

/// Marks are stamped with the current generation, so `clear` is O(1) except
/// once every `u16::MAX - 1` calls when the array is zeroed.
#[derive(Debug)]
pub(crate) struct VisitedSet {
    data: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        VisitedSet {
            data: vec![0; capacity],
            generation: 1,
        }
    }

    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.data.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    pub fn ensure_capacity(&mut self, capacity: usize) {
        if capacity > self.data.len() {
            self.data.resize(capacity, 0);
        }
    }

    /// Returns `true` if `id` was not yet visited.
    #[inline]
    pub fn insert(&mut self, id: NodeId) -> bool {
        if self.data[id] == self.generation {
            false
        } else {
            self.data[id] = self.generation;
            true
        }
    }
}
