//! Min-heap keyed by a floating-point priority.
//!
//! Used by the SentencePiece merge loop. Priorities are built so that equal
//! values never occur for distinct live entries, so no secondary ordering is
//! applied. Entries may go stale after they are pushed; the heap does not know
//! or care, the caller re-validates on pop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Anything with a merge priority. Lower is popped first.
pub trait Prioritized {
    fn priority(&self) -> f64;
}

struct Entry<T>(T);

impl<T: Prioritized> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Prioritized> Eq for Entry<T> {}

impl<T: Prioritized> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Prioritized> Ord for Entry<T> {
    // Reversed so that `BinaryHeap` (a max-heap) pops the smallest priority.
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.priority().total_cmp(&self.0.priority())
    }
}

/// Binary min-heap with `O(log n)` push and pop.
pub struct MinHeap<T: Prioritized> {
    heap: BinaryHeap<Entry<T>>,
}

impl<T: Prioritized> MinHeap<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, item: T) {
        self.heap.push(Entry(item));
    }

    /// Remove and return the item with the lowest priority.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|Entry(item)| item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T: Prioritized> Default for MinHeap<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
