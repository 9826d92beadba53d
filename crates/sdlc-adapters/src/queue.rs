use std::cmp::Reverse;
use std::collections::BinaryHeap;

use parking_lot::Mutex;

/// A due-time-ordered delay queue: the re-enqueue-with-delay mechanism
/// spec.md §9 prefers over a dedicated long-lived task per session, for
/// both the deployment poll and the coordinator wait states. Generic over
/// the job payload so the supervisor can share one implementation across
/// the deploy/verify/repair/sdlc queues (spec.md §2 "shared infrastructure
/// ... queue adapter").
pub struct DelayQueue<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

struct Entry<T>(u64, u64, T);

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}
impl<T> Eq for Entry<T> {}
impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0, self.1).cmp(&(other.0, other.1))
    }
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self { inner: Mutex::new(Inner { heap: BinaryHeap::new(), next_seq: 0 }) }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `item` to become due at `due_ms`. Items due at the same
    /// timestamp pop in insertion order (stable on the monotonic sequence
    /// number, never on `T` itself).
    pub fn push_delayed(&self, item: T, due_ms: u64) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(Entry(due_ms, seq, item)));
    }

    pub fn push_now(&self, item: T) {
        self.push_delayed(item, 0);
    }

    /// Pops every item whose due time is `<= now_ms`, earliest first.
    pub fn pop_due(&self, now_ms: u64) -> Vec<T> {
        let mut inner = self.inner.lock();
        let mut due = Vec::new();
        while let Some(Reverse(Entry(when, _, _))) = inner.heap.peek() {
            if *when > now_ms {
                break;
            }
            let Reverse(Entry(_, _, item)) = inner.heap.pop().expect("peeked");
            due.push(item);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_only_due_items_in_due_order() {
        let queue = DelayQueue::new();
        queue.push_delayed("late", 200);
        queue.push_delayed("early", 100);
        queue.push_delayed("too-late", 300);
        assert_eq!(queue.pop_due(150), vec!["early"]);
        assert_eq!(queue.pop_due(250), vec!["late"]);
        assert!(queue.pop_due(250).is_empty());
    }

    #[test]
    fn same_due_time_pops_in_insertion_order() {
        let queue = DelayQueue::new();
        queue.push_delayed("a", 100);
        queue.push_delayed("b", 100);
        queue.push_delayed("c", 100);
        assert_eq!(queue.pop_due(100), vec!["a", "b", "c"]);
    }

    #[test]
    fn len_reflects_pending_items() {
        let queue = DelayQueue::new();
        assert!(queue.is_empty());
        queue.push_now("x");
        assert_eq!(queue.len(), 1);
        queue.pop_due(0);
        assert!(queue.is_empty());
    }
}
