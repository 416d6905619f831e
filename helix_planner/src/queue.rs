//! Bounded segment queue.
//!
//! Fixed-capacity ring storing segments by value: the arena is allocated
//! once at creation and a segment's lifetime is its slot's lifetime, so
//! the real-time consumer never touches the heap. Single producer (the
//! add-segment path), single consumer (the cycle driver); the look-ahead
//! optimiser additionally walks indices from the tail backwards.

use crate::segment::Segment;

/// Returned by [`SegmentQueue::put`] when the ring is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

/// Fixed-capacity FIFO of motion segments. All operations are O(1).
#[derive(Debug)]
pub struct SegmentQueue {
    slots: Box<[Segment]>,
    head: usize,
    len: usize,
}

impl SegmentQueue {
    /// Allocate the arena. This is the only allocation the queue ever
    /// performs.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![Segment::default(); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear without freeing the arena.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Append a segment at the tail.
    pub fn put(&mut self, tc: Segment) -> Result<(), QueueFull> {
        if self.len == self.capacity() {
            return Err(QueueFull);
        }
        let slot = self.phys(self.len);
        self.slots[slot] = tc;
        self.len += 1;
        Ok(())
    }

    /// Drop the head element. Returns false on an empty queue.
    pub fn pop_front(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        true
    }

    /// Drop the most recently appended element. Returns false on an empty
    /// queue.
    pub fn pop_back(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        self.len -= 1;
        true
    }

    /// Element `i` positions from the head.
    #[inline]
    pub fn item(&self, i: usize) -> Option<&Segment> {
        if i < self.len {
            Some(&self.slots[self.phys(i)])
        } else {
            None
        }
    }

    /// Mutable element `i` positions from the head.
    #[inline]
    pub fn item_mut(&mut self, i: usize) -> Option<&mut Segment> {
        if i < self.len {
            let slot = self.phys(i);
            Some(&mut self.slots[slot])
        } else {
            None
        }
    }

    /// Most recently appended element.
    #[inline]
    pub fn last(&self) -> Option<&Segment> {
        self.len.checked_sub(1).and_then(|i| self.item(i))
    }

    /// Mutable most recently appended element.
    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut Segment> {
        self.len.checked_sub(1).and_then(move |i| self.item_mut(i))
    }

    /// Two distinct elements mutably at once (queue positions `i` and `j`).
    pub fn pair_mut(&mut self, i: usize, j: usize) -> Option<(&mut Segment, &mut Segment)> {
        if i == j || i >= self.len || j >= self.len {
            return None;
        }
        let (pi, pj) = (self.phys(i), self.phys(j));
        if pi < pj {
            let (left, right) = self.slots.split_at_mut(pj);
            Some((&mut left[pi], &mut right[0]))
        } else {
            let (left, right) = self.slots.split_at_mut(pi);
            let (a, b) = (&mut right[0], &mut left[pj]);
            Some((a, b))
        }
    }

    #[inline]
    fn phys(&self, i: usize) -> usize {
        (self.head + i) % self.capacity()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(id: i32) -> Segment {
        Segment {
            id,
            ..Default::default()
        }
    }

    #[test]
    fn put_and_pop_fifo_order() {
        let mut q = SegmentQueue::with_capacity(4);
        for id in 0..3 {
            q.put(tc(id)).unwrap();
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.item(0).unwrap().id, 0);
        assert_eq!(q.item(2).unwrap().id, 2);
        assert_eq!(q.last().unwrap().id, 2);

        assert!(q.pop_front());
        assert_eq!(q.item(0).unwrap().id, 1);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn full_queue_rejects() {
        let mut q = SegmentQueue::with_capacity(2);
        q.put(tc(0)).unwrap();
        q.put(tc(1)).unwrap();
        assert_eq!(q.put(tc(2)), Err(QueueFull));
        // A consumed slot frees capacity again.
        q.pop_front();
        assert!(q.put(tc(2)).is_ok());
    }

    #[test]
    fn pop_back_drops_tail() {
        let mut q = SegmentQueue::with_capacity(4);
        q.put(tc(0)).unwrap();
        q.put(tc(1)).unwrap();
        assert!(q.pop_back());
        assert_eq!(q.last().unwrap().id, 0);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn wraparound_preserves_order() {
        let mut q = SegmentQueue::with_capacity(3);
        for id in 0..3 {
            q.put(tc(id)).unwrap();
        }
        q.pop_front();
        q.pop_front();
        q.put(tc(3)).unwrap();
        q.put(tc(4)).unwrap();
        let ids: Vec<i32> = (0..q.len()).map(|i| q.item(i).unwrap().id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn pair_mut_across_wrap() {
        let mut q = SegmentQueue::with_capacity(3);
        for id in 0..3 {
            q.put(tc(id)).unwrap();
        }
        q.pop_front();
        q.pop_front();
        q.put(tc(3)).unwrap(); // physically wraps

        let (a, b) = q.pair_mut(0, 1).unwrap();
        assert_eq!(a.id, 2);
        assert_eq!(b.id, 3);
        a.progress = 1.0;
        b.progress = 2.0;
        assert_eq!(q.item(0).unwrap().progress, 1.0);
        assert_eq!(q.item(1).unwrap().progress, 2.0);
    }

    #[test]
    fn pair_mut_rejects_degenerate() {
        let mut q = SegmentQueue::with_capacity(3);
        q.put(tc(0)).unwrap();
        assert!(q.pair_mut(0, 0).is_none());
        assert!(q.pair_mut(0, 1).is_none());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut q = SegmentQueue::with_capacity(3);
        q.put(tc(0)).unwrap();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.capacity(), 3);
    }
}
