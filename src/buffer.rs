//! Sample ring buffer: fixed pre-allocated circular history.
//! Overwrites the oldest entry when full. Never grows.
//! Not synchronized on its own; the engine keeps it behind its one lock.

use std::num::NonZeroUsize;

use crate::sample::Sample;

/// Fixed-size FIFO of samples. Pre-allocated, never resized.
pub struct SampleBuffer<T = Sample> {
    slots: Box<[Option<T>]>,
    /// Next write slot.
    head: usize,
    /// Oldest unread slot.
    tail: usize,
    count: usize,
}

impl<T> SampleBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
            .take(capacity.get())
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Write one entry. When full, the oldest entry is dropped first and
    /// returned to the caller.
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        let evicted = if self.count == capacity {
            let old = self.slots[self.tail].take();
            self.tail = (self.tail + 1) % capacity;
            old
        } else {
            self.count += 1;
            None
        };
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % capacity;
        evicted
    }

    /// Remove and return the oldest entry, or `None` when empty.
    #[inline]
    pub fn pop_oldest(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.tail].take();
        self.tail = (self.tail + 1) % self.capacity();
        self.count -= 1;
        item
    }

    /// Pop the oldest entry only if `accept` approves it.
    pub fn pop_oldest_if(&mut self, accept: impl FnOnce(&T) -> bool) -> Option<T> {
        if self.peek_oldest().map_or(false, accept) {
            self.pop_oldest()
        } else {
            None
        }
    }

    pub fn peek_oldest(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.tail].as_ref()
    }

    /// Discard everything. Positions return to slot zero.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    /// `(count, capacity)` snapshot.
    pub fn occupancy(&self) -> (usize, usize) {
        (self.count, self.capacity())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate unread entries oldest-first without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.count).filter_map(move |i| self.slots[(self.tail + i) % capacity].as_ref())
    }
}
