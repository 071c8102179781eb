//! Fixed-capacity circular buffer
//!
//! Storage is allocated once at construction and never grows. Two admission
//! policies share the same bookkeeping: [`Ring::push_back`] rejects when full
//! (transmit queue), [`Ring::push_overwrite`] replaces the oldest entry
//! (dedup window).

/// Bounded FIFO ring of `T`
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    /// Creates a ring holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ring { slots, head: 0, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn tail(&self) -> usize {
        (self.head + self.len) % self.capacity()
    }

    /// Appends `item`, handing it back unchanged if the ring is full
    pub fn push_back(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = self.tail();
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Appends `item`, evicting and returning the oldest entry if the ring is full
    pub fn push_overwrite(&mut self, item: T) -> Option<T> {
        if self.is_full() {
            let evicted = self.slots[self.head].replace(item);
            self.head = (self.head + 1) % self.capacity();
            return evicted;
        }
        let tail = self.tail();
        self.slots[tail] = Some(item);
        self.len += 1;
        None
    }

    /// Oldest entry
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Removes and returns the oldest entry
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    /// Iterates from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| {
            let idx = (self.head + i) % self.capacity();
            self.slots[idx].as_ref()
        })
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}
