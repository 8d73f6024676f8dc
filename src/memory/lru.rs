//! Index-based doubly-linked recency list
//!
//! The list threads through a fixed arena of slots identified by index.
//! The head is the most recently used slot and the tail the least recently
//! used one. Every operation is O(1) except iteration.

#[derive(Clone, Copy, Debug, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

#[derive(Clone, Debug)]
pub struct RecencyList {
    links: Vec<Link>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl RecencyList {
    /// Make an empty list over `capacity` slots
    pub fn make(capacity: usize) -> Self {
        Self {
            links: vec![Link::default(); capacity],
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Make a list holding every slot, ordered `0` (head) to `capacity - 1` (tail)
    pub fn make_full(capacity: usize) -> Self {
        let mut list = Self::make(capacity);
        for slot in (0..capacity).rev() {
            list.push_front(slot);
        }
        list
    }

    pub fn capacity(&self) -> usize {
        self.links.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.links.get(slot).is_some_and(|link| link.linked)
    }

    /// Most recently used slot
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Least recently used slot
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    /// Insert a slot at the head. Slots already in the list are left alone.
    pub fn push_front(&mut self, slot: usize) {
        if slot >= self.capacity() || self.contains(slot) {
            return;
        }
        let old_head = self.head;
        self.links[slot] = Link { prev: None, next: old_head, linked: true };
        match old_head {
            Some(head) => self.links[head].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.len += 1;
    }

    /// Unlink a slot. Returns false if it wasn't in the list.
    pub fn remove(&mut self, slot: usize) -> bool {
        if !self.contains(slot) {
            return false;
        }
        let Link { prev, next, .. } = self.links[slot];
        match prev {
            Some(prev) => self.links[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.links[next].prev = prev,
            None => self.tail = prev,
        }
        self.links[slot] = Link::default();
        self.len -= 1;
        true
    }

    pub fn pop_front(&mut self) -> Option<usize> {
        let head = self.head?;
        self.remove(head);
        Some(head)
    }

    pub fn pop_back(&mut self) -> Option<usize> {
        let tail = self.tail?;
        self.remove(tail);
        Some(tail)
    }

    /// Mark a slot as most recently used, inserting it if absent
    pub fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.remove(slot);
        self.push_front(slot);
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_> {
        Iter { list: self, cursor: self.head }
    }
}

pub struct Iter<'a> {
    list: &'a RecencyList,
    cursor: Option<usize>,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let slot = self.cursor?;
        self.cursor = self.list.links[slot].next;
        Some(slot)
    }
}
