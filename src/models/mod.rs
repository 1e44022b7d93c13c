//! Ready-made sequential models for common container shapes.
//!
//! A model is any `Default + Clone + Eq + Hash` type; these cover the
//! usual suspects so a test of a queue or a stack does not start by
//! writing one. They are built on persistent vectors, so the clone the
//! verifier takes at every branch of its search is cheap structural
//! sharing rather than a deep copy.

use std::hash::{Hash, Hasher};

use im::Vector;

/// FIFO queue over `i64` values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeqQueue {
    items: Vector<i64>,
}

impl SeqQueue {
    pub fn new() -> SeqQueue {
        SeqQueue::default()
    }

    pub fn enqueue(&mut self, value: i64) {
        self.items.push_back(value);
    }

    pub fn dequeue(&mut self) -> Option<i64> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Hash for SeqQueue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.items.len().hash(state);
        for item in &self.items {
            item.hash(state);
        }
    }
}

/// LIFO stack over `i64` values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeqStack {
    items: Vector<i64>,
}

impl SeqStack {
    pub fn new() -> SeqStack {
        SeqStack::default()
    }

    pub fn push(&mut self, value: i64) {
        self.items.push_back(value);
    }

    pub fn pop(&mut self) -> Option<i64> {
        self.items.pop_back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Hash for SeqStack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.items.len().hash(state);
        for item in &self.items {
            item.hash(state);
        }
    }
}

/// Counter with increment, decrement and read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SeqCounter {
    value: i64,
}

impl SeqCounter {
    pub fn new() -> SeqCounter {
        SeqCounter::default()
    }

    /// Increment and return the new value.
    pub fn inc(&mut self) -> i64 {
        self.add(1)
    }

    /// Decrement and return the new value.
    pub fn dec(&mut self) -> i64 {
        self.add(-1)
    }

    pub fn add(&mut self, delta: i64) -> i64 {
        self.value += delta;
        self.value
    }

    pub fn read(&self) -> i64 {
        self.value
    }
}

/// Single readable and writable cell, starting at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SeqRegister {
    value: i64,
}

impl SeqRegister {
    pub fn new() -> SeqRegister {
        SeqRegister::default()
    }

    pub fn read(&self) -> i64 {
        self.value
    }

    /// Store `value`, returning the previous contents.
    pub fn write(&mut self, value: i64) -> i64 {
        std::mem::replace(&mut self.value, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn queue_is_fifo() {
        let mut q = SeqQueue::new();
        assert_eq!(q.dequeue(), None);
        q.enqueue(1);
        q.enqueue(2);
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert!(q.is_empty());
    }

    #[test]
    fn stack_is_lifo() {
        let mut s = SeqStack::new();
        s.push(1);
        s.push(2);
        assert_eq!(s.pop(), Some(2));
        assert_eq!(s.pop(), Some(1));
        assert_eq!(s.pop(), None);
    }

    #[test]
    fn counter_reports_the_new_value() {
        let mut c = SeqCounter::new();
        assert_eq!(c.inc(), 1);
        assert_eq!(c.inc(), 2);
        assert_eq!(c.dec(), 1);
        assert_eq!(c.read(), 1);
    }

    #[test]
    fn register_returns_the_old_value() {
        let mut r = SeqRegister::new();
        assert_eq!(r.write(7), 0);
        assert_eq!(r.write(9), 7);
        assert_eq!(r.read(), 9);
    }

    #[test]
    fn equal_states_hash_alike() {
        let mut a = SeqQueue::new();
        let mut b = SeqQueue::new();
        a.enqueue(1);
        a.enqueue(2);
        a.dequeue();
        b.enqueue(2);
        b.dequeue();
        b.enqueue(2);
        b.dequeue();
        b.enqueue(2);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }
}
