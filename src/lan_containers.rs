// Ordered containers used by interfaces and devices
//
// Thin wrappers that pin down the discipline each buffer follows (FIFO queues,
// LIFO history, insertion-ordered neighbor sets). Forwarding decisions depend
// on iteration order, so nothing here may reorder its contents.

use std::collections::VecDeque;

use indexmap::IndexSet;

use crate::lan_common::InterfaceRef;

// ============================================================================
// FIFO queue
// ============================================================================

#[derive(Debug, Clone)]
pub struct Fifo<T> {
    items: VecDeque<T>,
}

impl<T> Fifo<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Remove and return the oldest entry
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// LIFO history
// ============================================================================

/// Unbounded stack, most recent entry on top
#[derive(Debug, Clone)]
pub struct HistoryStack<T> {
    items: Vec<T>,
}

impl<T> HistoryStack<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }
}

impl<T> Default for HistoryStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Neighbor set
// ============================================================================

/// Adjacency list of an interface, iterated in insertion order
#[derive(Debug, Clone, Default)]
pub struct NeighborSet {
    members: IndexSet<InterfaceRef>,
}

impl NeighborSet {
    pub fn new() -> Self {
        Self {
            members: IndexSet::new(),
        }
    }

    /// Returns false if already present
    pub fn insert(&mut self, neighbor: InterfaceRef) -> bool {
        self.members.insert(neighbor)
    }

    /// Removal keeps the relative order of the remaining members
    pub fn remove(&mut self, neighbor: &InterfaceRef) -> bool {
        self.members.shift_remove(neighbor)
    }

    pub fn contains(&self, neighbor: &InterfaceRef) -> bool {
        self.members.contains(neighbor)
    }

    pub fn first(&self) -> Option<&InterfaceRef> {
        self.members.first()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceRef> {
        self.members.iter()
    }

    /// Rewrite entries that point at a renamed device, in place
    pub(crate) fn rename_device(&mut self, old: &str, new: &str) {
        if !self.members.iter().any(|r| r.device == old) {
            return;
        }
        self.members = self
            .members
            .drain(..)
            .map(|r| {
                if r.device == old {
                    InterfaceRef::new(new, r.interface)
                } else {
                    r
                }
            })
            .collect();
    }
}
