use std::collections::BTreeMap;

/// Restores submission order for results that complete out of order.
///
/// Every item is keyed by the position it was submitted at. `pop_ready` only
/// releases an item once every earlier position has been released, so the
/// consumer sees positions `0, 1, 2, ..` with no gaps.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Park a completed item. Returns `false` (and drops the item) if the
    /// position was already released or is already parked.
    pub fn insert(&mut self, position: u64, item: T) -> bool {
        if position < self.next || self.pending.contains_key(&position) {
            return false;
        }
        self.pending.insert(position, item);
        true
    }

    /// Release the item at the next expected position, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Position the next `pop_ready` waits for.
    pub fn next_position(&self) -> u64 {
        self.next
    }

    /// Number of items parked behind a gap.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
