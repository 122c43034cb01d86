use std::collections::BTreeMap;

/// Hands out spill slot indices, lowest free slot first. Slots released by
/// ended ranges are reused, so `total_slots` is the peak number of slots in
/// use at once.
///
/// A slot is only handed to a range that starts at or after the point where
/// the slot was released. An evicted register already holds its value from
/// its own start, so it cannot take a slot freed in the middle of its range.
#[derive(Debug, Default)]
pub struct SpillAllocator {
    next_slot: u32,
    // slot -> instruction index at which it was released
    free: BTreeMap<u32, usize>,
}

impl SpillAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot for a range starting at instruction `from`.
    pub fn alloc_slot(&mut self, from: usize) -> u32 {
        let reusable = self
            .free
            .iter()
            .find(|(_, released_at)| **released_at <= from)
            .map(|(slot, _)| *slot);
        if let Some(slot) = reusable {
            self.free.remove(&slot);
            return slot;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Return `slot` to the pool; `at` is the exclusive end of the range that held it.
    pub fn release_slot(&mut self, slot: u32, at: usize) {
        debug_assert!(slot < self.next_slot, "release of unknown spill slot {slot}");
        self.free.insert(slot, at);
    }

    #[inline]
    pub fn total_slots(&self) -> u32 {
        self.next_slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowest_free_slot_first() {
        let mut slots = SpillAllocator::new();
        assert_eq!(slots.alloc_slot(0), 0);
        assert_eq!(slots.alloc_slot(1), 1);
        assert_eq!(slots.alloc_slot(2), 2);

        slots.release_slot(2, 5);
        slots.release_slot(0, 6);
        assert_eq!(slots.alloc_slot(7), 0);
        assert_eq!(slots.alloc_slot(7), 2);
        assert_eq!(slots.alloc_slot(7), 3);
        assert_eq!(slots.total_slots(), 4);
    }

    #[test]
    fn test_slot_released_after_range_start_is_not_reused() {
        let mut slots = SpillAllocator::new();
        assert_eq!(slots.alloc_slot(2), 0);
        slots.release_slot(0, 5);

        // A range that began at 1 overlaps the one that held slot 0.
        assert_eq!(slots.alloc_slot(1), 1);
        assert_eq!(slots.alloc_slot(5), 0);
        assert_eq!(slots.total_slots(), 2);
    }
}
