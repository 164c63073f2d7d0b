//! Property tests for ring and layout arithmetic.

#![cfg(target_os = "linux")]

use proptest::prelude::*;

use flowline_shm::layout::{arena_offset, min_region_size, next_slot, slots_offset};

proptest! {
    /// Ring indices stay in range and visit every slot exactly once per lap.
    #[test]
    fn prop_next_slot_cycles(capacity in 1u32..=1024, start in 0u32..1024) {
        let start = start % capacity;
        let mut index = start;
        let mut seen = vec![false; capacity as usize];
        for _ in 0..capacity {
            prop_assert!(index < capacity);
            prop_assert!(!seen[index as usize]);
            seen[index as usize] = true;
            index = next_slot(index, capacity);
        }
        prop_assert_eq!(index, start);
    }

    /// The arena begins after the slot array and grows linearly with
    /// capacity.
    #[test]
    fn prop_arena_offset_is_monotonic(capacity in 0u32..=4096) {
        prop_assert!(arena_offset(capacity) >= slots_offset());
        prop_assert!(arena_offset(capacity + 1) > arena_offset(capacity));
        prop_assert!(min_region_size(capacity) > arena_offset(capacity));
    }
}
