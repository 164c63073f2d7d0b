//! Wire layout of a packet region.
//!
//! A region is a fixed-size mapping laid out as header, slot array, byte
//! arena, tightly packed in native endianness:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬───────────────────────────┐
//! │ RegionHeader │ SlotRecord × capacity │ byte arena (wrapping)     │
//! └──────────────┴──────────────────────┴───────────────────────────┘
//! ```
//!
//! All ring fields are mutated only while holding the header's mutex;
//! `is_valid` and `version` are atomics readable without it.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU32};

/// Descriptor of one serialized packet in the ring.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SlotRecord {
    /// Serialized payload length in bytes.
    pub size: u32,
    /// Publisher channel (input pad index) the packet arrived on.
    pub channel: u32,
    /// Payload offset from the start of the region.
    pub offset: u64,
}

/// Header at the start of every packet region.
#[repr(C)]
pub struct RegionHeader {
    /// Random nonce chosen at creation; a new value means the region was
    /// re-created and prior offsets are meaningless.
    pub version: AtomicU32,
    /// Total region size in bytes.
    pub size: AtomicU32,
    /// False while the region is under construction or after teardown.
    /// Published last by the creator; checked first by attachers.
    pub is_valid: AtomicBool,
    /// Robust process-shared mutex guarding everything below.
    pub mutex: libc::pthread_mutex_t,
    /// Signaled by the publisher after a slot is filled.
    pub cond_packet_ready: libc::pthread_cond_t,
    /// Signaled by the subscriber after a slot is consumed.
    pub cond_slot_available: libc::pthread_cond_t,
    /// Arena cursor: region offset where the next payload is written.
    pub write_offset: u64,
    /// Ring capacity in slots.
    pub capacity: u32,
    /// Occupied slots.
    pub count: u32,
    /// Next slot to read.
    pub head: u32,
    /// Next slot to write.
    pub tail: u32,
}

/// Offset of the slot array from the region base.
pub const fn slots_offset() -> usize {
    mem::size_of::<RegionHeader>()
}

/// Offset of the byte arena from the region base.
pub fn arena_offset(capacity: u32) -> usize {
    slots_offset() + capacity as usize * mem::size_of::<SlotRecord>()
}

/// Smallest region size that leaves any arena at all.
pub fn min_region_size(capacity: u32) -> usize {
    arena_offset(capacity) + 1
}

/// Advance a ring index by one, wrapping at `capacity`.
pub fn next_slot(index: u32, capacity: u32) -> u32 {
    (index + 1) % capacity
}

/// Pointer to slot `index` of a region mapped at `base`.
///
/// # Safety
///
/// `base` must point at a live mapping of at least
/// `arena_offset(index + 1)` bytes.
pub unsafe fn slot_ptr(base: *mut u8, index: u32) -> *mut SlotRecord {
    // SAFETY: in-bounds by the caller's contract.
    unsafe {
        base.add(slots_offset())
            .cast::<SlotRecord>()
            .add(index as usize)
    }
}
