//! Publisher node: serializes packets into the shared-memory ring.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, trace, warn};

use flowline_engine::node::{Node, NodeLogic};
use flowline_engine::pad::Pad;
use flowline_engine::packet::{Packet, PacketRef};

use crate::config::RegionConfig;
use crate::layout::{arena_offset, next_slot, slot_ptr, RegionHeader, SlotRecord};
use crate::region::OwnedRegion;
use crate::sync::{self, LockOutcome, WaitOutcome};

/// Node behavior that owns a shared-memory region and publishes every
/// delivered packet into its ring.
///
/// Each input pad is a *channel*; the pad's index is the `channel` field
/// carried by each slot, and a matching subscriber re-emits the packet on
/// the output pad with the same index. Use [`PublisherChannels::add_channel`]
/// to declare channels.
pub struct SharedMemoryPublisher {
    config: RegionConfig,
    region: Mutex<Option<OwnedRegion>>,
}

impl SharedMemoryPublisher {
    /// Publisher for the region described by `config`.
    pub fn new(config: RegionConfig) -> Self {
        SharedMemoryPublisher {
            config,
            region: Mutex::new(None),
        }
    }

    /// Publisher with default region size and capacity.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self::new(RegionConfig::new(name))
    }

    fn region_guard(&self) -> MutexGuard<'_, Option<OwnedRegion>> {
        self.region.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait until the ring has a free slot, up to `timeout`.
    ///
    /// # Safety
    ///
    /// `hdr` must be the header of the live region and its mutex must be
    /// held by the calling thread.
    unsafe fn wait_for_free_slot(&self, hdr: *mut RegionHeader, timeout: Duration) -> bool {
        // SAFETY: hdr is live and locked per the caller's contract.
        unsafe {
            loop {
                if !(*hdr).is_valid.load(std::sync::atomic::Ordering::Acquire) {
                    return false;
                }
                if (*hdr).count < (*hdr).capacity {
                    return true;
                }
                match sync::timed_wait(
                    &raw mut (*hdr).cond_slot_available,
                    &raw mut (*hdr).mutex,
                    timeout,
                ) {
                    WaitOutcome::Signaled => continue,
                    WaitOutcome::TimedOut => {
                        trace!("timed out waiting for a free slot");
                        return false;
                    }
                    WaitOutcome::Invalid => return false,
                }
            }
        }
    }

    /// Serialize `packet` at the arena cursor and fill slot `tail`.
    ///
    /// On insufficient space the cursor is reset to the arena start and the
    /// serialization retried once; a second failure consumes no slot.
    ///
    /// # Safety
    ///
    /// The region mutex must be held and a free slot must exist.
    unsafe fn serialize_to_ring(&self, region: &OwnedRegion, packet: &dyn Packet, channel: u32) -> bool {
        let hdr = region.header();
        let base = region.base();
        let len = region.len();
        // SAFETY: region is live and locked per the caller's contract; the
        // arena slices below stay within the mapping.
        unsafe {
            let arena = arena_offset((*hdr).capacity);
            let mut offset = (*hdr).write_offset as usize;

            let mut written =
                packet.serialize_to(std::slice::from_raw_parts_mut(base.add(offset), len - offset));
            if written.is_none() {
                offset = arena;
                (*hdr).write_offset = arena as u64;
                written = packet
                    .serialize_to(std::slice::from_raw_parts_mut(base.add(offset), len - offset));
            }
            let Some(written) = written else {
                debug!("packet serialization failed twice, dropping");
                return false;
            };

            *slot_ptr(base, (*hdr).tail) = SlotRecord {
                size: written as u32,
                channel,
                offset: offset as u64,
            };
            (*hdr).tail = next_slot((*hdr).tail, (*hdr).capacity);
            (*hdr).count += 1;

            let mut cursor = offset + written;
            if cursor >= len {
                cursor = arena;
            }
            (*hdr).write_offset = cursor as u64;
            true
        }
    }
}

impl NodeLogic for SharedMemoryPublisher {
    fn on_start(&self, _node: &Arc<Node>) -> anyhow::Result<()> {
        let mut region = self.region_guard();
        if region.is_some() {
            anyhow::bail!("region `{}` is already created", self.config.name);
        }
        *region = Some(
            OwnedRegion::create(&self.config)
                .with_context(|| format!("creating region `{}`", self.config.name))?,
        );
        Ok(())
    }

    fn on_stop(&self, _node: &Arc<Node>) {
        if self.region_guard().take().is_some() {
            debug!(region = %self.config.name, "publisher stopped");
        }
    }

    fn process_packet(
        &self,
        _node: &Node,
        packet: PacketRef,
        input: &Pad,
        timeout: Duration,
    ) -> bool {
        let guard = self.region_guard();
        let Some(region) = guard.as_ref() else {
            return false;
        };
        let hdr = region.header();

        // SAFETY: the region stays mapped for the whole guard scope; all
        // ring mutation happens between lock and unlock.
        unsafe {
            match sync::lock(&raw mut (*hdr).mutex) {
                LockOutcome::Acquired => {}
                LockOutcome::OwnerDead => {
                    // A subscriber died mid-read; the ring state is still
                    // ours to repair, so keep the region usable.
                    warn!(region = %self.config.name, "reclaimed mutex from dead peer");
                    sync::mark_consistent(&raw mut (*hdr).mutex);
                }
                LockOutcome::Invalid => return false,
            }

            let published = self.wait_for_free_slot(hdr, timeout)
                && self.serialize_to_ring(region, packet.as_ref(), input.index() as u32);
            if published {
                sync::signal(&raw mut (*hdr).cond_packet_ready);
            }
            sync::unlock(&raw mut (*hdr).mutex);
            published
        }
    }
}

impl std::fmt::Debug for SharedMemoryPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryPublisher")
            .field("region", &self.config.name)
            .field("capacity", &self.config.capacity)
            .finish()
    }
}

/// Channel vocabulary for publisher nodes.
///
/// A channel is an input pad whose index becomes the wire `channel` field;
/// this extension only provides the domain name for that operation.
pub trait PublisherChannels {
    /// Add a channel (a direct input pad) to a publisher node.
    fn add_channel(&self, name: &str) -> Arc<Pad>;
}

impl PublisherChannels for Arc<Node> {
    fn add_channel(&self, name: &str) -> Arc<Pad> {
        self.add_input(name)
    }
}
