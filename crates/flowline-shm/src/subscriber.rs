//! Subscriber node: drains the shared-memory ring into a local pipeline.
//!
//! The subscriber owns a worker thread that attaches to the named region
//! (retrying until a publisher creates it), waits for packets, rebuilds them
//! through a packet factory and pushes them into the output pad matching the
//! slot's channel. A publisher crash is detected through the robust mutex
//! and answered by detaching and re-entering the attach loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use flowline_engine::node::{Node, NodeLogic};
use flowline_engine::packet::{Packet, PacketRef};
use flowline_engine::pad::Pad;

use crate::layout::{next_slot, slot_ptr, RegionHeader};
use crate::region::AttachedRegion;
use crate::sync::{self, LockOutcome, WaitOutcome};

/// Delay before re-trying attach after a missing region or a crash.
const REATTACH_DELAY: Duration = Duration::from_millis(100);

/// Per-iteration bound on waiting for a packet, so the worker can notice
/// the stop flag and region teardown.
const WAIT_QUANTUM: Duration = Duration::from_millis(100);

/// Builds a fresh packet for the pad a slot is addressed to, ready for
/// `deserialize_from`.
pub type PacketFactory = dyn Fn(&Pad) -> Box<dyn Packet> + Send + Sync;

/// Node behavior that mirrors a publisher's channels out of shared memory.
///
/// Output pads correspond to publisher channels by index (and by name, by
/// convention).
pub struct SharedMemorySubscriber {
    name: String,
    factory: Arc<PacketFactory>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SharedMemorySubscriber {
    /// Subscriber with an explicit packet factory.
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&Pad) -> Box<dyn Packet> + Send + Sync + 'static,
    ) -> Self {
        SharedMemorySubscriber {
            name: name.into(),
            factory: Arc::new(factory),
            stop: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Subscriber whose channels all carry packets of type `T`.
    pub fn for_packet<T: Packet + Default>(name: impl Into<String>) -> Self {
        Self::new(name, |_| Box::new(T::default()) as Box<dyn Packet>)
    }
}

impl NodeLogic for SharedMemorySubscriber {
    fn on_start(&self, node: &Arc<Node>) -> anyhow::Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return Ok(());
        }
        self.stop.store(false, Ordering::SeqCst);

        let ctx = Worker {
            region_name: self.name.clone(),
            node: Arc::clone(node),
            factory: Arc::clone(&self.factory),
            stop: Arc::clone(&self.stop),
        };
        let handle = thread::Builder::new()
            .name(format!("shm-sub-{}", self.name))
            .spawn(move || ctx.run())?;
        *worker = Some(handle);
        Ok(())
    }

    fn on_stop(&self, _node: &Arc<Node>) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
            debug!(region = %self.name, "subscriber stopped");
        }
    }
}

impl std::fmt::Debug for SharedMemorySubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemorySubscriber")
            .field("region", &self.name)
            .finish()
    }
}

/// What a single locked poll of the region concluded.
enum Poll {
    /// Delivered a packet, or timed out with the region still healthy.
    KeepRegion,
    /// The region is defunct (torn down, invalid, or crashed); detach.
    Detach,
    /// The mutex owner died; detach and give the publisher time to rebuild.
    DetachAndBackOff,
}

struct Worker {
    region_name: String,
    node: Arc<Node>,
    factory: Arc<PacketFactory>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        trace!(region = %self.region_name, "subscriber worker started");
        let mut region: Option<AttachedRegion> = None;

        while !self.stop.load(Ordering::SeqCst) {
            let Some(attached) = region.as_ref() else {
                match AttachedRegion::open(&self.region_name) {
                    Ok(fresh) => {
                        debug!(region = %self.region_name, "attached to region");
                        region = Some(fresh);
                    }
                    // Not created yet, mid-teardown, or mid-construction:
                    // the next publisher session can fix all of these.
                    Err(err) if err.is_retryable() => thread::sleep(REATTACH_DELAY),
                    Err(err) => {
                        error!(region = %self.region_name, error = %err,
                               "region can never be attached, giving up");
                        break;
                    }
                }
                continue;
            };

            match self.poll(attached) {
                Poll::KeepRegion => {}
                Poll::Detach => {
                    warn!(region = %self.region_name, "region defunct, detaching");
                    region = None;
                }
                Poll::DetachAndBackOff => {
                    warn!(region = %self.region_name, "publisher died, detaching");
                    region = None;
                    thread::sleep(REATTACH_DELAY);
                }
            }
        }
        trace!(region = %self.region_name, "subscriber worker exited");
    }

    /// One lock/wait/drain cycle against the attached region.
    fn poll(&self, region: &AttachedRegion) -> Poll {
        let hdr = region.header();
        // SAFETY: region is mapped for the duration of the call; ring state
        // is only touched while the region mutex is held.
        unsafe {
            match sync::lock(&raw mut (*hdr).mutex) {
                LockOutcome::Acquired => {}
                LockOutcome::OwnerDead => {
                    sync::unlock(&raw mut (*hdr).mutex);
                    return Poll::DetachAndBackOff;
                }
                LockOutcome::Invalid => return Poll::Detach,
            }

            let poll = match self.wait_for_packet(hdr) {
                Ok(()) => {
                    self.drain_one(region);
                    sync::signal(&raw mut (*hdr).cond_slot_available);
                    Poll::KeepRegion
                }
                Err(WaitOutcome::TimedOut) => Poll::KeepRegion,
                Err(_) => Poll::Detach,
            };
            sync::unlock(&raw mut (*hdr).mutex);
            poll
        }
    }

    /// Wait until the ring holds a packet.
    ///
    /// Returns the wait outcome as the error when no packet is ready:
    /// timeout keeps the region, anything else marks it defunct.
    ///
    /// # Safety
    ///
    /// `hdr` must be the header of the attached region, mutex held.
    unsafe fn wait_for_packet(&self, hdr: *mut RegionHeader) -> Result<(), WaitOutcome> {
        // SAFETY: hdr is live and locked per the caller's contract.
        unsafe {
            loop {
                if !(*hdr).is_valid.load(Ordering::Acquire) {
                    return Err(WaitOutcome::Invalid);
                }
                if (*hdr).count > 0 {
                    return Ok(());
                }
                match sync::timed_wait(
                    &raw mut (*hdr).cond_packet_ready,
                    &raw mut (*hdr).mutex,
                    WAIT_QUANTUM,
                ) {
                    // Re-check the predicate; teardown also signals.
                    WaitOutcome::Signaled => continue,
                    WaitOutcome::TimedOut => return Err(WaitOutcome::TimedOut),
                    WaitOutcome::Invalid => return Err(WaitOutcome::Invalid),
                }
            }
        }
    }

    /// Consume slot `head`: rebuild the packet and push it into the output
    /// pad addressed by the slot's channel.
    ///
    /// # Safety
    ///
    /// The region mutex must be held and `count > 0`.
    unsafe fn drain_one(&self, region: &AttachedRegion) -> bool {
        let hdr = region.header();
        let base = region.base();
        // SAFETY: live, locked region per the caller's contract.
        unsafe {
            let slot = *slot_ptr(base, (*hdr).head);
            (*hdr).head = next_slot((*hdr).head, (*hdr).capacity);
            (*hdr).count -= 1;

            let Ok(pad) = self.node.pad_at(slot.channel as usize) else {
                warn!(channel = slot.channel, "no pad for channel, dropping packet");
                return false;
            };

            let end = slot.offset as usize + slot.size as usize;
            if end > region.len() {
                warn!(channel = slot.channel, "slot payload out of bounds, dropping");
                return false;
            }
            let payload =
                std::slice::from_raw_parts(base.add(slot.offset as usize), slot.size as usize);

            let mut packet = (self.factory)(&pad);
            if !packet.deserialize_from(payload) {
                return false;
            }
            let packet: PacketRef = Arc::from(packet);
            pad.push(packet, Duration::ZERO)
        }
    }
}
