//! Nodes: pad owners and the packet delivery target.
//!
//! A [`Node`] is a concrete struct owning an ordered list of pads plus a
//! [`NodeLogic`] implementation supplying user behavior. Splitting the node
//! into struct-plus-logic keeps the pad machinery in one place while letting
//! users write only the three hooks they care about.

use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::pad::{BoundedQueue, Pad, PadKind, DEFAULT_QUEUE_CAPACITY};
use crate::packet::PacketRef;

/// User-supplied behavior of a node.
///
/// Implementations must be internally thread-safe: a node with several
/// direct input pads can have `process_packet` running concurrently on the
/// threads of several pushers.
pub trait NodeLogic: Send + Sync {
    /// Called by the pipeline after all pads have started. A failure aborts
    /// pipeline start and triggers rollback.
    fn on_start(&self, node: &Arc<Node>) -> anyhow::Result<()> {
        let _ = node;
        Ok(())
    }

    /// Called by the pipeline during stop, before pads are stopped.
    fn on_stop(&self, node: &Arc<Node>) {
        let _ = node;
    }

    /// Delivery point, invoked inline by a direct pad or from a
    /// bounded-queue pad's worker. `timeout` is the budget the original
    /// pusher supplied; nodes that block (e.g. a shared-memory publisher)
    /// must honor it.
    fn process_packet(
        &self,
        node: &Node,
        packet: PacketRef,
        input: &Pad,
        timeout: Duration,
    ) -> bool {
        let _ = (node, packet, input, timeout);
        false
    }
}

/// A collection of named, indexed pads plus the logic that consumes packets.
pub struct Node {
    me: Weak<Node>,
    pads: RwLock<Vec<(String, Arc<Pad>)>>,
    logic: Box<dyn NodeLogic>,
}

impl Node {
    pub(crate) fn new(logic: Box<dyn NodeLogic>) -> Arc<Node> {
        Arc::new_cyclic(|me| Node {
            me: me.clone(),
            pads: RwLock::new(Vec::new()),
            logic,
        })
    }

    /// Add a direct input pad.
    pub fn add_input(&self, name: &str) -> Arc<Pad> {
        self.add_pad_with(name, PadKind::Input, None)
    }

    /// Add a bounded-queue input pad with the given capacity.
    pub fn add_bounded_input(&self, name: &str, capacity: usize) -> Arc<Pad> {
        self.add_pad_with(name, PadKind::Input, Some(BoundedQueue::new(capacity)))
    }

    /// Add a bounded-queue input pad with the default capacity.
    pub fn add_buffered_input(&self, name: &str) -> Arc<Pad> {
        self.add_bounded_input(name, DEFAULT_QUEUE_CAPACITY)
    }

    /// Add an output pad.
    pub fn add_output(&self, name: &str) -> Arc<Pad> {
        self.add_pad_with(name, PadKind::Output, None)
    }

    /// Add a pad of undefined kind; its role is fixed by the first
    /// [`Pad::then`] that involves it.
    pub fn add_pad(&self, name: &str) -> Arc<Pad> {
        self.add_pad_with(name, PadKind::Undefined, None)
    }

    fn add_pad_with(&self, name: &str, kind: PadKind, queue: Option<BoundedQueue>) -> Arc<Pad> {
        let mut pads = self.pads.write().unwrap_or_else(|e| e.into_inner());
        let index = pads.len();
        let parent = self.me.clone();
        let pad =
            Arc::new_cyclic(|me| Pad::new(name, index, kind, me.clone(), parent, queue));
        pads.push((name.to_string(), Arc::clone(&pad)));
        pad
    }

    /// Look up a pad by name, first match of any kind.
    pub fn pad(&self, name: &str) -> EngineResult<Arc<Pad>> {
        self.find_pad(name, None)
    }

    /// Look up a pad by name, restricted to the given kind.
    pub fn pad_with_kind(&self, name: &str, kind: PadKind) -> EngineResult<Arc<Pad>> {
        self.find_pad(name, Some(kind))
    }

    /// Look up a pad by its insertion index.
    pub fn pad_at(&self, index: usize) -> EngineResult<Arc<Pad>> {
        let pads = self.read_pads();
        pads.get(index)
            .map(|(_, pad)| Arc::clone(pad))
            .ok_or(EngineError::PadIndexOutOfRange {
                index,
                count: pads.len(),
            })
    }

    /// Number of pads on the node.
    pub fn pad_count(&self) -> usize {
        self.read_pads().len()
    }

    /// Convenience: look up an input pad by name and push into it.
    ///
    /// Returns `false` when the pad does not exist, mirroring the hot-path
    /// delivery contract.
    pub fn push_to(&self, name: &str, packet: PacketRef, timeout: Duration) -> bool {
        match self.pad_with_kind(name, PadKind::Input) {
            Ok(pad) => pad.push(packet, timeout),
            Err(_) => false,
        }
    }

    fn find_pad(&self, name: &str, kind: Option<PadKind>) -> EngineResult<Arc<Pad>> {
        self.read_pads()
            .iter()
            .find(|(pad_name, pad)| {
                pad_name == name && kind.map_or(true, |kind| pad.kind() == kind)
            })
            .map(|(_, pad)| Arc::clone(pad))
            .ok_or_else(|| EngineError::pad_not_found(name))
    }

    fn read_pads(&self) -> RwLockReadGuard<'_, Vec<(String, Arc<Pad>)>> {
        self.pads.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn dispatch(&self, packet: PacketRef, input: &Pad, timeout: Duration) -> bool {
        self.logic.process_packet(self, packet, input, timeout)
    }

    /// Start every pad in insertion order; on failure stop the ones already
    /// started, in reverse, and report failure.
    pub(crate) fn start_pads(&self) -> bool {
        let pads = self.read_pads();
        for (position, (_, pad)) in pads.iter().enumerate() {
            if !pad.start() {
                for (_, started) in pads[..position].iter().rev() {
                    started.stop();
                }
                return false;
            }
        }
        true
    }

    /// Stop every pad in reverse insertion order.
    pub(crate) fn stop_pads(&self) {
        for (_, pad) in self.read_pads().iter().rev() {
            pad.stop();
        }
    }

    pub(crate) fn run_start_hook(&self) -> anyhow::Result<()> {
        let node = self.me.upgrade().ok_or_else(|| anyhow::anyhow!("node is gone"))?;
        self.logic.on_start(&node)
    }

    pub(crate) fn run_stop_hook(&self) {
        if let Some(node) = self.me.upgrade() {
            self.logic.on_stop(&node);
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("pads", &self.pad_count())
            .finish()
    }
}
