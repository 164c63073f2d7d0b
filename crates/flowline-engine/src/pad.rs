//! Pads: the typed endpoints packets are pushed through.
//!
//! A pad either terminates delivery by dispatching into its owning node
//! (input pads) or forwards to the input pad it is linked to (output pads).
//! Input pads come in two flavors: *direct* pads dispatch synchronously on
//! the pusher's thread, *bounded-queue* pads buffer up to a fixed capacity
//! and drain on a dedicated worker thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::{EngineError, EngineResult};
use crate::node::Node;
use crate::packet::PacketRef;

/// Role of a pad on its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadKind {
    /// Receives packets and terminates delivery into the node.
    Input,
    /// Emits packets by forwarding to a linked input pad.
    Output,
    /// Not yet determined; promoted by the first [`Pad::then`] involving it.
    Undefined,
}

impl PadKind {
    fn from_u8(raw: u8) -> PadKind {
        match raw {
            0 => PadKind::Input,
            1 => PadKind::Output,
            _ => PadKind::Undefined,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PadKind::Input => 0,
            PadKind::Output => 1,
            PadKind::Undefined => 2,
        }
    }
}

/// A named, indexed endpoint on a node.
///
/// Pads are created through [`Node::add_input`], [`Node::add_bounded_input`],
/// [`Node::add_output`] or [`Node::add_pad`] and handed out as `Arc<Pad>`.
/// The index is the insertion position within the node and never changes.
pub struct Pad {
    name: String,
    index: usize,
    kind: AtomicU8,
    me: Weak<Pad>,
    parent: Weak<Node>,
    link: Mutex<Option<Arc<Pad>>>,
    queue: Option<BoundedQueue>,
}

impl Pad {
    pub(crate) fn new(
        name: &str,
        index: usize,
        kind: PadKind,
        me: Weak<Pad>,
        parent: Weak<Node>,
        queue: Option<BoundedQueue>,
    ) -> Pad {
        Pad {
            name: name.to_string(),
            index,
            kind: AtomicU8::new(kind.as_u8()),
            me,
            parent,
            link: Mutex::new(None),
            queue,
        }
    }

    /// The pad's name, unique within its node by convention.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insertion index within the owning node. Immutable after creation.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current kind, observing any lazy promotion performed by `then`.
    pub fn kind(&self) -> PadKind {
        PadKind::from_u8(self.kind.load(Ordering::Acquire))
    }

    /// The owning node, if it is still alive.
    pub fn node(&self) -> Option<Arc<Node>> {
        self.parent.upgrade()
    }

    /// Push a packet into the pad.
    ///
    /// Non-input pads forward to their linked pad (`false` when unlinked);
    /// input pads deliver according to their flavor. `timeout` bounds any
    /// blocking the delivery performs downstream.
    pub fn push(&self, packet: PacketRef, timeout: Duration) -> bool {
        if self.kind() != PadKind::Input {
            let link = lock(&self.link).clone();
            return match link {
                Some(target) => target.push(packet, timeout),
                None => false,
            };
        }
        match &self.queue {
            None => self.deliver(packet, timeout),
            Some(queue) => queue.enqueue(packet, timeout),
        }
    }

    /// Connect this pad to `target` and return the target's owning node,
    /// enabling fluent chaining across nodes.
    ///
    /// Promotes this pad from [`PadKind::Undefined`] to output and `target`
    /// from undefined to input. Any previous link is replaced.
    pub fn then(&self, target: &Arc<Pad>) -> EngineResult<Arc<Node>> {
        self.link_to(target);
        target.node().ok_or(EngineError::NodeGone)
    }

    /// Connect this pad to `target` without looking up the target node.
    pub fn link_to(&self, target: &Arc<Pad>) {
        if self.kind() == PadKind::Undefined {
            self.kind.store(PadKind::Output.as_u8(), Ordering::Release);
        }
        if target.kind() == PadKind::Undefined {
            target.kind.store(PadKind::Input.as_u8(), Ordering::Release);
        }
        *lock(&self.link) = Some(Arc::clone(target));
    }

    /// Remove any existing link.
    pub fn unlink(&self) {
        *lock(&self.link) = None;
    }

    /// Start the pad. Direct pads have nothing to start; bounded-queue pads
    /// spawn their worker thread. Idempotent.
    pub fn start(&self) -> bool {
        let Some(queue) = &self.queue else {
            return true;
        };
        match self.me.upgrade() {
            Some(pad) => queue.start(pad),
            None => false,
        }
    }

    /// Stop the pad, joining any worker thread. Idempotent.
    pub fn stop(&self) {
        if let Some(queue) = &self.queue {
            queue.stop();
        }
    }

    /// Terminal delivery: hand the packet to the owning node.
    fn deliver(&self, packet: PacketRef, timeout: Duration) -> bool {
        match self.parent.upgrade() {
            Some(node) => node.dispatch(packet, self, timeout),
            None => false,
        }
    }
}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("kind", &self.kind())
            .field("buffered", &self.queue.is_some())
            .finish()
    }
}

/// Default capacity of a bounded-queue pad.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

struct QueueState {
    /// Pending packets with the timeout their pusher supplied; the worker
    /// forwards that timeout to the node so blocking nodes keep honoring the
    /// caller's budget.
    queue: VecDeque<(Duration, PacketRef)>,
    running: bool,
}

/// State backing a bounded-queue input pad.
pub(crate) struct BoundedQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    has_space: Condvar,
    has_packets: Condvar,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl BoundedQueue {
    pub(crate) fn new(capacity: usize) -> BoundedQueue {
        BoundedQueue {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                running: false,
            }),
            has_space: Condvar::new(),
            has_packets: Condvar::new(),
            worker: Mutex::new(None),
        }
    }

    fn enqueue(&self, packet: PacketRef, timeout: Duration) -> bool {
        let guard = lock(&self.state);
        let (mut state, _timed_out) = self
            .has_space
            .wait_timeout_while(guard, timeout, |s| {
                s.running && s.queue.len() >= self.capacity
            })
            .unwrap_or_else(|e| e.into_inner());

        if !state.running || state.queue.len() >= self.capacity {
            return false;
        }
        state.queue.push_back((timeout, packet));
        drop(state);
        self.has_packets.notify_one();
        true
    }

    fn start(&self, pad: Arc<Pad>) -> bool {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return true;
        }
        lock(&self.state).running = true;

        let spawned = thread::Builder::new()
            .name(format!("pad-{}", pad.name()))
            .spawn(move || queue_worker(pad));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to spawn queue pad worker");
                lock(&self.state).running = false;
                false
            }
        }
    }

    fn stop(&self) {
        let handle = lock(&self.worker).take();
        lock(&self.state).running = false;
        self.has_packets.notify_all();
        self.has_space.notify_all();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn queue_worker(pad: Arc<Pad>) {
    let Some(queue) = pad.queue.as_ref() else {
        return;
    };
    trace!(pad = pad.name(), "queue worker started");
    loop {
        let mut state = lock(&queue.state);
        while state.running && state.queue.is_empty() {
            state = queue
                .has_packets
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        // Drain what is left after stop; exit once stopped and empty.
        let Some((timeout, packet)) = state.queue.pop_front() else {
            break;
        };
        drop(state);
        queue.has_space.notify_one();
        let _ = pad.deliver(packet, timeout);
    }
    trace!(pad = pad.name(), "queue worker exited");
}

/// Lock with poison recovery: a panicking packet handler must not wedge the
/// pad for every other producer.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [PadKind::Input, PadKind::Output, PadKind::Undefined] {
            assert_eq!(PadKind::from_u8(kind.as_u8()), kind);
        }
    }

    #[test]
    fn test_push_on_unlinked_output_fails() {
        let pad = Arc::new_cyclic(|me| {
            Pad::new("out", 0, PadKind::Output, me.clone(), Weak::new(), None)
        });
        struct Unit;
        impl crate::packet::Packet for Unit {}
        assert!(!pad.push(Arc::new(Unit), Duration::ZERO));
    }

    #[test]
    fn test_enqueue_rejected_while_stopped() {
        let queue = BoundedQueue::new(2);
        struct Unit;
        impl crate::packet::Packet for Unit {}
        assert!(!queue.enqueue(Arc::new(Unit), Duration::ZERO));
    }
}
