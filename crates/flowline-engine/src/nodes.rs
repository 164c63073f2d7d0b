//! Stock node behaviors: closures, typed dispatchers and the splitter.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::node::{Node, NodeLogic};
use crate::packet::{Packet, PacketExt, PacketRef};
use crate::pad::{Pad, PadKind};
use crate::pipeline::Pipeline;

/// Node behavior backed by a plain closure.
///
/// The closure is the delivery point; lifecycle hooks keep their defaults.
pub struct NodeFn<F> {
    func: F,
}

impl<F> NodeFn<F>
where
    F: Fn(&Node, PacketRef, &Pad) -> bool + Send + Sync,
{
    /// Wrap a closure as node behavior.
    pub fn new(func: F) -> Self {
        NodeFn { func }
    }
}

impl<F> NodeLogic for NodeFn<F>
where
    F: Fn(&Node, PacketRef, &Pad) -> bool + Send + Sync,
{
    fn process_packet(
        &self,
        node: &Node,
        packet: PacketRef,
        input: &Pad,
        _timeout: Duration,
    ) -> bool {
        (self.func)(node, packet, input)
    }
}

impl<F> std::fmt::Debug for NodeFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFn").finish_non_exhaustive()
    }
}

/// Node behavior dispatching packets of a single concrete type.
///
/// Packets that fail the downcast are rejected (`false`), giving users a
/// strongly-typed entry point without parameterizing the pad machinery.
pub struct TypedNode<T, F> {
    handler: F,
    _packet: PhantomData<fn(T)>,
}

impl<T, F> TypedNode<T, F>
where
    T: Packet,
    F: Fn(&Node, Arc<T>, &Pad) -> bool + Send + Sync,
{
    /// Wrap a typed handler as node behavior.
    pub fn new(handler: F) -> Self {
        TypedNode {
            handler,
            _packet: PhantomData,
        }
    }
}

impl<T, F> NodeLogic for TypedNode<T, F>
where
    T: Packet,
    F: Fn(&Node, Arc<T>, &Pad) -> bool + Send + Sync,
{
    fn process_packet(
        &self,
        node: &Node,
        packet: PacketRef,
        input: &Pad,
        _timeout: Duration,
    ) -> bool {
        match packet.downcast::<T>() {
            Some(packet) => (self.handler)(node, packet, input),
            None => false,
        }
    }
}

impl<T, F> std::fmt::Debug for TypedNode<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedNode")
            .field("packet_type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// Node behavior dispatching two packet types by input pad index.
///
/// Pad index 0 expects `T1`, pad index 1 expects `T2`; any other index is
/// rejected. Dispatch is by index, not by runtime type: a `T1` pushed into
/// pad 1 is dropped even though a `T1` handler exists. This keeps dispatch
/// predictable without reflecting over arbitrarily many types.
pub struct TypedPairNode<T1, T2, F1, F2> {
    first: F1,
    second: F2,
    _packets: PhantomData<fn(T1, T2)>,
}

impl<T1, T2, F1, F2> TypedPairNode<T1, T2, F1, F2>
where
    T1: Packet,
    T2: Packet,
    F1: Fn(&Node, Arc<T1>, &Pad) -> bool + Send + Sync,
    F2: Fn(&Node, Arc<T2>, &Pad) -> bool + Send + Sync,
{
    /// Wrap a pair of typed handlers as node behavior.
    pub fn new(first: F1, second: F2) -> Self {
        TypedPairNode {
            first,
            second,
            _packets: PhantomData,
        }
    }
}

impl<T1, T2, F1, F2> NodeLogic for TypedPairNode<T1, T2, F1, F2>
where
    T1: Packet,
    T2: Packet,
    F1: Fn(&Node, Arc<T1>, &Pad) -> bool + Send + Sync,
    F2: Fn(&Node, Arc<T2>, &Pad) -> bool + Send + Sync,
{
    fn process_packet(
        &self,
        node: &Node,
        packet: PacketRef,
        input: &Pad,
        _timeout: Duration,
    ) -> bool {
        match input.index() {
            0 => match packet.downcast::<T1>() {
                Some(packet) => (self.first)(node, packet, input),
                None => false,
            },
            1 => match packet.downcast::<T2>() {
                Some(packet) => (self.second)(node, packet, input),
                None => false,
            },
            _ => false,
        }
    }
}

impl<T1, T2, F1, F2> std::fmt::Debug for TypedPairNode<T1, T2, F1, F2> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedPairNode")
            .field("first_type", &std::any::type_name::<T1>())
            .field("second_type", &std::any::type_name::<T2>())
            .finish_non_exhaustive()
    }
}

/// Fan-out behavior: forward every packet to all output pads.
///
/// Pushes are non-blocking (zero timeout); a full downstream queue drops
/// that branch's delivery for the packet rather than stalling the caller.
/// The result is the logical AND of the branch pushes.
#[derive(Debug)]
pub struct Splitter;

impl Splitter {
    /// Add a splitter node with one direct input pad named `input` and
    /// `outputs` output pads named `output_1..output_N`.
    pub fn spawn(pipeline: &mut Pipeline, outputs: usize) -> Arc<Node> {
        let node = pipeline.add_node(Splitter);
        node.add_input("input");
        Self::add_outputs(&node, outputs);
        node
    }

    /// Like [`Splitter::spawn`] but with a bounded-queue input pad.
    pub fn spawn_buffered(pipeline: &mut Pipeline, outputs: usize, capacity: usize) -> Arc<Node> {
        let node = pipeline.add_node(Splitter);
        node.add_bounded_input("input", capacity);
        Self::add_outputs(&node, outputs);
        node
    }

    fn add_outputs(node: &Arc<Node>, outputs: usize) {
        for branch in 1..=outputs {
            node.add_output(&format!("output_{branch}"));
        }
    }
}

impl NodeLogic for Splitter {
    fn process_packet(
        &self,
        node: &Node,
        packet: PacketRef,
        _input: &Pad,
        _timeout: Duration,
    ) -> bool {
        let mut result = true;
        for index in 0..node.pad_count() {
            let Ok(pad) = node.pad_at(index) else {
                break;
            };
            if pad.kind() == PadKind::Output {
                result = pad.push(Arc::clone(&packet), Duration::ZERO) && result;
            }
        }
        result
    }
}
