//! Pipeline: node ownership and ordered lifecycle.
//!
//! Start happens in two phases (pads first, then user hooks), both in
//! insertion order; any failure rolls the already-started portion back in
//! reverse so a failed start never leaves a node or pad running.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::node::{Node, NodeLogic};
use crate::nodes::NodeFn;
use crate::pad::Pad;
use crate::packet::PacketRef;

/// An ordered collection of nodes with a shared start/stop lifecycle.
#[derive(Default)]
pub struct Pipeline {
    nodes: Vec<Arc<Node>>,
    started: bool,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Pipeline {
        Pipeline::default()
    }

    /// Add a node with the given behavior; the pipeline owns its lifecycle.
    pub fn add_node<L: NodeLogic + 'static>(&mut self, logic: L) -> Arc<Node> {
        let node = Node::new(Box::new(logic));
        self.nodes.push(Arc::clone(&node));
        node
    }

    /// Add a node whose delivery point is a closure.
    pub fn add_fn_node<F>(&mut self, func: F) -> Arc<Node>
    where
        F: Fn(&Node, PacketRef, &Pad) -> bool + Send + Sync + 'static,
    {
        self.add_node(NodeFn::new(func))
    }

    /// Connect an output pad to an input pad.
    pub fn connect(&self, output: &Arc<Pad>, input: &Arc<Pad>) {
        output.link_to(input);
    }

    /// Number of nodes in the pipeline.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Start the pipeline.
    ///
    /// Phase one starts every pad of every node in forward order; phase two
    /// runs every node's start hook in forward order. On any failure the
    /// started portion is torn down in reverse and the error returned; a
    /// subsequent [`Pipeline::stop`] is then a no-op.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.started {
            return Ok(());
        }

        for (position, node) in self.nodes.iter().enumerate() {
            if !node.start_pads() {
                warn!(node = position, "pad start failed, rolling back pipeline");
                for prev in self.nodes[..position].iter().rev() {
                    prev.run_stop_hook();
                }
                for prev in self.nodes[..position].iter().rev() {
                    prev.stop_pads();
                }
                return Err(EngineError::PadStartFailed { node: position });
            }
        }

        for (position, node) in self.nodes.iter().enumerate() {
            if let Err(err) = node.run_start_hook() {
                warn!(
                    node = position,
                    error = %err,
                    "start hook failed, rolling back pipeline"
                );
                for prev in self.nodes[..position].iter().rev() {
                    prev.run_stop_hook();
                }
                for node in self.nodes.iter().rev() {
                    node.stop_pads();
                }
                return Err(EngineError::NodeStartFailed {
                    node: position,
                    reason: err.to_string(),
                });
            }
        }

        self.started = true;
        debug!(nodes = self.nodes.len(), "pipeline started");
        Ok(())
    }

    /// Stop the pipeline: every stop hook in reverse order, then every
    /// node's pads in reverse order. Idempotent.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for node in self.nodes.iter().rev() {
            node.run_stop_hook();
        }
        for node in self.nodes.iter().rev() {
            node.stop_pads();
        }
        self.started = false;
        debug!(nodes = self.nodes.len(), "pipeline stopped");
    }

    /// Whether a start has completed without a matching stop.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("nodes", &self.nodes.len())
            .field("started", &self.started)
            .finish()
    }
}
