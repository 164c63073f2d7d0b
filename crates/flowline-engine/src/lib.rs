//! In-process dataflow pipeline engine for flowline.
//!
//! A pipeline is a directed graph of **nodes** connected by typed **pads**
//! through which **packets** flow. Producers, transformers and consumers are
//! composed at construction time; the engine drives delivery, manages the
//! worker thread behind each bounded-queue pad, and enforces an ordered
//! start/stop lifecycle with rollback on partial failure.
//!
//! # Architecture
//!
//! - [`packet`]: the opaque data unit and its downcast helpers
//! - [`pad`]: direct and bounded-queue endpoints, connection semantics
//! - [`node`]: pad ownership and the [`NodeLogic`] user seam
//! - [`nodes`]: stock behaviors (closure, typed, two-type, splitter)
//! - [`pipeline`]: ordered start with rollback, reverse-order stop
//! - [`error`]: engine error types
//!
//! # Delivery model
//!
//! Pushing into a direct pad runs the downstream chain synchronously on the
//! pusher's thread. Pushing into a bounded-queue pad blocks up to the given
//! timeout for space, then hands the packet to that pad's worker. All
//! hot-path operations report success or failure through their return value;
//! nothing in the data path panics.
//!
//! # Example
//!
//! ```
//! use flowline_engine::prelude::*;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! struct Tick;
//! impl Packet for Tick {}
//!
//! let mut pipeline = Pipeline::new();
//!
//! let producer = pipeline.add_fn_node(|node, packet, _pad| {
//!     match node.pad("output") {
//!         Ok(out) => out.push(packet, Duration::ZERO),
//!         Err(_) => false,
//!     }
//! });
//! producer.add_input("input");
//! producer.add_pad("output");
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let hits = Arc::clone(&seen);
//! let consumer = pipeline.add_fn_node(move |_, _, _| {
//!     hits.fetch_add(1, Ordering::SeqCst);
//!     true
//! });
//! consumer.add_input("input");
//!
//! producer
//!     .pad("output")
//!     .unwrap()
//!     .then(&consumer.pad("input").unwrap())
//!     .unwrap();
//!
//! pipeline.start().unwrap();
//! producer.push_to("input", Arc::new(Tick), Duration::ZERO);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

#![deny(unsafe_code, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod node;
pub mod nodes;
pub mod pad;
pub mod packet;
pub mod pipeline;
pub mod prelude;

pub use error::{EngineError, EngineResult};
pub use node::{Node, NodeLogic};
pub use nodes::{NodeFn, Splitter, TypedNode, TypedPairNode};
pub use pad::{Pad, PadKind, DEFAULT_QUEUE_CAPACITY};
pub use packet::{Packet, PacketExt, PacketRef};
pub use pipeline::Pipeline;
