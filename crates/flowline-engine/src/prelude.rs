//! Prelude module for convenient imports

pub use crate::error::{EngineError, EngineResult};
pub use crate::node::{Node, NodeLogic};
pub use crate::nodes::{NodeFn, Splitter, TypedNode, TypedPairNode};
pub use crate::pad::{Pad, PadKind, DEFAULT_QUEUE_CAPACITY};
pub use crate::packet::{Packet, PacketExt, PacketRef};
pub use crate::pipeline::Pipeline;
