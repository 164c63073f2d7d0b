//! Shared-memory SPSC packet channel for flowline pipelines.
//!
//! This crate bridges two pipelines running in separate processes through a
//! named shared-memory region: a single-producer/single-consumer ring of
//! variable-length packet slots, coordinated by a robust process-shared
//! mutex and two process-shared condition variables.
//!
//! # Architecture
//!
//! - [`config`]: region configuration (name, size, slot capacity)
//! - [`layout`]: the wire layout (header, slot array, byte arena)
//! - [`sync`]: robust process-shared mutex and condvar plumbing
//! - [`region`]: mapping lifecycle for the owning and attaching side
//! - [`publisher`]: node behavior serializing packets into the ring
//! - [`subscriber`]: node behavior draining the ring into a local graph
//! - [`error`]: channel error types
//!
//! # Session model
//!
//! The publisher creates the region (replacing any stale one), initializes
//! the header and publishes `is_valid` last. Subscribers attach whenever the
//! region appears, verify `is_valid`, and survive publisher crashes through
//! the robust mutex: an owner-dead acquisition makes them detach, back off
//! and re-enter the attach loop until a fresh session exists.
//!
//! # Platform support
//!
//! The channel needs POSIX named shared memory, robust process-shared
//! mutexes and process-shared condition variables, and is therefore only
//! compiled on Linux. [`config`] and [`error`] are portable.
//!
//! # Example
//!
//! ```no_run
//! use flowline_engine::prelude::*;
//! use flowline_shm::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Reading(u32);
//! impl Packet for Reading {
//!     fn serialize_to(&self, buf: &mut [u8]) -> Option<usize> {
//!         buf.get_mut(..4)?.copy_from_slice(&self.0.to_ne_bytes());
//!         Some(4)
//!     }
//!     fn deserialize_from(&mut self, buf: &[u8]) -> bool {
//!         match buf.get(..4) {
//!             Some(bytes) => {
//!                 self.0 = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
//!                 true
//!             }
//!             None => false,
//!         }
//!     }
//! }
//!
//! // Publishing process.
//! let mut pipeline = Pipeline::new();
//! let config = RegionConfig::builder("sensor-feed").size(4096).capacity(8).build().unwrap();
//! let publisher = pipeline.add_node(SharedMemoryPublisher::new(config));
//! let channel = publisher.add_channel("channel1");
//! pipeline.start().unwrap();
//! channel.push(Arc::new(Reading(42)), Duration::from_millis(200));
//!
//! // Subscribing process (typically elsewhere).
//! let mut other = Pipeline::new();
//! let subscriber = other.add_node(SharedMemorySubscriber::for_packet::<Reading>("sensor-feed"));
//! subscriber.add_output("channel1");
//! other.start().unwrap();
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
#[cfg(target_os = "linux")]
pub mod layout;
pub mod prelude;
#[cfg(target_os = "linux")]
pub mod publisher;
#[cfg(target_os = "linux")]
pub mod region;
#[cfg(target_os = "linux")]
pub mod subscriber;
#[cfg(target_os = "linux")]
pub mod sync;

pub use config::{RegionConfig, RegionConfigBuilder, DEFAULT_REGION_SIZE, DEFAULT_RING_CAPACITY};
pub use error::{ShmError, ShmResult};
#[cfg(target_os = "linux")]
pub use publisher::{PublisherChannels, SharedMemoryPublisher};
#[cfg(target_os = "linux")]
pub use subscriber::{PacketFactory, SharedMemorySubscriber};
