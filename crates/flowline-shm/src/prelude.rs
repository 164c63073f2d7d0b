//! Prelude module for convenient imports

pub use crate::config::{RegionConfig, RegionConfigBuilder};
pub use crate::error::{ShmError, ShmResult};
#[cfg(target_os = "linux")]
pub use crate::publisher::{PublisherChannels, SharedMemoryPublisher};
#[cfg(target_os = "linux")]
pub use crate::subscriber::{PacketFactory, SharedMemorySubscriber};
