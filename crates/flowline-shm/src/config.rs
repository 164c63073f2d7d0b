//! Region configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ShmError, ShmResult};

/// Default region size (1 MiB), matching the publisher's historical default.
pub const DEFAULT_REGION_SIZE: usize = 1024 * 1024;

/// Default ring capacity in slots.
pub const DEFAULT_RING_CAPACITY: u32 = 1;

/// Configuration of a shared-memory packet region.
///
/// # Sizing
///
/// The byte arena behind the slot array is a wrapping cursor without a
/// live-range check: if `size` cannot hold `capacity` serialized packets of
/// the largest size in flight, a write may overlap a not-yet-read payload.
/// Sizing the region for `capacity × max_packet_size` (plus header and slot
/// array) is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// OS-global region name (no interior `/`).
    pub name: String,
    /// Total region size in bytes, header and slot array included.
    pub size: usize,
    /// Number of ring slots.
    pub capacity: u32,
}

impl RegionConfig {
    /// Configuration with default size and capacity.
    pub fn new(name: impl Into<String>) -> Self {
        RegionConfig {
            name: name.into(),
            size: DEFAULT_REGION_SIZE,
            capacity: DEFAULT_RING_CAPACITY,
        }
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RegionConfigBuilder {
        RegionConfigBuilder {
            config: RegionConfig::new(name),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable name, a zero capacity, a zero size,
    /// or a size that does not fit the region header's 32-bit size field.
    pub fn validate(&self) -> ShmResult<()> {
        if self.name.is_empty() {
            return Err(ShmError::invalid_config("region name must not be empty"));
        }
        if self.name.contains('/') {
            return Err(ShmError::invalid_config(
                "region name must not contain `/`",
            ));
        }
        if self.name.contains('\0') {
            return Err(ShmError::invalid_config(
                "region name must not contain NUL",
            ));
        }
        if self.capacity == 0 {
            return Err(ShmError::invalid_config("capacity must be at least 1"));
        }
        if self.size == 0 {
            return Err(ShmError::invalid_config("size must be nonzero"));
        }
        if self.size > u32::MAX as usize {
            return Err(ShmError::invalid_config(
                "size must fit the header's 32-bit size field",
            ));
        }
        Ok(())
    }
}

/// Builder for [`RegionConfig`].
#[derive(Debug)]
pub struct RegionConfigBuilder {
    config: RegionConfig,
}

impl RegionConfigBuilder {
    /// Set the total region size in bytes.
    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.config.size = size;
        self
    }

    /// Set the ring capacity in slots.
    #[must_use]
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> ShmResult<RegionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegionConfig::new("telemetry");
        assert_eq!(config.size, DEFAULT_REGION_SIZE);
        assert_eq!(config.capacity, DEFAULT_RING_CAPACITY);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_builder() {
        let config = RegionConfig::builder("telemetry")
            .size(4096)
            .capacity(8)
            .build()
            .expect("valid config");
        assert_eq!(config.size, 4096);
        assert_eq!(config.capacity, 8);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RegionConfig::new("").validate().is_err());
        assert!(RegionConfig::new("a/b").validate().is_err());
        assert!(RegionConfig::builder("x").capacity(0).build().is_err());
        assert!(RegionConfig::builder("x").size(0).build().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RegionConfig::builder("wire")
            .size(2048)
            .capacity(16)
            .build()
            .expect("valid config");
        let json = serde_json::to_string(&config).expect("serialize");
        let back: RegionConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
