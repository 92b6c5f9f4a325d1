//! Service configuration types for PeerScout.
//!
//! This module defines the configuration data structures for the discovery
//! service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_DECAY_WINDOW, DEFAULT_EVENT_CAPACITY, DEFAULT_OUTPUT_CAPACITY};

/// Deduplication and buffering parameters of the fade registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    /// How long an entry stays fresh without a new sighting
    #[serde(rename = "decay_window_secs", with = "duration_secs")]
    pub decay_window: Duration,

    /// Distinct peers buffered per output before the oldest is evicted
    pub capacity: usize,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self { decay_window: DEFAULT_DECAY_WINDOW, capacity: DEFAULT_OUTPUT_CAPACITY }
    }
}

/// Configuration options for the discovery service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Diagnostic events retained for slow event listeners
    pub event_capacity: usize,

    /// Fade registry parameters
    pub fade: FadeConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { event_capacity: DEFAULT_EVENT_CAPACITY, fade: FadeConfig::default() }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

/// Builder for ServiceConfig
#[derive(Default)]
pub struct ServiceConfigBuilder {
    pub(crate) config: ServiceConfig,
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
