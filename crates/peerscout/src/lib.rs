//! PeerScout - topic-based peer discovery aggregation
//!
//! This library merges the output of any number of pluggable discovery
//! drivers into one deduplicated, decaying peer stream per topic.

use std::time::Duration;

pub mod driver;
pub mod error;
pub mod fade;
pub mod record;
pub mod service;

// Re-export main types
pub use driver::{Driver, MemoryDriver, MemoryRendezvous, PeerStream, StaticDriver};
pub use error::{DiscoveryError, DriverError};
pub use fade::{FadeOut, FadeRegistry, FeedStats};
pub use record::PeerRecord;
pub use service::{
    DiscoveryEvent, DriverOutcome, FadeConfig, Operation, Service, ServiceBuilder, ServiceConfig,
    ServiceConfigBuilder, Subscription,
};

/// Re-export the cancellation primitive used across the public API
pub use tokio_util::sync::CancellationToken;

/// How long a peer sighting stays fresh without being re-announced
pub const DEFAULT_DECAY_WINDOW: Duration = Duration::from_secs(60);

/// Number of distinct peers buffered for a consumer that is not draining
pub const DEFAULT_OUTPUT_CAPACITY: usize = 16;

/// Number of diagnostic events retained for slow event listeners
pub const DEFAULT_EVENT_CAPACITY: usize = 64;
