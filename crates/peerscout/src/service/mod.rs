//! Discovery service for PeerScout.
//!
//! The service owns the configured drivers and the fade registry. It fans
//! lookups and watches out to every driver, routes the resulting streams
//! into the registry and hands consumers a [`Subscription`] per topic.

pub mod config;
pub mod events;
mod fanout;
mod subscription;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::driver::Driver;
use crate::fade::FadeRegistry;
use crate::record::PeerRecord;

pub use config::{FadeConfig, ServiceConfig, ServiceConfigBuilder};
pub use events::{DiscoveryEvent, DriverOutcome, Operation};
pub use subscription::Subscription;

/// Aggregating discovery service. Cheap to clone; clones share drivers and
/// fade entries.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

struct Inner {
    drivers: Vec<Arc<dyn Driver>>,
    fade: Arc<FadeRegistry>,
    events: broadcast::Sender<DiscoveryEvent>,
    config: ServiceConfig,
}

impl Service {
    /// Create a service over `drivers` with the default configuration
    pub fn new(drivers: Vec<Arc<dyn Driver>>) -> Self {
        Self::with_config(drivers, ServiceConfig::default())
    }

    /// Create a service over `drivers` with a custom configuration
    pub fn with_config(drivers: Vec<Arc<dyn Driver>>, config: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let fade = FadeRegistry::new(config.fade.clone());

        info!(
            drivers = ?drivers.iter().map(|driver| driver.name()).collect::<Vec<_>>(),
            decay_window = ?config.fade.decay_window,
            capacity = config.fade.capacity,
            "discovery service created"
        );

        Self { inner: Arc::new(Inner { drivers, fade, events, config }) }
    }

    /// Start building a service
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::default()
    }

    /// Subscribe to `topic`.
    ///
    /// Starts a background watch across every driver and returns right
    /// away. A watch that cannot start is logged, never returned; the
    /// subscription then only receives records from [`Subscription::pull`].
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let token = CancellationToken::new();
        let out = self.inner.fade.open_output(token.clone(), &topic);

        let service = self.clone();
        let watch_token = token.clone();
        let watch_topic = topic.clone();
        tokio::spawn(async move {
            if let Err(error) = service.watch_topic(&watch_token, &watch_topic).await {
                error!(topic = %watch_topic, %error, "unable to watch topic");
            }
        });

        Subscription::new(self.clone(), token, topic, out)
    }

    /// Names of the configured drivers, in registration order
    pub fn driver_names(&self) -> Vec<&str> {
        self.inner.drivers.iter().map(|driver| driver.name()).collect()
    }

    /// Peers currently known for `topic` that have not faded out
    pub fn known_peers(&self, topic: &str) -> Vec<PeerRecord> {
        self.inner.fade.known_peers(topic)
    }

    /// Listen for per-driver diagnostic events
    pub fn events(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.inner.events.subscribe()
    }

    pub fn fade(&self) -> &Arc<FadeRegistry> {
        &self.inner.fade
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("drivers", &self.driver_names())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for Service
#[derive(Default)]
pub struct ServiceBuilder {
    drivers: Vec<Arc<dyn Driver>>,
    config: ServiceConfig,
}

impl ServiceBuilder {
    /// Register a driver
    pub fn driver<D: Driver + 'static>(mut self, driver: D) -> Self {
        self.drivers.push(Arc::new(driver));
        self
    }

    /// Set the configuration
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service
    pub fn build(self) -> Service {
        Service::with_config(self.drivers, self.config)
    }
}
