//! Service configuration methods for PeerScout.

use std::time::Duration;

use super::types::{FadeConfig, ServiceConfig, ServiceConfigBuilder};

impl FadeConfig {
    /// Set the decay window
    pub fn with_decay_window(mut self, window: Duration) -> Self {
        self.decay_window = window;
        self
    }

    /// Set the per-output capacity (at least one)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

impl ServiceConfig {
    /// Replace the fade registry parameters
    pub fn with_fade(mut self, fade: FadeConfig) -> Self {
        self.fade = fade;
        self
    }

    /// Set the diagnostic event buffer size (at least one)
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl ServiceConfigBuilder {
    /// Build the configuration
    pub fn build(self) -> ServiceConfig {
        self.config
    }

    /// Set the decay window
    pub fn decay_window(mut self, window: Duration) -> Self {
        self.config.fade.decay_window = window;
        self
    }

    /// Set the per-output capacity
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.config.fade.capacity = capacity.max(1);
        self
    }

    /// Set the diagnostic event buffer size
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }
}
