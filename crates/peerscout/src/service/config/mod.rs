//! Service configuration for PeerScout.
//!
//! This module defines the configuration options for the discovery service
//! and its fade registry.

mod methods;
mod types;

pub use types::{FadeConfig, ServiceConfig, ServiceConfigBuilder};
