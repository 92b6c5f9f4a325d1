use thiserror::Error;

use crate::service::Operation;

/// Outcome of a driver that could not start a lookup or watch
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver has no mechanism for this topic or operation. Callers skip
    /// the driver instead of treating this as a failure.
    #[error("operation not supported by driver")]
    NotSupported,

    /// A genuine, driver-local failure
    #[error("{0:#}")]
    Failed(#[from] anyhow::Error),
}

impl DriverError {
    /// Build a failure from any displayable message
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(anyhow::anyhow!("{message}"))
    }
}

/// Aggregate errors surfaced by the discovery service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Every configured driver declined or failed to start
    #[error("no driver(s) were available for {operation} on topic `{topic}`")]
    NoDriverAvailable { operation: Operation, topic: String },

    /// The scope the call ran under was cancelled before any driver started
    #[error("{operation} on topic `{topic}` was cancelled")]
    Cancelled { operation: Operation, topic: String },
}
