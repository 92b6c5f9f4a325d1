//! Discovery drivers for PeerScout.
//!
//! A driver is one discovery backend (local network announcements, a DHT, a
//! rendezvous server, ...). The service only talks to drivers through the
//! [`Driver`] trait and never inspects their concrete type.

pub mod fixed;
pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::DriverError;
use crate::record::PeerRecord;

pub use fixed::StaticDriver;
pub use memory::{MemoryDriver, MemoryRendezvous};

/// Stream of peer records delivered by a driver
pub type PeerStream = BoxStream<'static, PeerRecord>;

/// A pluggable discovery backend.
///
/// Both operations must return promptly; any long-running work happens
/// behind the returned stream. Returning [`DriverError::NotSupported`] tells
/// the caller to skip this driver.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Stable identifier used in diagnostics
    fn name(&self) -> &str;

    /// One-shot lookup. The stream ends once the lookup round completes.
    async fn find_peers(
        &self,
        _token: CancellationToken,
        _topic: &str,
    ) -> Result<PeerStream, DriverError> {
        Err(DriverError::NotSupported)
    }

    /// Continuous watch. The stream stays open until `token` is cancelled.
    async fn subscribe(
        &self,
        _token: CancellationToken,
        _topic: &str,
    ) -> Result<PeerStream, DriverError> {
        Err(DriverError::NotSupported)
    }
}
