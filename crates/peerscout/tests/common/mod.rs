//! Shared test utilities for peerscout tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use libp2p::{Multiaddr, PeerId};
use peerscout::{CancellationToken, Driver, DriverError, PeerRecord, PeerStream};

/// Install a test subscriber once per binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Loopback TCP address on `port`
pub fn addr(port: u16) -> Multiaddr {
    format!("/ip4/127.0.0.1/tcp/{port}").parse().expect("valid multiaddr")
}

/// Record for a fresh random peer
pub fn random_record(port: u16) -> PeerRecord {
    PeerRecord::new(PeerId::random(), vec![addr(port)])
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Run `future` with a one second limit
pub async fn within_second<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), future)
        .await
        .expect("operation did not finish within a second")
}

/// Decrements the shared counter when a stream is dropped
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn hold(&self) {}
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Driver that emits a burst of distinct peers and then keeps its stream
/// open, counting how many of its streams are alive.
#[derive(Clone)]
pub struct FloodDriver {
    name: String,
    burst: usize,
    live: Arc<AtomicUsize>,
}

impl FloodDriver {
    pub fn new(name: &str, burst: usize) -> Self {
        Self { name: name.to_string(), burst, live: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn open(&self) -> PeerStream {
        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(self.live.clone());

        let burst: Vec<PeerRecord> = (0..self.burst).map(|i| random_record(10_000 + i as u16)).collect();
        let tail = stream::pending::<PeerRecord>().map(move |record| {
            guard.hold();
            record
        });
        stream::iter(burst).chain(tail).boxed()
    }
}

#[async_trait]
impl Driver for FloodDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_peers(
        &self,
        _token: CancellationToken,
        _topic: &str,
    ) -> Result<PeerStream, DriverError> {
        Ok(self.open())
    }

    async fn subscribe(
        &self,
        _token: CancellationToken,
        _topic: &str,
    ) -> Result<PeerStream, DriverError> {
        Ok(self.open())
    }
}
