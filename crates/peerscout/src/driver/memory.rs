//! In-process rendezvous point and the driver that talks to it.
//!
//! Peers advertise themselves on a [`MemoryRendezvous`] under a topic; any
//! number of [`MemoryDriver`]s sharing that rendezvous can then look the
//! topic up or watch it for new announcements. Useful for tests, demos and
//! single-process setups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use libp2p::PeerId;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Driver, PeerStream};
use crate::error::DriverError;
use crate::record::PeerRecord;

/// Announcements buffered per topic before slow watchers start lagging
const ANNOUNCEMENT_BUFFER: usize = 256;

/// Shared in-memory registry of advertised peers, keyed by topic
#[derive(Debug, Clone, Default)]
pub struct MemoryRendezvous {
    boards: Arc<Mutex<HashMap<String, TopicBoard>>>,
}

#[derive(Debug)]
struct TopicBoard {
    peers: HashMap<PeerId, PeerRecord>,
    announcements: broadcast::Sender<PeerRecord>,
}

impl TopicBoard {
    fn new() -> Self {
        let (announcements, _) = broadcast::channel(ANNOUNCEMENT_BUFFER);
        Self { peers: HashMap::new(), announcements }
    }
}

impl MemoryRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `record` under `topic` and notify every active watcher
    pub fn advertise(&self, topic: &str, record: PeerRecord) {
        let mut boards = self.boards.lock();
        let board = boards.entry(topic.to_owned()).or_insert_with(TopicBoard::new);
        board.peers.insert(record.peer_id, record.clone());

        // nobody watching is fine
        let _ = board.announcements.send(record);
    }

    /// Peers currently registered under `topic`
    pub fn peers(&self, topic: &str) -> Vec<PeerRecord> {
        self.boards
            .lock()
            .get(topic)
            .map(|board| board.peers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live watch streams on `topic`
    pub fn watcher_count(&self, topic: &str) -> usize {
        self.boards
            .lock()
            .get(topic)
            .map(|board| board.announcements.receiver_count())
            .unwrap_or(0)
    }

    /// Create a driver backed by this rendezvous
    pub fn driver(&self, name: impl Into<String>) -> MemoryDriver {
        MemoryDriver {
            name: name.into(),
            rendezvous: self.clone(),
            lookup: Mode::Serve,
            watch: Mode::Serve,
        }
    }

    // Subscribing before taking the snapshot means nothing advertised in
    // between is missed; duplicates are absorbed downstream.
    fn snapshot_and_watch(&self, topic: &str) -> (Vec<PeerRecord>, broadcast::Receiver<PeerRecord>) {
        let mut boards = self.boards.lock();
        let board = boards.entry(topic.to_owned()).or_insert_with(TopicBoard::new);
        let receiver = board.announcements.subscribe();
        (board.peers.values().cloned().collect(), receiver)
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Serve,
    Decline,
    Fail(String),
}

impl Mode {
    fn check(&self) -> Result<(), DriverError> {
        match self {
            Mode::Serve => Ok(()),
            Mode::Decline => Err(DriverError::NotSupported),
            Mode::Fail(message) => Err(DriverError::failed(message)),
        }
    }
}

/// Driver that looks up and watches a [`MemoryRendezvous`]
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    name: String,
    rendezvous: MemoryRendezvous,
    lookup: Mode,
    watch: Mode,
}

impl MemoryDriver {
    /// Answer lookups with `NotSupported`
    pub fn decline_lookup(mut self) -> Self {
        self.lookup = Mode::Decline;
        self
    }

    /// Answer watches with `NotSupported`
    pub fn decline_watch(mut self) -> Self {
        self.watch = Mode::Decline;
        self
    }

    /// Fail every lookup with `message`
    pub fn fail_lookup(mut self, message: impl Into<String>) -> Self {
        self.lookup = Mode::Fail(message.into());
        self
    }

    /// Fail every watch with `message`
    pub fn fail_watch(mut self, message: impl Into<String>) -> Self {
        self.watch = Mode::Fail(message.into());
        self
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_peers(
        &self,
        _token: CancellationToken,
        topic: &str,
    ) -> Result<PeerStream, DriverError> {
        self.lookup.check()?;

        let peers = self.rendezvous.peers(topic);
        debug!(driver = %self.name, topic, count = peers.len(), "memory lookup");
        Ok(stream::iter(peers).boxed())
    }

    async fn subscribe(
        &self,
        token: CancellationToken,
        topic: &str,
    ) -> Result<PeerStream, DriverError> {
        self.watch.check()?;

        let (snapshot, receiver) = self.rendezvous.snapshot_and_watch(topic);
        let live = stream::unfold((receiver, token), |(mut receiver, token)| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return None,
                    received = receiver.recv() => match received {
                        Ok(record) => return Some((record, (receiver, token))),
                        Err(RecvError::Lagged(skipped)) => {
                            trace!(skipped, "watcher lagged behind announcements");
                        },
                        Err(RecvError::Closed) => return None,
                    },
                }
            }
        });

        Ok(stream::iter(snapshot).chain(live).boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use libp2p::Multiaddr;
    use tokio::time::timeout;

    use super::*;

    fn record(port: u16) -> PeerRecord {
        let addr: Multiaddr = format!("/ip4/10.0.0.1/tcp/{port}").parse().unwrap();
        PeerRecord::new(PeerId::random(), vec![addr])
    }

    #[tokio::test]
    async fn lookup_returns_snapshot_then_ends() {
        let rendezvous = MemoryRendezvous::new();
        rendezvous.advertise("chat", record(1));
        rendezvous.advertise("chat", record(2));
        rendezvous.advertise("other", record(3));

        let driver = rendezvous.driver("mem");
        let stream = driver.find_peers(CancellationToken::new(), "chat").await.unwrap();
        let peers: Vec<_> = stream.collect().await;

        assert_eq!(peers.len(), 2);
    }

    #[tokio::test]
    async fn watch_delivers_live_announcements_until_cancelled() {
        let rendezvous = MemoryRendezvous::new();
        let driver = rendezvous.driver("mem");
        let token = CancellationToken::new();

        let mut stream = driver.subscribe(token.clone(), "chat").await.unwrap();
        assert_eq!(rendezvous.watcher_count("chat"), 1);

        let announced = record(7);
        rendezvous.advertise("chat", announced.clone());
        let received = timeout(Duration::from_secs(1), stream.next()).await.unwrap();
        assert_eq!(received, Some(announced));

        token.cancel();
        let ended = timeout(Duration::from_secs(1), stream.next()).await.unwrap();
        assert_eq!(ended, None);

        drop(stream);
        assert_eq!(rendezvous.watcher_count("chat"), 0);
    }

    #[tokio::test]
    async fn configured_modes_are_reported() {
        let rendezvous = MemoryRendezvous::new();
        let declining = rendezvous.driver("a").decline_lookup();
        let failing = rendezvous.driver("b").fail_watch("unreachable");

        let declined = declining.find_peers(CancellationToken::new(), "chat").await;
        assert!(matches!(declined, Err(DriverError::NotSupported)));

        let failed = failing.subscribe(CancellationToken::new(), "chat").await;
        assert!(matches!(failed, Err(DriverError::Failed(_))));
    }
}
