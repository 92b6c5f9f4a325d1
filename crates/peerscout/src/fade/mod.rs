//! Fade registry: per-topic fan-in with deduplication and decay.
//!
//! Every driver stream for a topic is fed into the same entry set. A record
//! is forwarded to the topic's outputs only when the peer is new or its
//! address set changed; unchanged sightings just refresh the entry. Entries
//! that are not refreshed within the decay window fade out, so a later
//! announcement of the same peer is delivered again.
//!
//! Producers never wait on consumers: each output is a bounded queue that
//! evicts its oldest pending record on overflow.

mod output;
mod topic;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::driver::PeerStream;
use crate::record::PeerRecord;
use crate::service::FadeConfig;

pub use output::FadeOut;
use output::OutputQueue;
use topic::TopicFade;

/// Counters for one finished feed loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Records read from the input stream
    pub received: u64,

    /// Records that were new or changed and reached the outputs
    pub forwarded: u64,
}

struct TopicSlot {
    fade: Arc<TopicFade>,
    leases: usize,
}

/// Shared merge point for all topics of one service
pub struct FadeRegistry {
    config: FadeConfig,
    topics: Mutex<HashMap<String, TopicSlot>>,
}

impl FadeRegistry {
    pub fn new(config: FadeConfig) -> Arc<Self> {
        Arc::new(Self { config, topics: Mutex::new(HashMap::new()) })
    }

    /// Open a new output for `topic`, creating the topic entry if needed.
    ///
    /// The output is seeded with every peer already known for the topic and
    /// ends when `token` is cancelled.
    pub fn open_output(self: &Arc<Self>, token: CancellationToken, topic: &str) -> FadeOut {
        let lease = self.acquire(topic);
        let queue = Arc::new(OutputQueue::new(token, self.config.capacity));
        lease.fade().attach(queue.clone());
        debug!(topic, capacity = self.config.capacity, "fade output opened");
        FadeOut::new(queue, lease)
    }

    /// Build the feed loop for one input stream.
    ///
    /// The topic entry is created right away, so it exists as soon as this
    /// returns; the loop itself runs when the future is polled and ends when
    /// the stream ends or `token` is cancelled.
    pub fn feed(
        self: &Arc<Self>,
        token: CancellationToken,
        topic: &str,
        mut stream: PeerStream,
    ) -> impl Future<Output = FeedStats> + Send + 'static {
        let lease = self.acquire(topic);

        async move {
            let mut stats = FeedStats::default();
            loop {
                let record = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = stream.next() => match next {
                        Some(record) => record,
                        None => break,
                    },
                };

                stats.received += 1;
                if lease.fade().observe(record) {
                    stats.forwarded += 1;
                }
            }

            debug!(
                topic = lease.fade().name(),
                received = stats.received,
                forwarded = stats.forwarded,
                cancelled = token.is_cancelled(),
                "feed finished"
            );
            stats
        }
    }

    /// Non-stale peers known for `topic`
    pub fn known_peers(&self, topic: &str) -> Vec<PeerRecord> {
        let fade = self.topics.lock().get(topic).map(|slot| slot.fade.clone());
        fade.map(|fade| fade.snapshot()).unwrap_or_default()
    }

    /// Number of topics with at least one live output or feed
    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }

    pub fn is_tracking(&self, topic: &str) -> bool {
        self.topics.lock().contains_key(topic)
    }

    /// Number of open outputs attached to `topic`
    pub fn output_count(&self, topic: &str) -> usize {
        let fade = self.topics.lock().get(topic).map(|slot| slot.fade.clone());
        fade.map(|fade| fade.output_count()).unwrap_or(0)
    }

    fn acquire(self: &Arc<Self>, topic: &str) -> TopicLease {
        let mut topics = self.topics.lock();
        let slot = topics.entry(topic.to_owned()).or_insert_with(|| {
            debug!(topic, "fade entry created");
            TopicSlot {
                fade: Arc::new(TopicFade::new(topic.to_owned(), self.config.decay_window)),
                leases: 0,
            }
        });
        slot.leases += 1;

        TopicLease { registry: Arc::clone(self), fade: slot.fade.clone() }
    }

    fn release(&self, fade: &Arc<TopicFade>) {
        let mut topics = self.topics.lock();
        let Some(slot) = topics.get_mut(fade.name()) else {
            return;
        };
        if !Arc::ptr_eq(&slot.fade, fade) {
            return;
        }

        slot.leases -= 1;
        if slot.leases == 0 {
            topics.remove(fade.name());
            debug!(topic = fade.name(), "fade entry released");
        }
    }
}

impl std::fmt::Debug for FadeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FadeRegistry")
            .field("config", &self.config)
            .field("topics", &self.topic_count())
            .finish()
    }
}

/// Keeps a topic entry alive; the entry and its fade entries are dropped
/// with the last lease.
pub(crate) struct TopicLease {
    registry: Arc<FadeRegistry>,
    fade: Arc<TopicFade>,
}

impl TopicLease {
    pub(crate) fn fade(&self) -> &Arc<TopicFade> {
        &self.fade
    }
}

impl Drop for TopicLease {
    fn drop(&mut self) {
        self.registry.release(&self.fade);
    }
}
