//! Per-topic fade entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use libp2p::PeerId;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::output::OutputQueue;
use crate::record::PeerRecord;

/// Last known state of one peer under one topic
#[derive(Debug, Clone)]
struct FadeEntry {
    record: PeerRecord,
    last_seen: Instant,
}

/// Entry set and attached outputs for one topic.
///
/// Lock order is `entries` then `outputs`; forwarding happens with the
/// entry lock held so updates for one peer reach outputs in the order they
/// were accepted.
pub(crate) struct TopicFade {
    name: String,
    decay_window: Duration,
    entries: Mutex<HashMap<PeerId, FadeEntry>>,
    outputs: Mutex<Vec<Arc<OutputQueue>>>,
}

impl TopicFade {
    pub(crate) fn new(name: String, decay_window: Duration) -> Self {
        Self {
            name,
            decay_window,
            entries: Mutex::new(HashMap::new()),
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Record a sighting. Returns whether it was forwarded to the outputs.
    pub(crate) fn observe(&self, record: PeerRecord) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.evict_stale(&mut entries, now);

        if let Some(entry) = entries.get_mut(&record.peer_id) {
            if entry.record.same_sighting(&record) {
                entry.last_seen = now;
                entry.record.discovered_at = record.discovered_at;
                trace!(topic = %self.name, peer_id = %record.peer_id, "duplicate sighting suppressed");
                return false;
            }
        }

        entries.insert(record.peer_id, FadeEntry { record: record.clone(), last_seen: now });
        self.forward(record);
        true
    }

    /// Non-stale records currently known for this topic
    pub(crate) fn snapshot(&self) -> Vec<PeerRecord> {
        let mut entries = self.entries.lock();
        self.evict_stale(&mut entries, Instant::now());
        entries.values().map(|entry| entry.record.clone()).collect()
    }

    /// Attach an output, seeding it with the peers already known
    pub(crate) fn attach(&self, queue: Arc<OutputQueue>) {
        let mut entries = self.entries.lock();
        self.evict_stale(&mut entries, Instant::now());

        let mut outputs = self.outputs.lock();
        for entry in entries.values() {
            queue.push(entry.record.clone());
        }
        outputs.push(queue);
    }

    pub(crate) fn detach(&self, queue: &Arc<OutputQueue>) {
        self.outputs.lock().retain(|attached| !Arc::ptr_eq(attached, queue));
    }

    pub(crate) fn output_count(&self) -> usize {
        self.outputs.lock().iter().filter(|queue| !queue.is_closed()).count()
    }

    fn forward(&self, record: PeerRecord) {
        let mut outputs = self.outputs.lock();
        outputs.retain(|queue| !queue.is_closed());
        for queue in outputs.iter() {
            queue.push(record.clone());
        }
    }

    fn evict_stale(&self, entries: &mut HashMap<PeerId, FadeEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_seen) <= self.decay_window);

        let evicted = before - entries.len();
        if evicted > 0 {
            trace!(topic = %self.name, evicted, "stale fade entries evicted");
        }
    }
}
