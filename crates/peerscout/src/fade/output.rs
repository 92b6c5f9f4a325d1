//! Consumer-facing end of a topic's fade entry.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use futures::{Stream, StreamExt};
use hashlink::LinkedHashMap;
use libp2p::PeerId;
use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::trace;

use super::topic::TopicFade;
use super::TopicLease;
use crate::record::PeerRecord;

/// Bounded, lossy queue between the feed loops and one reader.
///
/// Pushing never waits: once `capacity` distinct peers are pending, the
/// oldest pending record is evicted.
pub(crate) struct OutputQueue {
    token: CancellationToken,
    capacity: usize,
    pending: Mutex<LinkedHashMap<PeerId, PeerRecord>>,
    dropped: AtomicU64,
    waker: AtomicWaker,
}

impl OutputQueue {
    pub(crate) fn new(token: CancellationToken, capacity: usize) -> Self {
        Self {
            token,
            capacity: capacity.max(1),
            pending: Mutex::new(LinkedHashMap::new()),
            dropped: AtomicU64::new(0),
            waker: AtomicWaker::new(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn push(&self, record: PeerRecord) {
        if self.is_closed() {
            return;
        }

        let evicted = {
            let mut pending = self.pending.lock();
            // a newer record for a pending peer replaces it at the back
            pending.remove(&record.peer_id);
            pending.insert(record.peer_id, record);
            if pending.len() > self.capacity {
                pending.pop_front()
            } else {
                None
            }
        };

        if let Some((peer_id, _)) = evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(%peer_id, "output full, evicted oldest pending record");
        }

        self.waker.wake();
    }

    fn pop(&self) -> Option<PeerRecord> {
        self.pending.lock().pop_front().map(|(_, record)| record)
    }

    fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Merged, deduplicated peer stream for one topic.
///
/// Ends once the cancellation token it was opened with is cancelled; no
/// record is yielded after that.
pub struct FadeOut {
    queue: Arc<OutputQueue>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    topic: Arc<TopicFade>,
    // taken once the output is closed, releasing the topic entry
    lease: Option<TopicLease>,
}

impl FadeOut {
    pub(crate) fn new(queue: Arc<OutputQueue>, lease: TopicLease) -> Self {
        let cancelled = Box::pin(queue.token.clone().cancelled_owned());
        let topic = lease.fade().clone();
        Self { queue, cancelled, topic, lease: Some(lease) }
    }

    /// Wait for the next peer record, or `None` once the output is closed
    pub async fn recv(&mut self) -> Option<PeerRecord> {
        self.next().await
    }

    /// Take a pending record without waiting
    pub fn try_recv(&mut self) -> Option<PeerRecord> {
        if self.queue.is_closed() {
            self.release();
            return None;
        }
        self.queue.pop()
    }

    /// Topic this output belongs to
    pub fn topic(&self) -> &str {
        self.topic.name()
    }

    /// Records waiting to be read
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Records evicted because the reader fell behind
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Detach from the topic and give up the lease on its entry.
    ///
    /// Called when the owner closes, and whenever a read notices the token
    /// was cancelled. Later calls do nothing.
    pub(crate) fn release(&mut self) {
        if let Some(lease) = self.lease.take() {
            lease.fade().detach(&self.queue);
            self.queue.pending.lock().clear();
            trace!(topic = self.topic.name(), "fade output released");
        }
    }
}

impl Stream for FadeOut {
    type Item = PeerRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.queue.is_closed() || self.cancelled.as_mut().poll(cx).is_ready() {
            self.release();
            return Poll::Ready(None);
        }

        // register before checking so a concurrent push is not missed
        self.queue.waker.register(cx.waker());
        match self.queue.pop() {
            Some(record) => Poll::Ready(Some(record)),
            None => Poll::Pending,
        }
    }
}

impl Drop for FadeOut {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FadeOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FadeOut")
            .field("topic", &self.topic.name())
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .field("closed", &self.is_closed())
            .finish()
    }
}
