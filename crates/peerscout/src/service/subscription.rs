//! Consumer handle for one topic.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Service;
use crate::error::DiscoveryError;
use crate::fade::FadeOut;

/// A live subscription to one topic.
///
/// Owns the cancellation scope every task started on its behalf runs under.
/// Closing or dropping it stops the background watch, every feed loop and
/// the output stream.
pub struct Subscription {
    service: Service,
    token: CancellationToken,
    topic: String,
    out: FadeOut,
}

impl Subscription {
    pub(crate) fn new(service: Service, token: CancellationToken, topic: String, out: FadeOut) -> Self {
        Self { service, token, topic, out }
    }

    /// The merged peer stream for this topic
    pub fn out(&mut self) -> &mut FadeOut {
        &mut self.out
    }

    /// Run one more lookup across every driver for this topic.
    ///
    /// Results arrive on [`Subscription::out`]; the returned error only says
    /// whether any driver could start the lookup.
    pub async fn pull(&self) -> Result<(), DiscoveryError> {
        self.service.lookup_peers(&self.token, &self.topic).await
    }

    /// Cancel the subscription scope and release the topic entry held by
    /// its output. Calling it again is a no-op.
    pub fn close(&mut self) {
        if !self.token.is_cancelled() {
            debug!(topic = %self.topic, "closing subscription");
            self.token.cancel();
        }
        self.out.release();
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("closed", &self.is_closed())
            .field("out", &self.out)
            .finish()
    }
}
