//! Concurrent lookup and watch across all drivers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::events::{DiscoveryEvent, DriverOutcome, Operation};
use super::{Inner, Service};
use crate::driver::Driver;
use crate::error::{DiscoveryError, DriverError};

impl Service {
    /// Run a one-shot lookup for `topic` on every driver.
    ///
    /// Returns once every driver has started, declined or failed; the
    /// started streams keep feeding the topic in the background until they
    /// end or `token` is cancelled. Fails only when no driver started.
    pub async fn lookup_peers(
        &self,
        token: &CancellationToken,
        topic: &str,
    ) -> Result<(), DiscoveryError> {
        let started = self.fan_out(token, topic, Operation::Lookup).await;
        if started > 0 {
            return Ok(());
        }

        if token.is_cancelled() {
            Err(DiscoveryError::Cancelled { operation: Operation::Lookup, topic: topic.to_owned() })
        } else {
            Err(DiscoveryError::NoDriverAvailable {
                operation: Operation::Lookup,
                topic: topic.to_owned(),
            })
        }
    }

    /// Watch `topic` on every driver for as long as `token` is live.
    ///
    /// Returns early with an error only when no driver could establish a
    /// watch; otherwise returns `Ok` once `token` is cancelled.
    pub async fn watch_topic(
        &self,
        token: &CancellationToken,
        topic: &str,
    ) -> Result<(), DiscoveryError> {
        let started = self.fan_out(token, topic, Operation::Watch).await;
        if started == 0 && !token.is_cancelled() {
            return Err(DiscoveryError::NoDriverAvailable {
                operation: Operation::Watch,
                topic: topic.to_owned(),
            });
        }

        token.cancelled().await;
        debug!(topic, "watch stopped");
        Ok(())
    }

    /// Start `operation` on every driver concurrently and wait until each one
    /// has finished initiating. Returns how many drivers started a stream.
    async fn fan_out(&self, token: &CancellationToken, topic: &str, operation: Operation) -> usize {
        let started = Arc::new(AtomicUsize::new(0));
        let mut units = JoinSet::new();

        for driver in &self.inner.drivers {
            let inner = Arc::clone(&self.inner);
            let driver = Arc::clone(driver);
            let call_token = token.child_token();
            let topic = topic.to_owned();
            let started = Arc::clone(&started);

            units.spawn(async move {
                if inner.initiate(driver.as_ref(), call_token, &topic, operation).await {
                    started.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        while let Some(joined) = units.join_next().await {
            if let Err(join_error) = joined {
                error!(topic, %operation, %join_error, "driver unit did not complete");
            }
        }

        started.load(Ordering::SeqCst)
    }
}

impl Inner {
    /// Ask one driver to start `operation` and classify the outcome.
    async fn initiate(
        &self,
        driver: &dyn Driver,
        token: CancellationToken,
        topic: &str,
        operation: Operation,
    ) -> bool {
        let call = match operation {
            Operation::Lookup => driver.find_peers(token.clone(), topic),
            Operation::Watch => driver.subscribe(token.clone(), topic),
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            outcome = call => outcome,
        };

        match outcome {
            Ok(stream) => {
                debug!(driver = driver.name(), topic, %operation, "driver started");
                self.report(driver.name(), topic, operation, DriverOutcome::Started);
                tokio::spawn(self.fade.feed(token, topic, stream));
                true
            },
            Err(DriverError::NotSupported) => {
                debug!(driver = driver.name(), topic, %operation, "driver does not support operation, skipping");
                self.report(driver.name(), topic, operation, DriverOutcome::Skipped);
                false
            },
            Err(DriverError::Failed(error)) => {
                let detail = format!("{error:#}");
                warn!(driver = driver.name(), topic, %operation, error = %detail, "driver failed to start");
                self.report(driver.name(), topic, operation, DriverOutcome::Failed(detail));
                false
            },
        }
    }

    // Never blocks: lagging listeners lose old events.
    fn report(&self, driver: &str, topic: &str, operation: Operation, outcome: DriverOutcome) {
        let _ = self.events.send(DiscoveryEvent::new(driver, topic, operation, outcome));
    }
}
