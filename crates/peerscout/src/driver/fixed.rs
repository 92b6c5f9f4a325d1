//! Driver serving a fixed peer table.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::{Driver, PeerStream};
use crate::error::DriverError;
use crate::record::PeerRecord;

/// Answers lookups from a preconfigured table of peers per topic.
///
/// Topics missing from the table, and every watch, are not supported.
#[derive(Debug, Clone)]
pub struct StaticDriver {
    name: String,
    table: HashMap<String, Vec<PeerRecord>>,
}

impl StaticDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), table: HashMap::new() }
    }

    /// Add a peer under `topic`
    pub fn with_peer(mut self, topic: impl Into<String>, record: PeerRecord) -> Self {
        self.insert(topic, record);
        self
    }

    pub fn insert(&mut self, topic: impl Into<String>, record: PeerRecord) {
        self.table.entry(topic.into()).or_default().push(record);
    }

    /// Topics this driver can answer for
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

#[async_trait]
impl Driver for StaticDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_peers(
        &self,
        _token: CancellationToken,
        topic: &str,
    ) -> Result<PeerStream, DriverError> {
        let peers = self.table.get(topic).ok_or(DriverError::NotSupported)?;
        let sightings: Vec<PeerRecord> = peers.iter().map(PeerRecord::refreshed).collect();
        Ok(stream::iter(sightings).boxed())
    }
}
