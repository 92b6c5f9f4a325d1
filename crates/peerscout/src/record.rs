//! Peer records produced by discovery drivers.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use libp2p::{Multiaddr, PeerId};

/// A single sighting of a peer: who it is, where it may be reachable and
/// when it was discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Identity of the discovered peer
    pub peer_id: PeerId,

    /// Addresses the peer announced
    pub addrs: Vec<Multiaddr>,

    /// When the driver produced this record
    pub discovered_at: DateTime<Utc>,
}

impl PeerRecord {
    /// Create a record stamped with the current time
    pub fn new(peer_id: PeerId, addrs: Vec<Multiaddr>) -> Self {
        Self::with_timestamp(peer_id, addrs, Utc::now())
    }

    /// Create a record with an explicit discovery time
    pub fn with_timestamp(
        peer_id: PeerId,
        addrs: Vec<Multiaddr>,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        Self { peer_id, addrs, discovered_at }
    }

    /// Copy of this record re-stamped with the current time
    pub fn refreshed(&self) -> Self {
        Self::new(self.peer_id, self.addrs.clone())
    }

    /// Whether `other` describes the same peer at the same set of addresses.
    ///
    /// Address order, repeated addresses and the discovery time are ignored.
    pub fn same_sighting(&self, other: &PeerRecord) -> bool {
        if self.peer_id != other.peer_id {
            return false;
        }

        let ours: HashSet<&Multiaddr> = self.addrs.iter().collect();
        let theirs: HashSet<&Multiaddr> = other.addrs.iter().collect();
        ours == theirs
    }
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.peer_id)?;
        for (i, addr) in self.addrs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{addr}")?;
        }
        write!(f, "]")
    }
}
