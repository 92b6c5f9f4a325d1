use std::{env, fmt, fs, path};

use libp2p::{Multiaddr, PeerId};
use peerscout::{PeerRecord, ServiceConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid static peer `{peer}`: {reason}")]
    InvalidPeer { peer: String, reason: String },
    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    PathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing level, overridden by `RUST_LOG`
    pub log_level: String,
    pub service: ServiceConfig,
    pub peers: Vec<StaticPeer>,
}

/// One entry of the static peer table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPeer {
    pub topic: String,
    pub peer_id: String,
    #[serde(default)]
    pub addrs: Vec<String>,
}

impl StaticPeer {
    pub fn to_record(&self) -> Result<PeerRecord, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPeer { peer: self.peer_id.clone(), reason };

        let peer_id: PeerId = self.peer_id.parse().map_err(|error| invalid(format!("{error}")))?;
        let addrs = self
            .addrs
            .iter()
            .map(|addr| addr.parse::<Multiaddr>().map_err(|error| invalid(format!("{addr}: {error}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PeerRecord::new(peer_id, addrs))
    }
}

/// `scout --config peers` reads `peers.toml`; any other extension is swapped
/// for `.toml`.
fn config_file(path: &path::Path) -> path::PathBuf {
    match path.extension() {
        Some(ext) if ext == "toml" => path.to_path_buf(),
        _ => path.with_extension("toml"),
    }
}

/// `$XDG_CONFIG_HOME/peerscout/config.toml`, falling back to `~/.config`
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    env::var_os("XDG_CONFIG_HOME")
        .map(path::PathBuf::from)
        .or_else(|| env::home_dir().map(|home| home.join(".config")))
        .map(|base| base.join("peerscout").join("config.toml"))
        .ok_or(ConfigError::PathUnavailable)
}

impl Default for Config {
    fn default() -> Self {
        Self { log_level: "info".into(), service: ServiceConfig::default(), peers: Vec::new() }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fade = &self.service.fade;

        writeln!(f, "scout configuration")?;
        writeln!(f, "  log level: {}", self.log_level)?;
        writeln!(f, "  service:")?;
        writeln!(f, "    event capacity: {}", self.service.event_capacity)?;
        writeln!(f, "    decay window: {}s", fade.decay_window.as_secs())?;
        writeln!(f, "    output capacity: {}", fade.capacity)?;
        writeln!(f, "  static peers: {}", self.peers.len())?;
        for peer in &self.peers {
            writeln!(f, "    [{}] {} {}", peer.topic, peer.peer_id, peer.addrs.join(", "))?;
        }

        Ok(())
    }
}

impl Config {
    /// Load the config at `optional_path`, or at the default location.
    ///
    /// A missing file is created with the default configuration.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = match optional_path {
            Some(path) => config_file(path.as_ref()),
            None => default_config_path()?,
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            toml::from_str(&raw_string)
                .map_err(|source| ConfigError::Parse { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    /// Static peer records paired with their topic, in file order
    pub fn peer_records(&self) -> Result<Vec<(String, PeerRecord)>, ConfigError> {
        self.peers.iter().map(|peer| Ok((peer.topic.clone(), peer.to_record()?))).collect()
    }
}
