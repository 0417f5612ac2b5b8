// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::net::SocketAddr;

use serde::Deserialize;

use super::ConfigError;

/// The default local address to send from.
pub const DEFAULT_BIND: &str = "0.0.0.0:0";

/// The default OSC address for the start message.
pub const DEFAULT_START_ADDRESS: &str = "/bugle/start";

/// The default OSC address for the stop message.
pub const DEFAULT_STOP_ADDRESS: &str = "/bugle/end";

/// A YAML representation of the OSC broadcast configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Broadcast {
    /// The local address to bind the sending socket to.
    bind: Option<String>,

    /// The peers to send start/stop messages to.
    peers: Vec<String>,

    /// The OSC address used for start messages.
    start_address: Option<String>,

    /// The OSC address used for stop messages.
    stop_address: Option<String>,
}

impl Broadcast {
    /// Creates a new broadcast configuration.
    pub fn new(bind: Option<&str>, peers: Vec<String>) -> Broadcast {
        Broadcast {
            bind: bind.map(str::to_string),
            peers,
            start_address: None,
            stop_address: None,
        }
    }

    /// Returns the local bind address.
    pub fn bind(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.as_deref().unwrap_or(DEFAULT_BIND);
        bind.parse()
            .map_err(|e| ConfigError::invalid("broadcast.bind", format!("{}: {}", bind, e)))
    }

    /// Returns the peer addresses.
    pub fn peers(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.peers
            .iter()
            .map(|peer| {
                peer.parse().map_err(|e| {
                    ConfigError::invalid("broadcast.peers", format!("{}: {}", peer, e))
                })
            })
            .collect()
    }

    /// Returns the OSC address for start messages.
    pub fn start_address(&self) -> String {
        self.start_address
            .clone()
            .unwrap_or_else(|| DEFAULT_START_ADDRESS.to_string())
    }

    /// Returns the OSC address for stop messages.
    pub fn stop_address(&self) -> String {
        self.stop_address
            .clone()
            .unwrap_or_else(|| DEFAULT_STOP_ADDRESS.to_string())
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_broadcast_deserialize() {
        let yaml = r#"
            peers:
              - 192.168.1.20:9000
              - 192.168.1.21:9000
            stop_address: /horn/off
        "#;

        let broadcast: Broadcast = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(
            broadcast.bind().unwrap(),
            "0.0.0.0:0".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(broadcast.peers().unwrap().len(), 2);
        assert_eq!(broadcast.start_address(), DEFAULT_START_ADDRESS);
        assert_eq!(broadcast.stop_address(), "/horn/off");
    }

    #[test]
    fn test_bad_peer() {
        let broadcast = Broadcast::new(None, vec!["not-an-address".to_string()]);
        assert!(broadcast.peers().is_err());
    }
}
