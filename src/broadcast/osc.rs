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
use std::{fmt, net::SocketAddr, net::UdpSocket};

use rosc::{OscMessage, OscPacket, OscType};
use tracing::{debug, info};

use super::{BroadcastChannel, BroadcastError};
use crate::{
    config::{self, ConfigError},
    pitch::ClipIndex,
};

/// Sends start/stop OSC messages over UDP to a fixed set of peers.
pub struct Channel {
    socket: UdpSocket,
    peers: Vec<SocketAddr>,
    start_address: String,
    stop_address: String,
}

impl Channel {
    pub fn new(config: &config::Broadcast) -> Result<Channel, ConfigError> {
        let bind = config.bind()?;
        let socket = UdpSocket::bind(bind).map_err(|e| {
            ConfigError::invalid("broadcast.bind", format!("unable to bind {}: {}", bind, e))
        })?;
        let peers = config.peers()?;

        info!(
            bind = bind.to_string(),
            peers = peers.len(),
            "Broadcasting over OSC."
        );

        Ok(Channel {
            socket,
            peers,
            start_address: config.start_address(),
            stop_address: config.stop_address(),
        })
    }

    fn send(&self, packet: OscPacket) -> Result<(), BroadcastError> {
        let buf = rosc::encoder::encode(&packet)
            .map_err(|e| BroadcastError::Encode(e.to_string()))?;
        // Every peer is tried, the first failure is reported.
        let mut result = Ok(());
        for peer in self.peers.iter() {
            if let Err(e) = self.socket.send_to(&buf, peer) {
                if result.is_ok() {
                    result = Err(BroadcastError::Send {
                        peer: peer.to_string(),
                        source: e,
                    });
                }
            }
        }
        result
    }
}

impl BroadcastChannel for Channel {
    fn broadcast_start(&self, clip: ClipIndex, pitch: f32) -> Result<(), BroadcastError> {
        debug!(clip, pitch, "Broadcasting start.");
        self.send(OscPacket::Message(OscMessage {
            addr: self.start_address.clone(),
            args: vec![OscType::Int(clip as i32), OscType::Float(pitch)],
        }))
    }

    fn broadcast_stop(&self) -> Result<(), BroadcastError> {
        debug!("Broadcasting stop.");
        self.send(OscPacket::Message(OscMessage {
            addr: self.stop_address.clone(),
            args: vec![],
        }))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let peers: Vec<String> = self.peers.iter().map(SocketAddr::to_string).collect();
        write!(f, "OSC ({})", peers.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, net::UdpSocket, time::Duration};

    use rosc::{OscMessage, OscPacket, OscType};

    use super::*;

    fn receive(socket: &UdpSocket) -> Result<OscPacket, Box<dyn Error>> {
        let mut buf = [0u8; rosc::decoder::MTU];
        let (size, _) = socket.recv_from(&mut buf)?;
        let (_, packet) = rosc::decoder::decode_udp(&buf[..size]).map_err(|e| e.to_string())?;
        Ok(packet)
    }

    #[test]
    fn test_start_and_stop_reach_peers() -> Result<(), Box<dyn Error>> {
        let peer = UdpSocket::bind("127.0.0.1:0")?;
        peer.set_read_timeout(Some(Duration::from_secs(5)))?;

        let config = config::Broadcast::new(
            Some("127.0.0.1:0"),
            vec![peer.local_addr()?.to_string()],
        );
        let channel = Channel::new(&config)?;

        channel.broadcast_start(2, 0.25)?;
        assert_eq!(
            receive(&peer)?,
            OscPacket::Message(OscMessage {
                addr: "/bugle/start".to_string(),
                args: vec![OscType::Int(2), OscType::Float(0.25)],
            })
        );

        channel.broadcast_stop()?;
        assert_eq!(
            receive(&peer)?,
            OscPacket::Message(OscMessage {
                addr: "/bugle/end".to_string(),
                args: vec![],
            })
        );
        Ok(())
    }

    #[test]
    fn test_bad_bind_address() {
        let config = config::Broadcast::new(Some("nonsense"), vec![]);
        assert!(Channel::new(&config).is_err());
    }
}
