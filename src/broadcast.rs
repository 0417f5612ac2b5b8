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

//! Tells remote peers when the instrument starts and stops sounding.

use std::{error::Error, fmt};

use thiserror::Error;

use crate::{config, pitch::ClipIndex};

pub mod mock;
pub mod osc;

/// Errors produced by a broadcast channel.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("unable to encode message: {0}")]
    Encode(String),

    #[error("unable to send to {peer}: {source}")]
    Send {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Mock(String),
}

/// Fire and forget start/stop messages.
pub trait BroadcastChannel: fmt::Display + Send {
    fn broadcast_start(&self, clip: ClipIndex, pitch: f32) -> Result<(), BroadcastError>;

    fn broadcast_stop(&self) -> Result<(), BroadcastError>;
}

/// A channel with no peers.
pub struct Disabled;

impl BroadcastChannel for Disabled {
    fn broadcast_start(&self, _: ClipIndex, _: f32) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn broadcast_stop(&self) -> Result<(), BroadcastError> {
        Ok(())
    }
}

impl fmt::Display for Disabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disabled")
    }
}

/// Gets the configured broadcast channel, or a disabled one if there's no configuration.
pub fn get_channel(
    config: Option<&config::Broadcast>,
) -> Result<Box<dyn BroadcastChannel>, Box<dyn Error>> {
    match config {
        Some(config) => Ok(Box::new(osc::Channel::new(config)?)),
        None => Ok(Box::new(Disabled)),
    }
}
