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
use midly::num::u4;
use serde::Deserialize;

use super::ConfigError;

/// A YAML representation of the MIDI input configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Midi {
    /// The MIDI input device to listen to. Matched as a substring of the port name.
    device: Option<String>,

    /// Restricts input to a single MIDI channel (1-16). All channels are accepted if unset.
    channel: Option<u8>,
}

impl Midi {
    /// New will create a new MIDI configuration.
    pub fn new(device: Option<&str>, channel: Option<u8>) -> Midi {
        Midi {
            device: device.map(str::to_string),
            channel,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the zero based channel filter.
    pub fn channel(&self) -> Result<Option<u4>, ConfigError> {
        match self.channel {
            Some(channel) if (1..=16).contains(&channel) => Ok(u4::try_from(channel - 1)),
            Some(channel) => Err(ConfigError::invalid(
                "midi.channel",
                format!("{} is not between 1 and 16", channel),
            )),
            None => Ok(None),
        }
    }
}
