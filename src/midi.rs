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
use std::{error::Error, fmt, sync::Arc};

use crate::ingest::IngestHandle;

mod midir;
pub mod mock;

/// A MIDI input device.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Starts pushing the device's input onto the given handle.
    fn listen(&self, handle: IngestHandle) -> Result<(), Box<dyn Error>>;

    /// Closes the input connection. Safe to call when not listening.
    fn stop_listening(&self);
}

/// Lists input devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets a device with the given name. Names starting with "mock" create a mock device.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}

/// Whether an input port with exactly this name is connected. Mock devices are always present.
pub fn device_present(name: &str) -> Result<bool, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(true);
    }

    Ok(midir::port_names()?.iter().any(|port| port == name))
}
