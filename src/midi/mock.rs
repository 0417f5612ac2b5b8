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
use std::{error::Error, fmt, sync::Arc, time::Instant};

use parking_lot::Mutex;
use tracing::info;

use crate::ingest::IngestHandle;

/// A mock device. Input is injected by hand. Clones share the same connection.
#[derive(Clone)]
pub struct Device {
    name: String,
    handle: Arc<Mutex<Option<IngestHandle>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether listen has been called without a matching stop_listening.
    pub fn is_listening(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Pushes a raw MIDI message as if the driver received it. Returns false if the
    /// device isn't listening.
    pub fn send(&self, raw: &[u8], timestamp: Instant) -> bool {
        match self.handle.lock().as_ref() {
            Some(handle) => {
                handle.push_raw(raw, timestamp);
                true
            }
            None => false,
        }
    }

    /// Reports a driver error as if the device failed.
    pub fn fail(&self, message: &str) -> bool {
        match self.handle.lock().as_ref() {
            Some(handle) => {
                handle.report_error(message);
                true
            }
            None => false,
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn listen(&self, handle: IngestHandle) -> Result<(), Box<dyn Error>> {
        let mut current = self.handle.lock();
        if current.is_some() {
            return Err("Already listening.".into());
        }
        *current = Some(handle);
        info!(device = self.name, "Listening for MIDI input.");
        Ok(())
    }

    fn stop_listening(&self) {
        self.handle.lock().take();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        ingest::{Ingest, IngestMessage, NoteEvent, NoteKind},
        midi::Device as _,
    };

    #[test]
    fn test_mock_device_pushes_until_stopped() {
        let ingest = Ingest::new();
        let device = Device::get("mock-keys");
        let now = Instant::now();

        assert!(!device.send(&[0x90, 60, 100], now));
        device.listen(ingest.handle(None)).unwrap();
        assert!(device.listen(ingest.handle(None)).is_err());
        assert!(device.send(&[0x90, 60, 100], now));
        assert!(device.fail("gone"));
        device.stop_listening();
        assert!(!device.send(&[0x80, 60, 0], now));

        assert_eq!(
            ingest.drain(),
            vec![
                IngestMessage::Note(NoteEvent::new(NoteKind::On, 60, 100, now)),
                IngestMessage::DeviceError("gone".to_string()),
            ]
        );
    }
}
