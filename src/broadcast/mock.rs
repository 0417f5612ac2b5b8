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
use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use super::{BroadcastChannel, BroadcastError};
use crate::pitch::ClipIndex;

/// A message sent through the mock channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BroadcastEvent {
    Start { clip: ClipIndex, pitch: f32 },
    Stop,
}

/// A mock channel that records every message. Clones share their recordings.
#[derive(Clone, Default)]
pub struct Channel {
    events: Arc<Mutex<Vec<BroadcastEvent>>>,
    failing: Arc<Mutex<bool>>,
}

impl Channel {
    pub fn new() -> Channel {
        Channel::default()
    }

    /// Everything broadcast so far, oldest first.
    pub fn events(&self) -> Vec<BroadcastEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Makes every broadcast fail after recording it.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    fn record(&self, event: BroadcastEvent) -> Result<(), BroadcastError> {
        self.events.lock().push(event);
        if *self.failing.lock() {
            return Err(BroadcastError::Mock("broadcast failed".to_string()));
        }
        Ok(())
    }
}

impl BroadcastChannel for Channel {
    fn broadcast_start(&self, clip: ClipIndex, pitch: f32) -> Result<(), BroadcastError> {
        self.record(BroadcastEvent::Start { clip, pitch })
    }

    fn broadcast_stop(&self) -> Result<(), BroadcastError> {
        self.record(BroadcastEvent::Stop)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mock")
    }
}
