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
use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::debug;

use super::{NoteSink, SinkError};
use crate::pitch::ClipIndex;

/// A call made against the mock sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SinkEvent {
    Start { clip: ClipIndex, pitch: f32 },
    Stop,
}

#[derive(Default)]
struct State {
    events: Vec<SinkEvent>,
    playing: bool,
    producing_override: Option<bool>,
    failing: bool,
}

/// A mock sink. Doesn't render anything, records every call instead. Clones share
/// their recordings.
#[derive(Clone)]
pub struct Sink {
    name: String,
    durations: Vec<Duration>,
    state: Arc<Mutex<State>>,
}

impl Sink {
    /// Creates a mock sink with one clip per duration.
    pub fn new(name: &str, durations: Vec<Duration>) -> Sink {
        Sink {
            name: name.to_string(),
            durations,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Everything the sink has been asked to do, oldest first.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.state.lock().events.clone()
    }

    /// Forgets the recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Whether a clip was started and not stopped.
    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Forces what is_producing_sound reports. None follows start/stop.
    pub fn set_producing_sound(&self, producing: Option<bool>) {
        self.state.lock().producing_override = producing;
    }

    /// Makes start and stop fail. Calls are still recorded.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }
}

impl NoteSink for Sink {
    fn clip_count(&self) -> usize {
        self.durations.len()
    }

    fn duration(&self, clip: ClipIndex) -> Result<Duration, SinkError> {
        self.durations
            .get(clip)
            .copied()
            .ok_or(SinkError::UnknownClip {
                clip,
                count: self.durations.len(),
            })
    }

    fn start(&self, clip: ClipIndex, pitch: f32) -> Result<(), SinkError> {
        debug!(sink = self.name, clip, pitch, "Starting clip.");
        let mut state = self.state.lock();
        state.events.push(SinkEvent::Start { clip, pitch });
        if state.failing {
            return Err(SinkError::Mock(format!("{} failed to start", self.name)));
        }
        state.playing = true;
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        debug!(sink = self.name, "Stopping clip.");
        let mut state = self.state.lock();
        state.events.push(SinkEvent::Stop);
        if state.failing {
            return Err(SinkError::Mock(format!("{} failed to stop", self.name)));
        }
        state.playing = false;
        Ok(())
    }

    fn is_producing_sound(&self) -> bool {
        let state = self.state.lock();
        state.producing_override.unwrap_or(state.playing)
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
