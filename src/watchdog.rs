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

//! Catches notes that got stuck because a Note-Off never arrived or the sink
//! stopped sounding behind the driver's back.

use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::playback::PlaybackState;

/// Why the watchdog fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trip {
    /// Notes are held but nothing has arrived from the device for too long.
    Inactivity { idle: Duration },
    /// The driver thinks a clip is playing but the sink has been silent too long.
    Silent { silent: Duration },
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trip::Inactivity { idle } => write!(f, "no MIDI activity for {:?}", idle),
            Trip::Silent { silent } => write!(f, "sink silent for {:?}", silent),
        }
    }
}

pub struct Watchdog {
    inactivity_timeout: Duration,
    silence_grace: Duration,
    silent_since: Option<Instant>,
}

impl Watchdog {
    pub fn new(inactivity_timeout: Duration, silence_grace: Duration) -> Watchdog {
        Watchdog {
            inactivity_timeout,
            silence_grace,
            silent_since: None,
        }
    }

    /// Checks both trip conditions. Called once per tick.
    pub fn check(
        &mut self,
        now: Instant,
        notes_held: bool,
        last_activity: Option<Instant>,
        playback: &PlaybackState,
        producing_sound: bool,
    ) -> Option<Trip> {
        if notes_held {
            if let Some(last_activity) = last_activity {
                let idle = now.saturating_duration_since(last_activity);
                if idle > self.inactivity_timeout {
                    return Some(Trip::Inactivity { idle });
                }
            }
        }

        if !playback.is_active() || producing_sound {
            self.silent_since = None;
            return None;
        }

        let silent_since = *self.silent_since.get_or_insert(now);
        let silent = now.saturating_duration_since(silent_since);
        if silent > playback.clip_duration() + self.silence_grace {
            return Some(Trip::Silent { silent });
        }
        None
    }

    /// Forgets tracked silence, used after every reset.
    pub fn reset(&mut self) {
        self.silent_since = None;
    }
}
