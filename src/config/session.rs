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
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use super::broadcast::Broadcast;
use super::error::ConfigError;
use super::midi::Midi;
use super::pitch::PitchCalibration;
use super::playback::{Playback, Watchdog};
use super::sink::Sink;

/// Prefix for environment variable overrides, e.g. `BUGLEHERO__MIDI__DEVICE`.
const ENV_PREFIX: &str = "BUGLEHERO";

/// The configuration for a session.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Session {
    /// The MIDI input configuration.
    #[serde(default)]
    midi: Midi,

    /// The note sink configuration.
    #[serde(default)]
    sink: Sink,

    /// The remote broadcast configuration. Nothing is broadcast if unset.
    broadcast: Option<Broadcast>,

    /// Playback timing.
    #[serde(default)]
    playback: Playback,

    /// Stuck note watchdog thresholds.
    #[serde(default)]
    watchdog: Watchdog,

    /// The note to clip/pitch calibration.
    #[serde(default)]
    pitch: PitchCalibration,

    /// The directory relative clip paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Session {
    /// Creates a new session configuration.
    pub fn new(
        midi: Midi,
        sink: Sink,
        broadcast: Option<Broadcast>,
        playback: Playback,
        watchdog: Watchdog,
        pitch: PitchCalibration,
    ) -> Session {
        Session {
            midi,
            sink,
            broadcast,
            playback,
            watchdog,
            pitch,
            base_path: PathBuf::new(),
        }
    }

    /// Parses and validates a session configuration from a YAML file. Environment
    /// variables prefixed with `BUGLEHERO__` override file values.
    pub fn deserialize(path: &Path) -> Result<Session, ConfigError> {
        let mut session = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<Session>()?;

        session.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        session.validate()?;
        Ok(session)
    }

    /// Validates every section, including the duration strings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.midi.channel()?;
        self.pitch.validate()?;
        self.sink.validate(self.pitch.clip_count())?;
        if let Some(broadcast) = &self.broadcast {
            broadcast.bind()?;
            broadcast.peers()?;
        }
        self.playback.cooldown()?;
        self.playback.broadcast_delay()?;
        self.playback.tick_interval()?;
        self.watchdog.inactivity_timeout()?;
        self.watchdog.silence_grace()?;
        Ok(())
    }

    pub fn midi(&self) -> &Midi {
        &self.midi
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn broadcast(&self) -> Option<&Broadcast> {
        self.broadcast.as_ref()
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn pitch(&self) -> &PitchCalibration {
        &self.pitch
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
