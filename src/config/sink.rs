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

use serde::Deserialize;

use super::ConfigError;

/// Playback rate at normalized pitch 0.
pub const DEFAULT_PITCH_MIN: f32 = 0.5;

/// Playback rate at normalized pitch 1.
pub const DEFAULT_PITCH_MAX: f32 = 2.0;

fn default_pitch_min() -> f32 {
    DEFAULT_PITCH_MIN
}

fn default_pitch_max() -> f32 {
    DEFAULT_PITCH_MAX
}

/// A YAML representation of the note sink configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Sink {
    /// The audio output device. The host default is used if unset. Names starting
    /// with "mock" create a mock sink.
    audio_device: Option<String>,

    /// One WAV file per clip, relative to the config file.
    #[serde(default)]
    clips: Vec<String>,

    /// Playback rate for normalized pitch 0.
    #[serde(default = "default_pitch_min")]
    pitch_min: f32,

    /// Playback rate for normalized pitch 1.
    #[serde(default = "default_pitch_max")]
    pitch_max: f32,
}

impl Default for Sink {
    fn default() -> Self {
        Sink {
            audio_device: None,
            clips: Vec::new(),
            pitch_min: DEFAULT_PITCH_MIN,
            pitch_max: DEFAULT_PITCH_MAX,
        }
    }
}

impl Sink {
    /// Creates a new sink configuration.
    pub fn new(audio_device: Option<&str>, clips: Vec<String>) -> Sink {
        Sink {
            audio_device: audio_device.map(str::to_string),
            clips,
            ..Default::default()
        }
    }

    pub fn audio_device(&self) -> Option<&str> {
        self.audio_device.as_deref()
    }

    /// Resolves the clip files against the given base path.
    pub fn clip_paths(&self, base_path: &Path) -> Vec<PathBuf> {
        self.clips
            .iter()
            .map(|clip| {
                let path = Path::new(clip);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    base_path.join(path)
                }
            })
            .collect()
    }

    pub fn pitch_min(&self) -> f32 {
        self.pitch_min
    }

    pub fn pitch_max(&self) -> f32 {
        self.pitch_max
    }

    /// Maps a normalized pitch onto the sink's playback rate range.
    pub fn playback_rate(&self, pitch: f32) -> f32 {
        self.pitch_min + (self.pitch_max - self.pitch_min) * pitch.clamp(0.0, 1.0)
    }

    /// Checks the pitch range and that there's a file for every clip when a real device is used.
    pub fn validate(&self, clip_count: usize) -> Result<(), ConfigError> {
        if !(self.pitch_min > 0.0) || self.pitch_max < self.pitch_min {
            return Err(ConfigError::invalid(
                "sink.pitch_min",
                format!(
                    "pitch range {}..{} must be positive and ascending",
                    self.pitch_min, self.pitch_max
                ),
            ));
        }
        let is_mock = self
            .audio_device
            .as_deref()
            .is_some_and(|device| device.starts_with("mock"));
        if !is_mock && self.clips.len() != clip_count {
            return Err(ConfigError::invalid(
                "sink.clips",
                format!(
                    "expected {} clip files, found {}",
                    clip_count,
                    self.clips.len()
                ),
            ));
        }
        Ok(())
    }
}
