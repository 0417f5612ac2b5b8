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
use std::{error::Error, fmt, path::Path, time::Duration};

use thiserror::Error;

use crate::{config, pitch::ClipIndex};

pub mod clip;
pub mod cpal;
pub mod mock;

/// Errors produced by a note sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("clip {clip} does not exist, the sink has {count} clips")]
    UnknownClip { clip: ClipIndex, count: usize },

    #[error("unable to load clip {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("output stream failed: {0}")]
    Stream(String),

    #[error("{0}")]
    Mock(String),
}

/// Renders one clip at one pitch at a time.
pub trait NoteSink: fmt::Display + Send {
    /// The number of clips the sink can play.
    fn clip_count(&self) -> usize;

    /// The natural length of the clip.
    fn duration(&self, clip: ClipIndex) -> Result<Duration, SinkError>;

    /// Starts the clip at the normalized pitch, replacing anything playing.
    fn start(&self, clip: ClipIndex, pitch: f32) -> Result<(), SinkError>;

    /// Silences the sink.
    fn stop(&self) -> Result<(), SinkError>;

    /// Whether the sink is audibly producing sound right now.
    fn is_producing_sound(&self) -> bool;
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::list()
}

/// Gets the sink described by the configuration. Devices whose names start with
/// "mock" create a mock sink with one second clips.
pub fn get_sink(
    config: &config::Sink,
    clip_count: usize,
    base_path: &Path,
) -> Result<Box<dyn NoteSink>, Box<dyn Error>> {
    if let Some(device) = config.audio_device() {
        if device.starts_with("mock") {
            return Ok(Box::new(mock::Sink::new(
                device,
                vec![Duration::from_secs(1); clip_count],
            )));
        }
    }

    Ok(Box::new(cpal::Sink::get(config, base_path)?))
}
