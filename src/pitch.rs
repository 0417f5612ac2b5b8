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

//! Maps MIDI notes onto the instrument's clips.
//!
//! The instrument has a handful of recorded clips, each covering a frequency band,
//! and a single pitch control normalized to 0..1 over a reference frequency range.
//! Notes outside the reference range are folded into it by octaves.

use std::fmt;

use crate::config::{ConfigError, PitchCalibration};

/// Index of a recorded clip.
pub type ClipIndex = usize;

/// Frequency of A4, MIDI note 69.
const A4_FREQUENCY: f32 = 440.0;
const A4_NOTE: f32 = 69.0;

/// The clip and normalized pitch a note is played with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteMapping {
    pub clip: ClipIndex,
    pub pitch: f32,
}

impl fmt::Display for NoteMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip {} @ {:.4}", self.clip, self.pitch)
    }
}

/// Converts a MIDI note number to its equal tempered frequency in Hz.
pub fn note_to_frequency(note: u8) -> f32 {
    A4_FREQUENCY * 2f32.powf((note as f32 - A4_NOTE) / 12.0)
}

/// Pure note to clip/pitch mapping driven by a calibration table.
#[derive(Clone, Debug)]
pub struct PitchMapper {
    calibration: PitchCalibration,
}

impl PitchMapper {
    /// Creates a new mapper, rejecting calibrations that can't be folded into.
    pub fn new(calibration: PitchCalibration) -> Result<PitchMapper, ConfigError> {
        calibration.validate()?;
        Ok(PitchMapper { calibration })
    }

    /// The number of clips notes can map to.
    pub fn clip_count(&self) -> usize {
        self.calibration.clip_count()
    }

    /// Maps a note to the clip and corrected pitch it should be played with.
    pub fn map_note(&self, note: u8) -> NoteMapping {
        let frequency = note_to_frequency(self.transpose(note));
        let clip = self.frequency_to_clip(frequency);
        let base_pitch = self.frequency_to_normalized_pitch(frequency);
        NoteMapping {
            clip,
            pitch: self.clip_pitch_correction(base_pitch, clip),
        }
    }

    /// Wraps the note into the configured transpose range by whole octaves.
    pub fn transpose(&self, note: u8) -> u8 {
        let range = match self.calibration.transpose() {
            Some(range) => range,
            None => return note,
        };

        let mut note = note as i16;
        while note < range.min_note() as i16 {
            note += 12;
        }
        while note > range.max_note() as i16 {
            note -= 12;
        }
        note as u8
    }

    /// Picks the clip whose band contains the frequency.
    pub fn frequency_to_clip(&self, frequency: f32) -> ClipIndex {
        self.calibration
            .band_thresholds()
            .iter()
            .position(|threshold| frequency < *threshold)
            .unwrap_or(self.calibration.band_thresholds().len())
    }

    /// Folds the frequency into the reference range and normalizes it to 0..1.
    pub fn frequency_to_normalized_pitch(&self, frequency: f32) -> f32 {
        self.normalize(self.fold(frequency))
    }

    /// Compensates for the base pitch each clip was recorded at.
    pub fn clip_pitch_correction(&self, base_pitch: f32, clip: ClipIndex) -> f32 {
        let low = self.calibration.reference_low();
        let high = self.calibration.reference_high();
        let ratio = self
            .calibration
            .clip_ratios()
            .get(clip)
            .copied()
            .unwrap_or(1.0);

        let base_frequency = low + (high - low) * base_pitch;
        self.frequency_to_normalized_pitch(base_frequency * ratio)
    }

    /// Moves the frequency by octaves until it is inside the reference range.
    /// Frequencies already in range are returned unchanged.
    pub fn fold(&self, frequency: f32) -> f32 {
        let low = self.calibration.reference_low();
        let high = self.calibration.reference_high();
        if !(frequency > 0.0) || !frequency.is_finite() {
            return low;
        }

        let mut frequency = frequency;
        while frequency < low {
            frequency *= 2.0;
        }
        while frequency > high {
            frequency /= 2.0;
        }
        frequency
    }

    fn normalize(&self, frequency: f32) -> f32 {
        let low = self.calibration.reference_low();
        let high = self.calibration.reference_high();
        ((frequency - low) / (high - low)).clamp(0.0, 1.0)
    }
}
