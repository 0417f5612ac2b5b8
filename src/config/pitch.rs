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
use serde::Deserialize;

use super::ConfigError;

/// Frequency that maps to pitch 0 on the reference clip.
pub const DEFAULT_REFERENCE_LOW: f32 = 255.0;

/// Frequency that maps to pitch 1 on the reference clip.
pub const DEFAULT_REFERENCE_HIGH: f32 = 1025.0;

/// Upper frequency bounds of clips 0, 1 and 2. Anything above the last one plays clip 3.
pub const DEFAULT_BAND_THRESHOLDS: [f32; 3] = [400.0, 700.0, 900.0];

/// Measured base pitch of each recorded clip relative to clip 0.
pub const DEFAULT_CLIP_RATIOS: [f32; 4] = [1.0, 1.0156, 1.0156, 1.039];

fn default_reference_low() -> f32 {
    DEFAULT_REFERENCE_LOW
}

fn default_reference_high() -> f32 {
    DEFAULT_REFERENCE_HIGH
}

fn default_band_thresholds() -> Vec<f32> {
    DEFAULT_BAND_THRESHOLDS.to_vec()
}

fn default_clip_ratios() -> Vec<f32> {
    DEFAULT_CLIP_RATIOS.to_vec()
}

/// The calibration table used to turn MIDI notes into clip/pitch pairs.
///
/// The values depend on the recorded samples and can't be derived, so they
/// all live in configuration.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PitchCalibration {
    /// The lowest frequency of the reference range (pitch 0).
    #[serde(default = "default_reference_low")]
    reference_low: f32,

    /// The highest frequency of the reference range (pitch 1).
    #[serde(default = "default_reference_high")]
    reference_high: f32,

    /// Frequency band boundaries between consecutive clips.
    #[serde(default = "default_band_thresholds")]
    band_thresholds: Vec<f32>,

    /// Frequency correction ratio for each clip.
    #[serde(default = "default_clip_ratios")]
    clip_ratios: Vec<f32>,

    /// Optional note range that incoming notes are wrapped into by octaves.
    transpose: Option<TransposeRange>,
}

impl Default for PitchCalibration {
    fn default() -> Self {
        PitchCalibration {
            reference_low: DEFAULT_REFERENCE_LOW,
            reference_high: DEFAULT_REFERENCE_HIGH,
            band_thresholds: default_band_thresholds(),
            clip_ratios: default_clip_ratios(),
            transpose: None,
        }
    }
}

impl PitchCalibration {
    /// Creates a new calibration table.
    pub fn new(
        reference_low: f32,
        reference_high: f32,
        band_thresholds: Vec<f32>,
        clip_ratios: Vec<f32>,
        transpose: Option<TransposeRange>,
    ) -> PitchCalibration {
        PitchCalibration {
            reference_low,
            reference_high,
            band_thresholds,
            clip_ratios,
            transpose,
        }
    }

    pub fn reference_low(&self) -> f32 {
        self.reference_low
    }

    pub fn reference_high(&self) -> f32 {
        self.reference_high
    }

    pub fn band_thresholds(&self) -> &[f32] {
        &self.band_thresholds
    }

    pub fn clip_ratios(&self) -> &[f32] {
        &self.clip_ratios
    }

    pub fn transpose(&self) -> Option<TransposeRange> {
        self.transpose
    }

    /// The number of clips the calibration describes.
    pub fn clip_count(&self) -> usize {
        self.band_thresholds.len() + 1
    }

    /// Checks that octave folding terminates inside the reference range and that
    /// every clip has a ratio.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reference_low > 0.0) {
            return Err(ConfigError::invalid(
                "pitch.reference_low",
                "must be greater than zero",
            ));
        }
        if !(self.reference_high >= self.reference_low * 2.0) {
            return Err(ConfigError::invalid(
                "pitch.reference_high",
                format!(
                    "must span at least one octave above {}Hz",
                    self.reference_low
                ),
            ));
        }
        if self
            .band_thresholds
            .windows(2)
            .any(|window| window[0] >= window[1])
        {
            return Err(ConfigError::invalid(
                "pitch.band_thresholds",
                "must be strictly increasing",
            ));
        }
        if self.clip_ratios.len() != self.clip_count() {
            return Err(ConfigError::invalid(
                "pitch.clip_ratios",
                format!(
                    "expected {} ratios for {} band thresholds, found {}",
                    self.clip_count(),
                    self.band_thresholds.len(),
                    self.clip_ratios.len()
                ),
            ));
        }
        if self.clip_ratios.iter().any(|ratio| !(*ratio > 0.0)) {
            return Err(ConfigError::invalid(
                "pitch.clip_ratios",
                "ratios must be greater than zero",
            ));
        }
        if let Some(transpose) = self.transpose {
            transpose.validate()?;
        }
        Ok(())
    }
}

/// An inclusive range of MIDI notes that incoming notes are moved into by whole octaves.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransposeRange {
    min_note: u8,
    max_note: u8,
}

impl TransposeRange {
    pub fn new(min_note: u8, max_note: u8) -> TransposeRange {
        TransposeRange { min_note, max_note }
    }

    pub fn min_note(&self) -> u8 {
        self.min_note
    }

    pub fn max_note(&self) -> u8 {
        self.max_note
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Anything narrower than an octave can't hold every pitch class.
        if self.max_note > 127 || self.max_note < self.min_note.saturating_add(11) {
            return Err(ConfigError::invalid(
                "pitch.transpose",
                format!(
                    "{}..={} must cover at least an octave of valid notes",
                    self.min_note, self.max_note
                ),
            ));
        }
        Ok(())
    }
}
