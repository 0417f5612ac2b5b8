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
use std::{path::Path, time::Duration};

use hound::{SampleFormat, WavReader};

use super::SinkError;

/// A clip decoded into memory and mixed down to mono.
#[derive(Clone, Debug)]
pub struct Clip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Clip {
    /// Creates a clip from mono samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Clip {
        Clip {
            samples,
            sample_rate,
        }
    }

    /// Loads a WAV file, averaging all of its channels.
    pub fn load(path: &Path) -> Result<Clip, SinkError> {
        let load_error = |source| SinkError::Load {
            path: path.display().to_string(),
            source,
        };

        let mut reader = WavReader::open(path).map_err(load_error)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(load_error)?,
            SampleFormat::Int => {
                // i64 so 32 bit samples don't overflow the shift.
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|sample| sample as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(load_error)?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Clip::new(samples, spec.sample_rate))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The length of the clip at its natural rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Linearly interpolated sample at a fractional position. Zero past the end.
    pub fn sample_at(&self, position: f64) -> f32 {
        let index = position.floor() as usize;
        let fraction = (position - index as f64) as f32;
        match (self.samples.get(index), self.samples.get(index + 1)) {
            (Some(current), Some(next)) => current + (next - current) * fraction,
            (Some(current), None) => *current,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, time::Duration};

    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;

    #[test]
    fn test_load_stereo_int_clip() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("low.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec)?;
        for _ in 0..500 {
            writer.write_sample(16384i16)?;
            writer.write_sample(0i16)?;
        }
        writer.finalize()?;

        let clip = Clip::load(&path)?;
        assert_eq!(clip.len(), 500);
        assert_eq!(clip.sample_rate(), 1000);
        assert_eq!(clip.duration(), Duration::from_millis(500));
        assert!((clip.samples()[0] - 0.25).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_load_mono_float_clip() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("high.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec)?;
        for i in 0..48000 {
            writer.write_sample(if i % 2 == 0 { 0.5f32 } else { -0.5f32 })?;
        }
        writer.finalize()?;

        let clip = Clip::load(&path)?;
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(clip.samples()[1], -0.5);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Clip::load(Path::new("/does/not/exist.wav")),
            Err(SinkError::Load { .. })
        ));
    }

    #[test]
    fn test_sample_at_interpolates() {
        let clip = Clip::new(vec![0.0, 1.0, 0.0], 10);
        assert_eq!(clip.sample_at(0.0), 0.0);
        assert_eq!(clip.sample_at(0.5), 0.5);
        assert_eq!(clip.sample_at(1.25), 0.75);
        assert_eq!(clip.sample_at(2.0), 0.0);
        assert_eq!(clip.sample_at(3.5), 0.0);
    }
}
