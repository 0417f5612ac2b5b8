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
use std::{
    error::Error,
    fmt,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use super::{clip::Clip, NoteSink, SinkError};
use crate::{config, pitch::ClipIndex};

/// The single voice the output callback renders.
#[derive(Clone, Copy, Debug)]
struct Voice {
    clip: ClipIndex,
    position: f64,
    step: f64,
}

/// State shared between the sink and the output callback.
struct Shared {
    clips: Vec<Clip>,
    voice: Mutex<Option<Voice>>,
    stream_failed: AtomicBool,
}

impl Shared {
    /// Renders the current voice into an interleaved buffer.
    fn render(&self, data: &mut [f32], channels: usize) {
        let mut voice = self.voice.lock();
        for frame in data.chunks_mut(channels) {
            let sample = match voice.as_mut() {
                Some(current) => {
                    let clip = &self.clips[current.clip];
                    if current.position >= clip.len() as f64 {
                        *voice = None;
                        0.0
                    } else {
                        let sample = clip.sample_at(current.position);
                        current.position += current.step;
                        sample
                    }
                }
                None => 0.0,
            };
            frame.fill(sample);
        }
    }
}

/// A note sink that plays WAV clips on a cpal output device.
pub struct Sink {
    name: String,
    config: config::Sink,
    device_rate: u32,
    shared: Arc<Shared>,
    /// Dropping this ends the output thread, which owns the stream.
    _shutdown: Sender<()>,
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} Hz)", self.name, self.device_rate)
    }
}

impl Sink {
    /// Opens the configured output device and loads every clip.
    pub fn get(config: &config::Sink, base_path: &Path) -> Result<Sink, Box<dyn Error>> {
        let span = span!(Level::INFO, "open sink (cpal)");
        let _enter = span.enter();

        let clips = config
            .clip_paths(base_path)
            .iter()
            .map(|path| Clip::load(path))
            .collect::<Result<Vec<_>, _>>()?;

        let device = find_device(config.audio_device())?;
        let name = device.name()?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let stream_config = output_config(&supported);
        let device_rate = stream_config.sample_rate;

        let shared = Arc::new(Shared {
            clips,
            voice: Mutex::new(None),
            stream_failed: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        {
            let shared = shared.clone();
            // The stream isn't Send, so it's created and kept alive on its own thread.
            thread::spawn(move || {
                let stream = match sample_format {
                    cpal::SampleFormat::I16 => {
                        build_stream::<i16>(&device, &stream_config, shared.clone())
                    }
                    cpal::SampleFormat::I32 => {
                        build_stream::<i32>(&device, &stream_config, shared.clone())
                    }
                    _ => build_stream::<f32>(&device, &stream_config, shared.clone()),
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Blocks until the sink is dropped.
                let _ = shutdown_rx.recv();
                debug!("Output stream closed.");
            });
        }

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SinkError::Stream(e).into()),
            Err(_) => return Err(SinkError::Stream("output thread exited".to_string()).into()),
        }

        info!(
            device = name,
            rate = device_rate,
            clips = shared.clips.len(),
            "Output stream started."
        );

        Ok(Sink {
            name,
            config: config.clone(),
            device_rate,
            shared,
            _shutdown: shutdown_tx,
        })
    }

    fn clip(&self, clip: ClipIndex) -> Result<&Clip, SinkError> {
        self.shared.clips.get(clip).ok_or(SinkError::UnknownClip {
            clip,
            count: self.shared.clips.len(),
        })
    }
}

impl NoteSink for Sink {
    fn clip_count(&self) -> usize {
        self.shared.clips.len()
    }

    fn duration(&self, clip: ClipIndex) -> Result<Duration, SinkError> {
        Ok(self.clip(clip)?.duration())
    }

    fn start(&self, clip: ClipIndex, pitch: f32) -> Result<(), SinkError> {
        if self.shared.stream_failed.load(Ordering::Relaxed) {
            return Err(SinkError::Stream(format!("{} is not running", self.name)));
        }
        let step = self.config.playback_rate(pitch) as f64 * self.clip(clip)?.sample_rate() as f64
            / self.device_rate as f64;
        *self.shared.voice.lock() = Some(Voice {
            clip,
            position: 0.0,
            step,
        });
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        *self.shared.voice.lock() = None;
        Ok(())
    }

    fn is_producing_sound(&self) -> bool {
        !self.shared.stream_failed.load(Ordering::Relaxed) && self.shared.voice.lock().is_some()
    }
}

/// Builds an output stream rendering the shared voice, converting from f32 as needed.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let error_shared = shared.clone();
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            shared.render(&mut scratch, channels);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        move |err| {
            error!(err = err.to_string(), "Output stream error.");
            error_shared.stream_failed.store(true, Ordering::Relaxed);
        },
        None,
    )
}

/// Finds an output device by substring, or the host default if no name is given.
fn find_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    let host = cpal::default_host();
    let name = match name {
        Some(name) => name,
        None => {
            return host
                .default_output_device()
                .ok_or_else(|| "no default output device".into())
        }
    };

    let mut matches = host
        .output_devices()?
        .filter(|device| device.name().is_ok_and(|device_name| device_name.contains(name)))
        .collect::<Vec<_>>();
    match matches.len() {
        0 => Err(format!("no output device found with name {}", name).into()),
        1 => Ok(matches.remove(0)),
        count => Err(format!("{} output devices match {}", count, name).into()),
    }
}

/// Lists output device names across every available host.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    let mut names = Vec::new();
    for host_id in cpal::available_hosts() {
        let devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(format!("{} ({})", name, host_id.name()));
            }
        }
    }
    names.sort();
    Ok(names)
}

/// The stream configuration for the device's default output format.
fn output_config(supported: &cpal::SupportedStreamConfig) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    }
}
