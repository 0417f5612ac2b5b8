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

//! The control surface. A session owns the note state, the sink, the broadcast
//! channel and the MIDI device binding, and is ticked by its host.

use std::{error::Error, sync::Arc, time::Instant};

use midly::num::u4;
use tracing::{debug, info, span, warn, Level};

use crate::{
    arbiter::{Decision, NoteArbiter},
    broadcast::BroadcastChannel,
    config::{self, ConfigError},
    ingest::{Ingest, IngestHandle, IngestMessage},
    midi,
    pitch::PitchMapper,
    playback::{PlaybackDriver, PlaybackPhase, PlaybackState},
    sink::NoteSink,
    watchdog::Watchdog,
};


pub struct Session {
    mapper: PitchMapper,
    arbiter: NoteArbiter,
    driver: PlaybackDriver,
    watchdog: Watchdog,
    ingest: Ingest,
    sink: Box<dyn NoteSink>,
    channel: Box<dyn BroadcastChannel>,
    device: Option<Arc<dyn midi::Device>>,
    channel_filter: Option<u4>,
    last_activity: Option<Instant>,
}

impl Session {
    /// Creates a session with no device bound.
    pub fn new(
        config: &config::Session,
        sink: Box<dyn NoteSink>,
        channel: Box<dyn BroadcastChannel>,
    ) -> Result<Session, ConfigError> {
        let mapper = PitchMapper::new(config.pitch().clone())?;
        if sink.clip_count() < mapper.clip_count() {
            return Err(ConfigError::invalid(
                "sink.clips",
                format!(
                    "the sink has {} clips, the calibration needs {}",
                    sink.clip_count(),
                    mapper.clip_count()
                ),
            ));
        }

        let playback = config.playback();
        let watchdog = config.watchdog();
        info!(sink = %sink, broadcast = %channel, "Session created.");
        Ok(Session {
            mapper,
            arbiter: NoteArbiter::new(playback.voice_policy()),
            driver: PlaybackDriver::new(playback.cooldown()?, playback.broadcast_delay()?),
            watchdog: Watchdog::new(watchdog.inactivity_timeout()?, watchdog.silence_grace()?),
            ingest: Ingest::new(),
            sink,
            channel,
            device: None,
            channel_filter: config.midi().channel()?,
            last_activity: None,
        })
    }

    /// Binds a MIDI device, closing and forgetting the previous one first.
    pub fn open_device(
        &mut self,
        device: Arc<dyn midi::Device>,
        now: Instant,
    ) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "open device");
        let _enter = span.enter();

        self.close_device(now);
        device.listen(self.ingest.handle(self.channel_filter))?;
        info!(device = device.name(), "MIDI device opened.");
        self.device = Some(device);
        Ok(())
    }

    /// Looks up and binds a MIDI device by name. The current binding is kept if the
    /// lookup fails.
    pub fn open_device_by_name(&mut self, name: &str, now: Instant) -> Result<(), Box<dyn Error>> {
        let device = midi::get_device(name)?;
        self.open_device(device, now)
    }

    /// Closes the bound device, if any, and resets all note state.
    pub fn stop_listening(&mut self, now: Instant) {
        self.close_device(now);
    }

    /// Processes everything the device sent since the last call, then advances the
    /// playback deadlines and runs the watchdog. Called once per tick.
    pub fn process_pending_events(&mut self, now: Instant) {
        for message in self.ingest.drain() {
            match message {
                IngestMessage::Note(event) => {
                    self.last_activity = Some(event.timestamp());
                    let decision = self.arbiter.apply(&event);
                    self.apply(now, decision);
                }
                IngestMessage::DeviceError(message) => {
                    // Anything after the error came from a device that's gone.
                    self.on_device_error(&message, now);
                    break;
                }
            }
        }

        self.driver
            .tick(now, self.sink.as_ref(), self.channel.as_ref());

        let trip = self.watchdog.check(
            now,
            !self.arbiter.held().is_empty(),
            self.last_activity,
            self.driver.state(),
            self.sink.is_producing_sound(),
        );
        if let Some(trip) = trip {
            warn!(
                reason = %trip,
                held = format!("{:?}", self.arbiter.held().as_slice()),
                "Stuck note detected, releasing everything."
            );
            self.reset(now);
        }
    }

    /// Silences everything and forgets every held note.
    pub fn emergency_stop_all(&mut self, now: Instant) {
        info!("Stopping all notes.");
        self.reset(now);
    }

    /// Handles a failed device: the binding is closed and all state is reset.
    pub fn on_device_error(&mut self, message: &str, now: Instant) {
        warn!(
            device = self.device_name(),
            err = message,
            "MIDI device failed, closing it."
        );
        self.close_device(now);
    }

    /// A handle that pushes onto this session's queue, for hosts that feed MIDI
    /// from somewhere other than a device.
    pub fn ingest_handle(&self) -> IngestHandle {
        self.ingest.handle(self.channel_filter)
    }

    /// The held notes in press order.
    pub fn held_notes(&self) -> &[u8] {
        self.arbiter.held().as_slice()
    }

    pub fn audible_note(&self) -> Option<u8> {
        self.arbiter.audible()
    }

    pub fn playback_phase(&self) -> PlaybackPhase {
        self.driver.state().phase()
    }

    pub fn playback_state(&self) -> &PlaybackState {
        self.driver.state()
    }

    /// The name of the bound device.
    pub fn device_name(&self) -> Option<String> {
        self.device.as_ref().map(|device| device.name())
    }

    pub fn mapper(&self) -> &PitchMapper {
        &self.mapper
    }

    fn apply(&mut self, now: Instant, decision: Decision) {
        match decision {
            Decision::Switch(note) => {
                let mapping = self.mapper.map_note(note);
                debug!(note, %mapping, "Switching note.");
                self.driver
                    .switch_to(now, mapping, self.sink.as_ref(), self.channel.as_ref());
            }
            Decision::Stop => {
                debug!("Stopping note.");
                self.driver
                    .stop(now, self.sink.as_ref(), self.channel.as_ref());
            }
            Decision::Unchanged => {}
        }
    }

    fn close_device(&mut self, now: Instant) {
        if let Some(device) = self.device.take() {
            device.stop_listening();
            info!(device = device.name(), "MIDI device closed.");
        }
        self.ingest.discard_pending();
        self.reset(now);
    }

    fn reset(&mut self, now: Instant) {
        self.arbiter.clear();
        self.driver
            .reset(now, self.sink.as_ref(), self.channel.as_ref());
        self.watchdog.reset();
        self.last_activity = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            device.stop_listening();
        }
        self.driver
            .reset(Instant::now(), self.sink.as_ref(), self.channel.as_ref());
    }
}
