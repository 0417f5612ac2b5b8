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

//! Hands MIDI events from the driver thread to the tick context.

use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use midly::{live::LiveEvent, num::u4, MidiMessage};
use tracing::{debug, trace};

/// All Sound Off.
const CC_ALL_SOUND_OFF: u8 = 120;
/// All Notes Off.
const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
    AllOff,
}

/// A single note event. Consumed exactly once by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    kind: NoteKind,
    note: u8,
    velocity: u8,
    timestamp: Instant,
}

impl NoteEvent {
    pub fn new(kind: NoteKind, note: u8, velocity: u8, timestamp: Instant) -> NoteEvent {
        NoteEvent {
            kind,
            note: note & 0x7f,
            velocity: velocity & 0x7f,
            timestamp,
        }
    }

    /// Parses a raw MIDI message. Returns None for anything that isn't a note or a
    /// note-silencing controller, or that's outside the channel filter.
    pub fn from_raw(raw: &[u8], timestamp: Instant, channel_filter: Option<u4>) -> Option<NoteEvent> {
        let (channel, message) = match LiveEvent::parse(raw) {
            Ok(LiveEvent::Midi { channel, message }) => (channel, message),
            _ => return None,
        };
        if channel_filter.is_some_and(|filter| filter != channel) {
            return None;
        }

        match message {
            MidiMessage::NoteOn { key, vel } => Some(NoteEvent::new(
                NoteKind::On,
                key.as_int(),
                vel.as_int(),
                timestamp,
            )),
            MidiMessage::NoteOff { key, vel } => Some(NoteEvent::new(
                NoteKind::Off,
                key.as_int(),
                vel.as_int(),
                timestamp,
            )),
            MidiMessage::Controller { controller, .. }
                if controller.as_int() == CC_ALL_SOUND_OFF
                    || controller.as_int() == CC_ALL_NOTES_OFF =>
            {
                Some(NoteEvent::new(NoteKind::AllOff, 0, 0, timestamp))
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// A message from the MIDI driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestMessage {
    Note(NoteEvent),
    DeviceError(String),
}

/// The receiving end of the queue, owned by the tick context.
pub struct Ingest {
    sender: Sender<IngestMessage>,
    receiver: Receiver<IngestMessage>,
}

impl Default for Ingest {
    fn default() -> Self {
        Ingest::new()
    }
}

impl Ingest {
    pub fn new() -> Ingest {
        let (sender, receiver) = unbounded();
        Ingest { sender, receiver }
    }

    /// Creates a handle for a MIDI driver to push onto.
    pub fn handle(&self, channel_filter: Option<u4>) -> IngestHandle {
        IngestHandle {
            sender: self.sender.clone(),
            channel_filter,
        }
    }

    /// Takes the messages queued when the drain started, in arrival order. Messages
    /// pushed while draining are left for the next call.
    pub fn drain(&self) -> Vec<IngestMessage> {
        let pending = self.receiver.len();
        self.receiver.try_iter().take(pending).collect()
    }

    /// Drops everything queued. Returns the number of discarded messages.
    pub fn discard_pending(&self) -> usize {
        let discarded = self.receiver.try_iter().count();
        if discarded > 0 {
            debug!(discarded, "Discarded pending MIDI messages.");
        }
        discarded
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// The producing end of the queue. Never blocks.
#[derive(Clone)]
pub struct IngestHandle {
    sender: Sender<IngestMessage>,
    channel_filter: Option<u4>,
}

impl IngestHandle {
    /// Parses and enqueues a raw MIDI message, dropping anything irrelevant.
    pub fn push_raw(&self, raw: &[u8], timestamp: Instant) {
        match NoteEvent::from_raw(raw, timestamp, self.channel_filter) {
            Some(event) => self.push(event),
            None => trace!(raw = format!("{:02x?}", raw), "Ignoring MIDI message."),
        }
    }

    pub fn push(&self, event: NoteEvent) {
        self.send(IngestMessage::Note(event));
    }

    /// Reports a driver failure to the tick context.
    pub fn report_error(&self, message: impl Into<String>) {
        self.send(IngestMessage::DeviceError(message.into()));
    }

    fn send(&self, message: IngestMessage) {
        // Only fails once the session is gone.
        if self.sender.send(message).is_err() {
            debug!("Session closed, dropping MIDI message.");
        }
    }
}
