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

//! Drives the sink and the broadcast channel for the audible note.
//!
//! Clips are shorter than a held note, so a held note is looped by stopping the
//! clip when it runs out and starting it again after a short cooldown. Nothing
//! here sleeps: every delay is a deadline checked by [PlaybackDriver::tick], so
//! the driver only ever runs on the tick context and can be tested with
//! synthetic time.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::{
    broadcast::BroadcastChannel,
    pitch::{ClipIndex, NoteMapping},
    sink::NoteSink,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Nothing is playing.
    #[default]
    Idle,
    /// A clip is playing.
    Holding,
    /// The sink was stopped and must stay silent until the cooldown expires.
    Cooldown,
}

/// Everything the driver knows about what's playing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackState {
    phase: PlaybackPhase,
    current: Option<NoteMapping>,
    clip_start: Option<Instant>,
    clip_duration: Duration,
    cooldown_until: Option<Instant>,
    queued_next: Option<NoteMapping>,
}

impl PlaybackState {
    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Whether a clip is playing.
    pub fn is_active(&self) -> bool {
        self.phase == PlaybackPhase::Holding
    }

    pub fn clip(&self) -> Option<ClipIndex> {
        self.current.map(|mapping| mapping.clip)
    }

    pub fn pitch(&self) -> Option<f32> {
        self.current.map(|mapping| mapping.pitch)
    }

    pub fn current(&self) -> Option<NoteMapping> {
        self.current
    }

    pub fn clip_start(&self) -> Option<Instant> {
        self.clip_start
    }

    pub fn clip_duration(&self) -> Duration {
        self.clip_duration
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    /// The note to start once the cooldown expires.
    pub fn queued_next(&self) -> Option<NoteMapping> {
        self.queued_next
    }
}

/// The playback state machine.
pub struct PlaybackDriver {
    state: PlaybackState,
    cooldown: Duration,
    broadcast_delay: Duration,
    /// A start message waiting to be sent to peers.
    pending_start: Option<(Instant, NoteMapping)>,
    /// Whether the queued note is the loop restart of the clip that just ran out.
    retrigger: bool,
}

impl PlaybackDriver {
    pub fn new(cooldown: Duration, broadcast_delay: Duration) -> PlaybackDriver {
        PlaybackDriver {
            state: PlaybackState::default(),
            cooldown,
            broadcast_delay,
            pending_start: None,
            retrigger: false,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// When the pending start broadcast is due, if there is one.
    pub fn pending_start(&self) -> Option<Instant> {
        self.pending_start.map(|(due, _)| due)
    }

    /// Makes the mapping audible. During a cooldown it replaces the queued note instead.
    pub fn switch_to(
        &mut self,
        now: Instant,
        mapping: NoteMapping,
        sink: &dyn NoteSink,
        channel: &dyn BroadcastChannel,
    ) {
        match self.state.phase {
            PlaybackPhase::Cooldown => {
                debug!(%mapping, "Queueing until the cooldown expires.");
                self.state.queued_next = Some(mapping);
                self.retrigger = false;
                return;
            }
            PlaybackPhase::Holding => {
                // Peers keep the old note until the new start reaches them.
                log_sink_error(sink.stop(), "stop");
            }
            PlaybackPhase::Idle => {}
        }

        self.start(now, mapping, self.broadcast_delay, sink, channel);
    }

    /// Starts the clip and schedules the start broadcast after `delay`.
    fn start(
        &mut self,
        now: Instant,
        mapping: NoteMapping,
        delay: Duration,
        sink: &dyn NoteSink,
        channel: &dyn BroadcastChannel,
    ) {
        debug!(%mapping, "Starting clip.");
        log_sink_error(sink.start(mapping.clip, mapping.pitch), "start");
        let clip_duration = match sink.duration(mapping.clip) {
            Ok(duration) => duration,
            Err(e) => {
                warn!(err = e.to_string(), "Unable to get clip duration, not looping.");
                Duration::ZERO
            }
        };

        self.state = PlaybackState {
            phase: PlaybackPhase::Holding,
            current: Some(mapping),
            clip_start: Some(now),
            clip_duration,
            cooldown_until: None,
            queued_next: None,
        };

        if delay.is_zero() {
            self.pending_start = None;
            log_broadcast_error(channel.broadcast_start(mapping.clip, mapping.pitch), "start");
        } else {
            self.pending_start = Some((now + delay, mapping));
        }
    }

    /// Advances deadlines: sends due start broadcasts, loops clips that ran out and
    /// leaves the cooldown once it has expired.
    pub fn tick(&mut self, now: Instant, sink: &dyn NoteSink, channel: &dyn BroadcastChannel) {
        if self.pending_start.is_some_and(|(due, _)| now >= due) {
            self.flush_pending_start(channel);
        }

        match self.state.phase {
            PlaybackPhase::Holding => {
                let clip_duration = self.state.clip_duration;
                let expired = self
                    .state
                    .clip_start
                    .is_some_and(|start| now.saturating_duration_since(start) >= clip_duration);
                if clip_duration.is_zero() || !expired {
                    return;
                }

                debug!("Clip ran out, retriggering after the cooldown.");
                self.silence(sink, channel);
                self.state.phase = PlaybackPhase::Cooldown;
                self.state.cooldown_until = Some(now + self.cooldown);
                self.state.queued_next = self.state.current;
                self.retrigger = true;
            }
            PlaybackPhase::Cooldown => {
                if self.state.cooldown_until.is_some_and(|until| now < until) {
                    return;
                }

                let next = self.state.queued_next.take();
                let retrigger = std::mem::take(&mut self.retrigger);
                self.state = PlaybackState::default();
                match next {
                    // Peers already waited out the cooldown since the end message.
                    Some(next) if retrigger => self.start(now, next, Duration::ZERO, sink, channel),
                    Some(next) => self.switch_to(now, next, sink, channel),
                    None => {}
                }
            }
            PlaybackPhase::Idle => {}
        }
    }

    /// Stops playback. During a cooldown the sink is already silent, so only the
    /// queued note is dropped and the phase stays [PlaybackPhase::Cooldown] until
    /// the cooldown expires. Going straight to Idle would let the next note start
    /// inside the silent interval.
    pub fn stop(&mut self, _now: Instant, sink: &dyn NoteSink, channel: &dyn BroadcastChannel) {
        match self.state.phase {
            PlaybackPhase::Holding => {
                debug!("Stopping clip.");
                self.silence(sink, channel);
                self.state = PlaybackState::default();
            }
            PlaybackPhase::Cooldown => {
                self.state.queued_next = None;
                self.retrigger = false;
            }
            PlaybackPhase::Idle => {}
        }
    }

    /// Silences anything playing and forgets all state, including a running cooldown.
    pub fn reset(&mut self, now: Instant, sink: &dyn NoteSink, channel: &dyn BroadcastChannel) {
        self.stop(now, sink, channel);
        self.state = PlaybackState::default();
        self.pending_start = None;
        self.retrigger = false;
    }

    /// Stops the sink and tells peers. A start that hasn't gone out yet is sent
    /// first so peers never see the end before the start.
    fn silence(&mut self, sink: &dyn NoteSink, channel: &dyn BroadcastChannel) {
        self.flush_pending_start(channel);
        log_sink_error(sink.stop(), "stop");
        log_broadcast_error(channel.broadcast_stop(), "stop");
    }

    fn flush_pending_start(&mut self, channel: &dyn BroadcastChannel) {
        if let Some((_, mapping)) = self.pending_start.take() {
            log_broadcast_error(channel.broadcast_start(mapping.clip, mapping.pitch), "start");
        }
    }
}

fn log_sink_error(result: Result<(), crate::sink::SinkError>, action: &'static str) {
    if let Err(e) = result {
        error!(err = e.to_string(), action, "Note sink failed.");
    }
}

fn log_broadcast_error(result: Result<(), crate::broadcast::BroadcastError>, action: &'static str) {
    if let Err(e) = result {
        warn!(err = e.to_string(), action, "Broadcast failed.");
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{
        broadcast::mock::{BroadcastEvent, Channel},
        sink::mock::{Sink, SinkEvent},
    };

    const CLIP: Duration = Duration::from_millis(300);
    const COOLDOWN: Duration = Duration::from_millis(50);
    const DELAY: Duration = Duration::from_millis(50);

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn setup() -> (PlaybackDriver, Sink, Channel) {
        (
            PlaybackDriver::new(COOLDOWN, DELAY),
            Sink::new("mock", vec![CLIP; 4]),
            Channel::new(),
        )
    }

    fn mapping(clip: ClipIndex, pitch: f32) -> NoteMapping {
        NoteMapping { clip, pitch }
    }

    #[test]
    fn test_start_then_delayed_broadcast() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(1, 0.5), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);
        assert_eq!(sink.events(), vec![SinkEvent::Start { clip: 1, pitch: 0.5 }]);
        assert!(channel.events().is_empty());

        driver.tick(t0 + ms(49), &sink, &channel);
        assert!(channel.events().is_empty());

        driver.tick(t0 + ms(50), &sink, &channel);
        assert_eq!(
            channel.events(),
            vec![BroadcastEvent::Start { clip: 1, pitch: 0.5 }]
        );
    }

    #[test]
    fn test_zero_delay_broadcasts_immediately() {
        let mut driver = PlaybackDriver::new(COOLDOWN, Duration::ZERO);
        let sink = Sink::new("mock", vec![CLIP; 4]);
        let channel = Channel::new();

        driver.switch_to(Instant::now(), mapping(0, 0.1), &sink, &channel);
        assert_eq!(
            channel.events(),
            vec![BroadcastEvent::Start { clip: 0, pitch: 0.1 }]
        );
        assert_eq!(driver.pending_start(), None);
    }

    #[test]
    fn test_loop_after_one_cooldown() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(2, 0.7), &sink, &channel);
        driver.tick(t0 + ms(50), &sink, &channel);
        driver.tick(t0 + ms(299), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);

        driver.tick(t0 + ms(300), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Cooldown);
        assert_eq!(driver.state().cooldown_until(), Some(t0 + ms(350)));
        assert_eq!(driver.state().queued_next(), Some(mapping(2, 0.7)));
        assert!(!sink.is_playing());

        // Nothing happens until the cooldown expires.
        driver.tick(t0 + ms(349), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Cooldown);

        driver.tick(t0 + ms(350), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);
        assert_eq!(driver.state().clip_start(), Some(t0 + ms(350)));
        assert_eq!(
            sink.events(),
            vec![
                SinkEvent::Start { clip: 2, pitch: 0.7 },
                SinkEvent::Stop,
                SinkEvent::Start { clip: 2, pitch: 0.7 },
            ]
        );

        // The restart goes out to peers right away, not after the start delay.
        assert_eq!(driver.pending_start(), None);
        assert_eq!(
            channel.events(),
            vec![
                BroadcastEvent::Start { clip: 2, pitch: 0.7 },
                BroadcastEvent::Stop,
                BroadcastEvent::Start { clip: 2, pitch: 0.7 },
            ]
        );
    }

    #[test]
    fn test_note_change_after_cooldown_keeps_broadcast_delay() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(0, 0.2), &sink, &channel);
        driver.tick(t0 + ms(300), &sink, &channel);
        channel.clear_events();

        driver.switch_to(t0 + ms(320), mapping(3, 0.9), &sink, &channel);
        driver.tick(t0 + ms(350), &sink, &channel);
        assert_eq!(driver.pending_start(), Some(t0 + ms(400)));
        assert!(channel.events().is_empty());

        driver.tick(t0 + ms(400), &sink, &channel);
        assert_eq!(
            channel.events(),
            vec![BroadcastEvent::Start { clip: 3, pitch: 0.9 }]
        );
    }

    #[test]
    fn test_switch_during_cooldown_replaces_queued() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(0, 0.2), &sink, &channel);
        driver.tick(t0 + ms(300), &sink, &channel);
        sink.clear_events();

        driver.switch_to(t0 + ms(310), mapping(3, 0.9), &sink, &channel);
        driver.switch_to(t0 + ms(320), mapping(1, 0.4), &sink, &channel);
        assert!(sink.events().is_empty());
        assert_eq!(driver.state().queued_next(), Some(mapping(1, 0.4)));

        driver.tick(t0 + ms(350), &sink, &channel);
        assert_eq!(sink.events(), vec![SinkEvent::Start { clip: 1, pitch: 0.4 }]);
    }

    #[test]
    fn test_switch_while_holding_restarts_without_end() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(0, 0.2), &sink, &channel);
        driver.tick(t0 + ms(60), &sink, &channel);
        driver.switch_to(t0 + ms(100), mapping(1, 0.3), &sink, &channel);

        assert_eq!(
            sink.events(),
            vec![
                SinkEvent::Start { clip: 0, pitch: 0.2 },
                SinkEvent::Stop,
                SinkEvent::Start { clip: 1, pitch: 0.3 },
            ]
        );
        assert_eq!(
            channel.events(),
            vec![BroadcastEvent::Start { clip: 0, pitch: 0.2 }]
        );
        assert_eq!(driver.state().clip_start(), Some(t0 + ms(100)));
    }

    #[test]
    fn test_stop_flushes_pending_start() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(1, 0.5), &sink, &channel);
        driver.stop(t0 + ms(10), &sink, &channel);

        assert_eq!(driver.state().phase(), PlaybackPhase::Idle);
        assert_eq!(
            channel.events(),
            vec![
                BroadcastEvent::Start { clip: 1, pitch: 0.5 },
                BroadcastEvent::Stop
            ]
        );

        // No start sneaks out later.
        driver.tick(t0 + ms(100), &sink, &channel);
        assert_eq!(channel.events().len(), 2);
    }

    #[test]
    fn test_stop_during_cooldown_drops_queued() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(1, 0.5), &sink, &channel);
        driver.tick(t0 + ms(300), &sink, &channel);
        sink.clear_events();
        channel.clear_events();

        driver.stop(t0 + ms(310), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Cooldown);
        assert_eq!(driver.state().queued_next(), None);

        driver.tick(t0 + ms(350), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Idle);
        assert!(sink.events().is_empty());
        assert!(channel.events().is_empty());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut driver, sink, channel) = setup();
        driver.stop(Instant::now(), &sink, &channel);
        assert!(sink.events().is_empty());
        assert!(channel.events().is_empty());
    }

    #[test]
    fn test_zero_duration_clip_never_loops() {
        let mut driver = PlaybackDriver::new(COOLDOWN, DELAY);
        let sink = Sink::new("mock", vec![Duration::ZERO]);
        let channel = Channel::new();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(0, 0.5), &sink, &channel);
        driver.tick(t0 + ms(5000), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(1, 0.5), &sink, &channel);
        driver.tick(t0 + ms(300), &sink, &channel);
        driver.reset(t0 + ms(310), &sink, &channel);
        assert_eq!(driver.state(), &PlaybackState::default());

        driver.switch_to(t0 + ms(320), mapping(2, 0.5), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);
    }

    #[test]
    fn test_sink_failures_do_not_stop_bookkeeping() {
        let (mut driver, sink, channel) = setup();
        let t0 = Instant::now();
        sink.set_failing(true);
        channel.set_failing(true);

        driver.switch_to(t0, mapping(1, 0.5), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);
        driver.tick(t0 + ms(300), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Cooldown);
        driver.stop(t0 + ms(310), &sink, &channel);
        driver.tick(t0 + ms(350), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_unknown_clip_duration_does_not_loop() {
        let mut driver = PlaybackDriver::new(COOLDOWN, DELAY);
        let sink = Sink::new("mock", vec![CLIP]);
        let channel = Channel::new();
        let t0 = Instant::now();

        driver.switch_to(t0, mapping(5, 0.5), &sink, &channel);
        assert_eq!(driver.state().clip_duration(), Duration::ZERO);
        driver.tick(t0 + ms(1000), &sink, &channel);
        assert_eq!(driver.state().phase(), PlaybackPhase::Holding);
    }
}
