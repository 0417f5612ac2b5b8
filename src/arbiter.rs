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

//! Decides which single note is audible out of the notes held down.

use tracing::debug;

use crate::{
    config::VoicePolicy,
    ingest::{NoteEvent, NoteKind},
};

/// What the playback driver should do after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Make the given note audible.
    Switch(u8),
    /// Silence playback.
    Stop,
    /// Nothing audible changed.
    Unchanged,
}

/// The notes currently held down, oldest first. A note appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeldNotes {
    notes: Vec<u8>,
}

impl HeldNotes {
    /// Adds a note as the most recent one. Pressing a held note again moves it to the end.
    pub fn press(&mut self, note: u8) {
        self.release(note);
        self.notes.push(note);
    }

    /// Removes a note. Returns false if it wasn't held.
    pub fn release(&mut self, note: u8) -> bool {
        match self.notes.iter().position(|held| *held == note) {
            Some(index) => {
                self.notes.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn contains(&self, note: u8) -> bool {
        self.notes.contains(&note)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// The held notes in press order.
    pub fn as_slice(&self) -> &[u8] {
        &self.notes
    }

    /// Picks the note that should sound under the given policy.
    pub fn select(&self, policy: VoicePolicy) -> Option<u8> {
        match policy {
            VoicePolicy::MostRecent => self.notes.last().copied(),
            VoicePolicy::Highest => self.notes.iter().max().copied(),
            VoicePolicy::Lowest => self.notes.iter().min().copied(),
        }
    }
}

/// Owns the held notes and the audible note.
#[derive(Clone, Debug, Default)]
pub struct NoteArbiter {
    held: HeldNotes,
    audible: Option<u8>,
    policy: VoicePolicy,
}

impl NoteArbiter {
    pub fn new(policy: VoicePolicy) -> NoteArbiter {
        NoteArbiter {
            held: HeldNotes::default(),
            audible: None,
            policy,
        }
    }

    /// Applies an ingested note event.
    pub fn apply(&mut self, event: &NoteEvent) -> Decision {
        match event.kind() {
            NoteKind::On if event.velocity() == 0 => self.note_off(event.note()),
            NoteKind::On => self.note_on(event.note()),
            NoteKind::Off => self.note_off(event.note()),
            NoteKind::AllOff => self.all_notes_off(),
        }
    }

    pub fn note_on(&mut self, note: u8) -> Decision {
        debug!(note, "Note on.");
        self.held.press(note);
        self.retarget()
    }

    pub fn note_off(&mut self, note: u8) -> Decision {
        debug!(note, "Note off.");
        if !self.held.release(note) {
            return Decision::Unchanged;
        }
        if self.audible != Some(note) {
            return Decision::Unchanged;
        }
        self.retarget()
    }

    pub fn all_notes_off(&mut self) -> Decision {
        debug!(held = self.held.len(), "All notes off.");
        self.clear();
        Decision::Stop
    }

    /// Forgets every held note without producing a decision.
    pub fn clear(&mut self) {
        self.held.clear();
        self.audible = None;
    }

    pub fn held(&self) -> &HeldNotes {
        &self.held
    }

    pub fn audible(&self) -> Option<u8> {
        self.audible
    }

    pub fn policy(&self) -> VoicePolicy {
        self.policy
    }

    fn retarget(&mut self) -> Decision {
        let target = self.held.select(self.policy);
        if target == self.audible {
            return Decision::Unchanged;
        }
        self.audible = target;
        match target {
            Some(note) => Decision::Switch(note),
            None => Decision::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Instant};

    use super::*;

    #[test]
    fn test_single_note_on_off() {
        let mut arbiter = NoteArbiter::default();
        assert_eq!(arbiter.note_on(60), Decision::Switch(60));
        assert_eq!(arbiter.audible(), Some(60));
        assert_eq!(arbiter.note_off(60), Decision::Stop);
        assert_eq!(arbiter.audible(), None);
        assert!(arbiter.held().is_empty());
    }

    #[test]
    fn test_most_recent_wins_and_falls_back() {
        let mut arbiter = NoteArbiter::default();
        assert_eq!(arbiter.note_on(60), Decision::Switch(60));
        assert_eq!(arbiter.note_on(64), Decision::Switch(64));
        assert_eq!(arbiter.note_on(67), Decision::Switch(67));

        // Releasing a note that isn't audible changes nothing.
        assert_eq!(arbiter.note_off(64), Decision::Unchanged);
        assert_eq!(arbiter.held().as_slice(), &[60, 67]);

        assert_eq!(arbiter.note_off(67), Decision::Switch(60));
        assert_eq!(arbiter.note_off(60), Decision::Stop);
    }

    #[test]
    fn test_repeated_note_on_moves_to_most_recent() {
        let mut arbiter = NoteArbiter::default();
        arbiter.note_on(60);
        arbiter.note_on(64);
        assert_eq!(arbiter.note_on(60), Decision::Switch(60));
        assert_eq!(arbiter.held().as_slice(), &[64, 60]);
        assert_eq!(arbiter.note_on(60), Decision::Unchanged);
        assert_eq!(arbiter.held().len(), 2);
    }

    #[test]
    fn test_unknown_note_off_is_noop() {
        let mut arbiter = NoteArbiter::default();
        assert_eq!(arbiter.note_off(60), Decision::Unchanged);
        arbiter.note_on(62);
        assert_eq!(arbiter.note_off(60), Decision::Unchanged);
        assert_eq!(arbiter.audible(), Some(62));
    }

    #[test]
    fn test_all_notes_off() {
        let mut arbiter = NoteArbiter::default();
        arbiter.note_on(60);
        arbiter.note_on(61);
        assert_eq!(arbiter.all_notes_off(), Decision::Stop);
        assert!(arbiter.held().is_empty());
        assert_eq!(arbiter.audible(), None);
    }

    #[test]
    fn test_highest_policy() {
        let mut arbiter = NoteArbiter::new(VoicePolicy::Highest);
        assert_eq!(arbiter.note_on(64), Decision::Switch(64));
        assert_eq!(arbiter.note_on(60), Decision::Unchanged);
        assert_eq!(arbiter.note_on(72), Decision::Switch(72));
        assert_eq!(arbiter.note_off(72), Decision::Switch(64));
    }

    #[test]
    fn test_lowest_policy() {
        let mut arbiter = NoteArbiter::new(VoicePolicy::Lowest);
        assert_eq!(arbiter.note_on(64), Decision::Switch(64));
        assert_eq!(arbiter.note_on(72), Decision::Unchanged);
        assert_eq!(arbiter.note_on(60), Decision::Switch(60));
        assert_eq!(arbiter.note_off(64), Decision::Unchanged);
        assert_eq!(arbiter.note_off(60), Decision::Switch(72));
    }

    #[test]
    fn test_velocity_zero_note_on_is_note_off() {
        let mut arbiter = NoteArbiter::default();
        let now = Instant::now();
        arbiter.apply(&NoteEvent::new(NoteKind::On, 60, 100, now));
        assert_eq!(
            arbiter.apply(&NoteEvent::new(NoteKind::On, 60, 0, now)),
            Decision::Stop
        );
        assert!(arbiter.held().is_empty());
    }

    #[test]
    fn test_held_set_matches_unmatched_note_ons() {
        // A fixed pseudo random walk over a small set of notes.
        let mut arbiter = NoteArbiter::default();
        let mut expected: HashSet<u8> = HashSet::new();
        let mut seed: u32 = 12345;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let note = 60 + ((seed >> 16) % 8) as u8;
            let on = (seed >> 8) % 3 != 0;
            let decision = if on {
                expected.insert(note);
                arbiter.note_on(note)
            } else {
                expected.remove(&note);
                arbiter.note_off(note)
            };

            let held: HashSet<u8> = arbiter.held().as_slice().iter().copied().collect();
            assert_eq!(held, expected);
            assert_eq!(held.len(), arbiter.held().len());

            // At most one audible note, and it's always a held one.
            match arbiter.audible() {
                Some(audible) => assert!(arbiter.held().contains(audible)),
                None => assert!(arbiter.held().is_empty()),
            }
            if let Decision::Switch(note) = decision {
                assert_eq!(arbiter.audible(), Some(note));
            }
        }
    }
}
