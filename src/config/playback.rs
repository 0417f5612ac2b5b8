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
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};

/// Silence enforced between stopping the sink and starting it again.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(50);

/// How long the remote start message trails local playback.
pub const DEFAULT_BROADCAST_DELAY: Duration = Duration::from_millis(50);

/// How often the host ticks the session.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// How long held notes may go without any MIDI activity before they're released.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time, past the clip length, that the sink may stay silent while holding.
pub const DEFAULT_SILENCE_GRACE: Duration = Duration::from_secs(1);

/// Decides which held note is audible when more than one key is down.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoicePolicy {
    /// The most recently pressed held note sounds.
    #[default]
    MostRecent,
    /// The highest held note sounds.
    Highest,
    /// The lowest held note sounds.
    Lowest,
}

/// A YAML representation of the playback timing configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Playback {
    /// Silence between a forced stop and the next start.
    cooldown: Option<String>,

    /// Delay between starting local playback and telling remote peers.
    broadcast_delay: Option<String>,

    /// The voice stealing policy.
    #[serde(default)]
    voice_policy: VoicePolicy,

    /// How often the session is ticked.
    tick_interval: Option<String>,
}

impl Playback {
    /// Creates a new playback configuration.
    pub fn new(
        cooldown: Option<String>,
        broadcast_delay: Option<String>,
        voice_policy: VoicePolicy,
        tick_interval: Option<String>,
    ) -> Playback {
        Playback {
            cooldown,
            broadcast_delay,
            voice_policy,
            tick_interval,
        }
    }

    /// Returns the cooldown between retriggers.
    pub fn cooldown(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "playback.cooldown",
            self.cooldown.as_ref(),
            DEFAULT_COOLDOWN,
        )
    }

    /// Returns the remote start broadcast delay.
    pub fn broadcast_delay(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "playback.broadcast_delay",
            self.broadcast_delay.as_ref(),
            DEFAULT_BROADCAST_DELAY,
        )
    }

    /// Returns the voice stealing policy.
    pub fn voice_policy(&self) -> VoicePolicy {
        self.voice_policy
    }

    /// Returns the tick interval.
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        let tick_interval = parse_duration(
            "playback.tick_interval",
            self.tick_interval.as_ref(),
            DEFAULT_TICK_INTERVAL,
        )?;
        if tick_interval.is_zero() {
            return Err(ConfigError::invalid(
                "playback.tick_interval",
                "must be greater than zero",
            ));
        }
        Ok(tick_interval)
    }
}

/// A YAML representation of the stuck note watchdog configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Watchdog {
    /// Maximum time held notes may go without MIDI activity.
    inactivity_timeout: Option<String>,

    /// Grace period past the clip length for a silent sink.
    silence_grace: Option<String>,
}

impl Watchdog {
    /// Creates a new watchdog configuration.
    pub fn new(inactivity_timeout: Option<String>, silence_grace: Option<String>) -> Watchdog {
        Watchdog {
            inactivity_timeout,
            silence_grace,
        }
    }

    pub fn inactivity_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "watchdog.inactivity_timeout",
            self.inactivity_timeout.as_ref(),
            DEFAULT_INACTIVITY_TIMEOUT,
        )
    }

    pub fn silence_grace(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "watchdog.silence_grace",
            self.silence_grace.as_ref(),
            DEFAULT_SILENCE_GRACE,
        )
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_playback_defaults() {
        let playback = Playback::default();
        assert_eq!(playback.cooldown().unwrap(), DEFAULT_COOLDOWN);
        assert_eq!(playback.broadcast_delay().unwrap(), DEFAULT_BROADCAST_DELAY);
        assert_eq!(playback.tick_interval().unwrap(), DEFAULT_TICK_INTERVAL);
        assert_eq!(playback.voice_policy(), VoicePolicy::MostRecent);
    }

    #[test]
    fn test_playback_deserialize() {
        let yaml = r#"
            cooldown: 80ms
            broadcast_delay: 0ms
            voice_policy: highest
        "#;

        let playback: Playback = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(playback.cooldown().unwrap(), Duration::from_millis(80));
        assert_eq!(playback.broadcast_delay().unwrap(), Duration::ZERO);
        assert_eq!(playback.voice_policy(), VoicePolicy::Highest);
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let playback = Playback::new(None, None, VoicePolicy::MostRecent, Some("0ms".into()));
        assert!(playback.tick_interval().is_err());
    }

    #[test]
    fn test_watchdog_deserialize() {
        let yaml = r#"
            inactivity_timeout: 5s
        "#;

        let watchdog: Watchdog = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(
            watchdog.inactivity_timeout().unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(watchdog.silence_grace().unwrap(), DEFAULT_SILENCE_GRACE);
    }
}
