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

//! YAML configuration for a session.
//!
//! Every section is optional and falls back to defaults that match the
//! reference bugle samples, so an empty file is a valid configuration.

use std::time::Duration;

use duration_string::DurationString;

mod broadcast;
mod error;
mod midi;
mod pitch;
mod playback;
mod session;
mod sink;

pub use broadcast::Broadcast;
pub use error::ConfigError;
pub use midi::Midi;
pub use pitch::{PitchCalibration, TransposeRange};
pub use playback::{Playback, VoicePolicy, Watchdog};
pub use session::Session;
pub use sink::Sink;

/// Parses an optional human readable duration ("50ms", "10s"), returning the default if unset.
pub(crate) fn parse_duration(
    field: &'static str,
    value: Option<&String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|_| ConfigError::InvalidDuration {
                field,
                value: value.clone(),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::parse_duration;

    #[test]
    fn test_parse_duration() {
        let default = Duration::from_millis(7);
        assert_eq!(
            parse_duration("cooldown", None, default).unwrap(),
            Duration::from_millis(7)
        );
        assert_eq!(
            parse_duration("cooldown", Some(&"50ms".to_string()), default).unwrap(),
            Duration::from_millis(50)
        );
        assert_eq!(
            parse_duration("cooldown", Some(&"10s".to_string()), default).unwrap(),
            Duration::from_secs(10)
        );
        assert!(parse_duration("cooldown", Some(&"soon".to_string()), default).is_err());
    }
}
