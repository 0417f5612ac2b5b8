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

//! Runs a session: ticks it, follows the configured MIDI device as it comes and
//! goes, and reloads the device setting on SIGHUP.

use std::{
    error::Error,
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, span, warn, Level};

use crate::{broadcast, config, midi, session::Session, sink};

/// How often the bound device is checked for removal or reappearance.
const DEVICE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Reload requests. SIGHUP on unix; elsewhere nothing ever arrives.
struct Hangup {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl Hangup {
    fn new() -> io::Result<Hangup> {
        Ok(Hangup {
            #[cfg(unix)]
            signal: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if self.signal.recv().await.is_some() {
            return;
        }
        std::future::pending::<()>().await
    }
}

pub struct Host {
    config_path: PathBuf,
    config: config::Session,
    session: Session,
}

impl Host {
    /// Loads the configuration, opens the sink and the broadcast channel, and binds
    /// the configured MIDI device if it's connected.
    pub fn new(config_path: &Path) -> Result<Host, Box<dyn Error>> {
        let span = span!(Level::INFO, "host");
        let _enter = span.enter();

        let config = config::Session::deserialize(config_path)?;
        let sink = sink::get_sink(config.sink(), config.pitch().clip_count(), config.base_path())?;
        let channel = broadcast::get_channel(config.broadcast())?;
        let session = Session::new(&config, sink, channel)?;

        let mut host = Host {
            config_path: config_path.to_path_buf(),
            config,
            session,
        };
        host.open_configured_device(Instant::now());
        Ok(host)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Closes a bound device that has been unplugged and binds the configured device
    /// once it shows up again.
    pub fn check_device(&mut self, now: Instant) {
        match self.session.device_name() {
            Some(bound) => match midi::device_present(&bound) {
                Ok(true) => {}
                Ok(false) => self.session.on_device_error("device disconnected", now),
                Err(e) => warn!(err = e.to_string(), "Unable to enumerate MIDI devices."),
            },
            None => self.open_configured_device(now),
        }
    }

    /// Re-reads the configuration file. A changed MIDI device is reopened, the other
    /// settings apply on the next start.
    pub fn reload(&mut self, now: Instant) -> Result<(), Box<dyn Error>> {
        let config = config::Session::deserialize(&self.config_path)?;
        let previous = self.config.midi().device().map(str::to_string);
        self.config = config;

        if previous.as_deref() == self.config.midi().device() {
            info!("Configuration reloaded, MIDI device unchanged.");
            return Ok(());
        }

        info!(
            previous = previous,
            device = self.config.midi().device(),
            "MIDI device changed, reopening."
        );
        self.session.stop_listening(now);
        self.open_configured_device(now);
        Ok(())
    }

    /// Stops every note and releases the device.
    pub fn shutdown(&mut self, now: Instant) {
        self.session.emergency_stop_all(now);
        self.session.stop_listening(now);
    }

    fn open_configured_device(&mut self, now: Instant) {
        let name = match self.config.midi().device() {
            Some(name) => name.to_string(),
            None => return,
        };
        if let Err(e) = self.session.open_device_by_name(&name, now) {
            debug!(device = name, err = e.to_string(), "MIDI device not available.");
        }
    }
}

/// Runs the session until Ctrl-C.
pub async fn run(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let mut host = Host::new(config_path)?;
    if host.session().device_name().is_none() {
        warn!(
            device = host.config.midi().device(),
            "No MIDI device bound, waiting for it to appear."
        );
    }

    let mut ticks = interval(host.config.playback().tick_interval()?);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut device_checks = interval(DEVICE_CHECK_INTERVAL);
    device_checks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut hangup = Hangup::new()?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Session running.");
    loop {
        tokio::select! {
            _ = ticks.tick() => host.session_mut().process_pending_events(Instant::now()),
            _ = device_checks.tick() => host.check_device(Instant::now()),
            _ = hangup.recv() => {
                if let Err(e) = host.reload(Instant::now()) {
                    error!(err = e.to_string(), "Unable to reload configuration.");
                }
            }
            result = &mut ctrl_c => {
                result?;
                break;
            }
        }
    }

    info!("Shutting down.");
    host.shutdown(Instant::now());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fs, time::Instant};

    use super::*;

    fn write_config(path: &Path, device: &str) -> Result<(), Box<dyn Error>> {
        fs::write(
            path,
            format!(
                r#"
midi:
  device: {}
sink:
  audio_device: mock-sink
"#,
                device
            ),
        )?;
        Ok(())
    }

    #[test]
    fn test_host_binds_configured_device() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("buglehero.yaml");
        write_config(&path, "mock-keys")?;

        let host = Host::new(&path)?;
        assert_eq!(host.session().device_name(), Some("mock-keys".to_string()));
        Ok(())
    }

    #[test]
    fn test_reload_reopens_changed_device() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("buglehero.yaml");
        write_config(&path, "mock-keys")?;
        let mut host = Host::new(&path)?;

        host.reload(Instant::now())?;
        assert_eq!(host.session().device_name(), Some("mock-keys".to_string()));

        write_config(&path, "mock-pads")?;
        host.reload(Instant::now())?;
        assert_eq!(host.session().device_name(), Some("mock-pads".to_string()));
        Ok(())
    }

    #[test]
    fn test_bad_reload_keeps_running() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("buglehero.yaml");
        write_config(&path, "mock-keys")?;
        let mut host = Host::new(&path)?;

        fs::write(&path, "playback:\n  cooldown: whenever\n")?;
        assert!(host.reload(Instant::now()).is_err());
        assert_eq!(host.session().device_name(), Some("mock-keys".to_string()));
        Ok(())
    }

    #[test]
    fn test_check_device_rebinds_after_error() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("buglehero.yaml");
        write_config(&path, "mock-keys")?;
        let mut host = Host::new(&path)?;

        host.session_mut()
            .on_device_error("unplugged", Instant::now());
        assert_eq!(host.session().device_name(), None);

        host.check_device(Instant::now());
        assert_eq!(host.session().device_name(), Some("mock-keys".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_hangup_waits_for_a_signal() -> Result<(), Box<dyn Error>> {
        let mut hangup = Hangup::new()?;
        let waited = tokio::time::timeout(Duration::from_millis(20), hangup.recv()).await;
        assert!(waited.is_err());
        Ok(())
    }
}
