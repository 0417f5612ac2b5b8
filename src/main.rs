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
use std::error::Error;
use std::path::PathBuf;

use buglehero::{config, host, midi, pitch, sink};
use clap::{crate_version, Parser, Subcommand};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=MIDI driven bugle

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/buglehero
ExecStart=/usr/local/bin/buglehero start "$BUGLEHERO_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=buglehero.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays a bugle from a MIDI keyboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI input devices.
    Devices {},
    /// Lists the available audio output devices.
    AudioDevices {},
    /// Prints the clip and pitch each note maps to.
    Map {
        /// The MIDI note numbers to map.
        #[arg(required = true)]
        notes: Vec<u8>,
        /// A config file to read the calibration from. The defaults are used if unset.
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Start will run the session until interrupted.
    Start {
        /// The path to the config file.
        config: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::AudioDevices {} => {
            let devices = sink::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Map {
            notes,
            config: config_path,
        } => {
            let calibration = match config_path {
                Some(path) => config::Session::deserialize(&PathBuf::from(path))?
                    .pitch()
                    .clone(),
                None => config::PitchCalibration::default(),
            };
            let mapper = pitch::PitchMapper::new(calibration)?;

            for note in notes {
                if note > 127 {
                    return Err(format!("{} is not a MIDI note", note).into());
                }
                let frequency = pitch::note_to_frequency(mapper.transpose(note));
                let mapping = mapper.map_note(note);
                println!(
                    "{:>3}: {:>8.2} Hz -> clip {} pitch {:.4}",
                    note, frequency, mapping.clip, mapping.pitch
                );
            }
        }
        Commands::Start {
            config: config_path,
        } => {
            host::run(&PathBuf::from(config_path)).await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
