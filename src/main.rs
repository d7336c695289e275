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
use std::{error::Error, path::PathBuf, sync::Arc, thread, time::Duration};

use clap::{crate_version, Parser, Subcommand};
use tabplay::{
    config, midi,
    playback::{
        schedule::{schedule, without_metronome},
        PlaybackNotification,
    },
    player::{Player, PlayerOptions},
    score::Score,
    util::{duration_minutes_seconds, filename_display, parse_location},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI player for guitar tablature."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Loads and validates a score, then prints a summary of it.
    Verify {
        /// The path to the score.
        score_path: String,
    },
    /// Prints the MIDI events generated for a score, in playback order.
    Events {
        /// The path to the score.
        score_path: String,
        /// Leaves out the metronome clicks.
        #[arg(long)]
        no_metronome: bool,
    },
    /// Plays a score through a MIDI device.
    Play {
        /// The path to the score.
        score_path: String,
        /// The path to the player config.
        #[arg(short, long)]
        config: Option<String>,
        /// The MIDI device name to play through. Overrides the player config.
        #[arg(short, long)]
        device: Option<String>,
        /// Where to start playing from, as <SYSTEM>:<POSITION>.
        #[arg(short, long, default_value = "0:0")]
        from: String,
        /// Leaves out the metronome clicks.
        #[arg(long)]
        no_metronome: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MidiDevices {} => {
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
        Commands::Verify { score_path } => {
            let path = PathBuf::from(&score_path);
            let score = Score::load(&path)?;
            let events = schedule(&score);
            let length = events
                .last()
                .map(|event| Duration::from_secs_f64((event.start_time + event.duration) / 1000.0))
                .unwrap_or_default();

            println!("{}:", filename_display(&path));
            println!("- Guitars: {}", score.guitars().len());
            println!("- Systems: {}", score.systems().len());
            println!("- Tempo markers: {}", score.tempo_markers().len());
            println!("- Events: {}", events.len());
            println!(
                "- Length without repeats: {}",
                duration_minutes_seconds(length)
            );
        }
        Commands::Events {
            score_path,
            no_metronome,
        } => {
            let score = Score::load(&PathBuf::from(&score_path))?;
            let mut events = schedule(&score);
            if no_metronome {
                events = without_metronome(&events);
            }

            for event in events.iter() {
                println!(
                    "{:>10.1}ms {:>8} ch{:<2} {:?}",
                    event.start_time,
                    event.location().to_string(),
                    event.channel + 1,
                    event.kind
                );
            }
        }
        Commands::Play {
            score_path,
            config,
            device,
            from,
            no_metronome,
        } => {
            let score = Arc::new(Score::load(&PathBuf::from(&score_path))?);
            let player_config = config
                .map(|path| config::Player::deserialize(&PathBuf::from(path)))
                .transpose()?;

            let device_name = match (device, player_config.as_ref()) {
                (Some(device), _) => device,
                (None, Some(player_config)) => player_config.midi().device().to_string(),
                (None, None) => {
                    return Err("a MIDI device must be given with --device or a player config".into())
                }
            };
            let exclude_channels = match player_config.as_ref() {
                Some(player_config) => player_config.midi().exclude_channels()?,
                None => Vec::new(),
            };
            let mut options = match player_config.as_ref() {
                Some(player_config) => player_config.options()?,
                None => PlayerOptions::default(),
            };
            if no_metronome {
                options.metronome = false;
            }

            let start = parse_location(&from)?;
            let device = midi::get_device(&device_name, &exclude_channels)?;
            let (sender, receiver) = crossbeam_channel::unbounded();
            let player = Arc::new(Player::new(score, device, Some(sender), options));

            // Follow the caret until the player goes away.
            thread::spawn(move || {
                for notification in receiver.iter() {
                    match notification {
                        PlaybackNotification::SystemChanged(system) => {
                            info!(system, "System changed.")
                        }
                        PlaybackNotification::PositionChanged(position) => {
                            debug!(position, "Position changed.")
                        }
                    }
                }
            });

            player.start(start.system, start.position)?;

            let waiter = {
                let player = player.clone();
                tokio::task::spawn_blocking(move || player.wait())
            };
            tokio::select! {
                result = waiter => {
                    let outcome = result??;
                    info!(outcome = ?outcome, "Playback ended.");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping playback.");
                    player.stop()?;
                }
            }
        }
    }

    Ok(())
}
