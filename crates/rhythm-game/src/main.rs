//! Rhythm Game - tap along to the backing track
//!
//! Terminal front end for `rhythm-core`. It:
//! 1. Loads `~/.config/rhythm-game/config.yaml` (written with defaults on first run)
//! 2. Starts the game, which loads and opens the audio stream in the background
//! 3. Turns every line on stdin into a tap and prints the verdicts
//!
//! ## Command line flags
//!
//! - `--config PATH`: use another config file
//! - `--offline`: render on a clocked thread instead of an audio device
//! - `--list-devices`: print the available output devices and exit

mod input;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam::channel;

use rhythm_core::audio::{get_output_devices, AudioHost, CpalHost, OfflineHost};
use rhythm_core::config::{default_config_path, load_config, save_config, CONFIG_FILE_NAME};
use rhythm_core::game::{Game, GameEvent, GameState, TapResult};
use rhythm_core::source::AssetDecoder;

use input::{spawn_stdin_reader, Input};
use terminal::TerminalFeedback;

/// ~60 ticks per second
const TICK_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    offline: bool,
    list_devices: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--offline" => parsed.offline = true,
            "--list-devices" => parsed.list_devices = true,
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // RUST_LOG=debug for tap-by-tap output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = args
        .config
        .unwrap_or_else(|| default_config_path(CONFIG_FILE_NAME));
    let config = load_config(&config_path);

    if args.list_devices {
        for device in get_output_devices(&config.stream)? {
            println!("{}", device);
        }
        return Ok(());
    }

    if !config_path.exists() {
        if let Err(e) = save_config(&config, &config_path) {
            log::warn!("Could not write default config: {:#}", e);
        }
    }

    let host: Arc<dyn AudioHost> = if args.offline {
        Arc::new(OfflineHost::new())
    } else {
        Arc::new(CpalHost::new())
    };
    let decoder = Arc::new(AssetDecoder::new(&config.assets.directory));
    log::info!(
        "rhythm-game starting: {} host, assets in {:?}, {:.0} BPM",
        host.name(),
        config.assets.directory,
        config.timing.bpm()
    );

    let mut game = Game::new(config, host, decoder);
    let events = game.events();
    let input = spawn_stdin_reader()?;
    let ticker = channel::tick(TICK_INTERVAL);
    let mut feedback = TerminalFeedback::new(std::io::stdout());

    println!("Press Enter on the beat. Type q to quit.");
    game.start();

    loop {
        crossbeam::select! {
            recv(input) -> msg => match msg {
                Ok(Input::Tap(timestamp_ms)) => game.tap(timestamp_ms),
                Ok(Input::Quit) | Err(_) => break,
            },
            recv(events) -> msg => {
                if let Ok(event) = msg {
                    report(&event);
                }
            },
            recv(ticker) -> _ => game.tick(&mut feedback),
        }
    }

    game.stop();
    log::info!("rhythm-game stopped");
    Ok(())
}

fn report(event: &GameEvent) {
    match event {
        GameEvent::StateChanged(GameState::Playing) => println!("Playing"),
        GameEvent::StateChanged(GameState::FailedToLoad) => {
            println!("Failed to load, see the log for details. Type q to quit.")
        }
        GameEvent::StateChanged(GameState::Loading) => {}
        GameEvent::TapJudged(verdict) => {
            let label = match verdict.result {
                TapResult::Success => "SUCCESS",
                TapResult::Early => "early",
                TapResult::Late => "late",
            };
            println!("{:>8} {:+5}ms", label, verdict.offset_ms());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_args() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_all_flags() {
        let parsed = args(&["--offline", "--config", "/tmp/game.yaml", "--list-devices"]).unwrap();
        assert!(parsed.offline);
        assert!(parsed.list_devices);
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/game.yaml")));
    }

    #[test]
    fn test_bad_args() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--fullscreen"]).is_err());
    }
}
