//! Stdin input: every line is a tap, `q` quits
//!
//! Lines are read on their own thread and stamped with the monotonic clock
//! the moment they arrive, so a busy main loop can't skew tap times.

use std::io::BufRead;
use std::thread;

use crossbeam::channel::{self, Receiver};
use rhythm_core::game::monotonic_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Tap at a monotonic timestamp in ms
    Tap(i64),
    Quit,
}

/// Interpret one line of input received at `timestamp_ms`
pub fn parse_line(line: &str, timestamp_ms: i64) -> Input {
    match line.trim() {
        "q" | "quit" | "exit" => Input::Quit,
        _ => Input::Tap(timestamp_ms),
    }
}

/// Spawn the stdin reader
///
/// The channel disconnects at end of input.
pub fn spawn_stdin_reader() -> anyhow::Result<Receiver<Input>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stdin-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let input = parse_line(&line, monotonic_ms());
                if tx.send(input).is_err() || input == Input::Quit {
                    break;
                }
            }
        })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_line_is_a_tap() {
        assert_eq!(parse_line("", 42), Input::Tap(42));
        assert_eq!(parse_line("  x ", 7), Input::Tap(7));
    }

    #[test]
    fn test_quit() {
        assert_eq!(parse_line("q", 1), Input::Quit);
        assert_eq!(parse_line(" quit\n", 1), Input::Quit);
    }
}
