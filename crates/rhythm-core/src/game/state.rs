//! Session state machine
//!
//! `Loading` is the only non-terminal state. It moves exactly once, to
//! `Playing` or `FailedToLoad`, and never comes back.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    Loading = 0,
    Playing = 1,
    FailedToLoad = 2,
}

impl GameState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::FailedToLoad,
            _ => Self::Loading,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Loading
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::FailedToLoad => write!(f, "failed to load"),
        }
    }
}

/// `GameState` readable from any thread without a lock
#[derive(Debug)]
pub struct AtomicGameState(AtomicU8);

impl AtomicGameState {
    /// Starts in `Loading`
    pub fn new() -> Self {
        Self(AtomicU8::new(GameState::Loading as u8))
    }

    #[inline]
    pub fn load(&self) -> GameState {
        GameState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Leave `Loading` for `next`
    ///
    /// Returns false (and changes nothing) if the state already left
    /// `Loading` or `next` is `Loading` itself.
    pub fn finish(&self, next: GameState) -> bool {
        if !next.is_terminal() {
            return false;
        }
        self.0
            .compare_exchange(
                GameState::Loading as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for AtomicGameState {
    fn default() -> Self {
        Self::new()
    }
}
