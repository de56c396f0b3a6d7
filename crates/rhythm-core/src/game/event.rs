//! Notifications from the session to the front end

use super::judge::TapVerdict;
use super::state::GameState;

/// Capacity of the event channel; further events are dropped until read
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Loading finished (emitted once, from the loader thread)
    StateChanged(GameState),
    /// A tap was scored against the beat grid
    TapJudged(TapVerdict),
}
