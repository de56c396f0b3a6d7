//! The rhythm game session
//!
//! - **Game**: loads in the background, owns the state machine and the
//!   stream, forwards taps
//! - **SessionRenderer**: the session's render callback
//! - **judge**: scores a tap against its beat
//! - **SongClock / BeatGrid**: map tap timestamps to song positions and beats
//! - **VisualFeedback**: colour-per-tick output

mod clock;
mod event;
mod feedback;
mod judge;
mod session;
mod state;

pub use clock::{monotonic_ms, BeatGrid, SongClock};
pub use event::{GameEvent, EVENT_CAPACITY};
pub use feedback::{ScreenColor, VisualFeedback};
pub use judge::{judge, TapResult, TapVerdict};
pub use session::{Game, LoadError, SessionRenderer};
pub use state::{AtomicGameState, GameState};
