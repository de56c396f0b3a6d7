//! Lock-free command queue into the render callback
//!
//! The callback owns its mixer outright, so the loader never touches it.
//! Instead it pushes `RenderCommand`s into an `rtrb` ringbuffer before the
//! stream starts, and the callback drains them at the top of each period.
//!
//! Push and pop are wait-free and never allocate; the only storage the
//! commands need (the mixer's track list) is reserved up front.
//!
//! ```ignore
//! let (mut tx, mut rx) = command_channel();
//! tx.push(RenderCommand::SetChannelCount(2))?;
//! tx.push(RenderCommand::AddTrack(player))?;
//!
//! // Audio thread
//! mixer.process_commands(&mut rx);
//! ```

use super::player::Player;
use crate::types::MAX_TRACKS;

/// Queue capacity: every track plus a handful of settings
pub const COMMAND_QUEUE_CAPACITY: usize = MAX_TRACKS + 16;

/// Commands sent from the loader to the render callback
pub enum RenderCommand {
    /// Append a player to the mixer (render order = insertion order)
    AddTrack(Player),
    /// Set the mixer's output channel count
    SetChannelCount(u16),
}

impl std::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddTrack(player) => f
                .debug_tuple("AddTrack")
                .field(&player.source().map(|s| s.name()))
                .finish(),
            Self::SetChannelCount(n) => f.debug_tuple("SetChannelCount").field(n).finish(),
        }
    }
}

/// Create a new command channel
///
/// The producer belongs to the loader, the consumer to the render callback.
pub fn command_channel() -> (rtrb::Producer<RenderCommand>, rtrb::Consumer<RenderCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
