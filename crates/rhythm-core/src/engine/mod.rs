//! Render engine - players, mixer and the callback command queue
//!
//! - **Player**: one decoded source, a cursor and lock-free play/loop flags
//! - **Mixer**: sums players into the stream buffer, no gain stage
//! - **RenderCommand**: wires players into a mixer owned by the callback
//! - **gc**: deferred deallocation of decoded sources

mod command;
mod gc;
mod mixer;
mod player;

pub use command::{command_channel, RenderCommand, COMMAND_QUEUE_CAPACITY};
pub use gc::gc_handle;
pub use mixer::Mixer;
pub use player::{Player, PlayerAtomics, PlayerHandle};
