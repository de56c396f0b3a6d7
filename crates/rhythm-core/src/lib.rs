//! Rhythm Core - audio engine and tap judging for the rhythm game
//!
//! Leaf first:
//!
//! - [`source`]: decoded, immutable PCM and the asset decoder
//! - [`engine`]: players and the mixer that runs in the render callback
//! - [`audio`]: stream negotiation and the device backends
//! - [`game`]: the session state machine, song clock and tap judge
//! - [`config`]: YAML configuration

pub mod audio;
pub mod config;
pub mod engine;
pub mod game;
pub mod source;
pub mod types;

pub use types::*;
