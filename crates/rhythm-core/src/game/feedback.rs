//! Colour-only visual feedback
//!
//! The game renders nothing but a clear colour; what draws it is up to the
//! front end (GL surface, terminal, test recorder).

use super::state::GameState;

/// Opaque RGB clear colour, components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl ScreenColor {
    pub const GREY: Self = Self::new(0.35, 0.35, 0.35);
    pub const YELLOW: Self = Self::new(1.0, 1.0, 0.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0);

    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Colour shown for a session state
    pub fn for_state(state: GameState) -> Self {
        match state {
            GameState::Playing => Self::GREY,
            GameState::Loading => Self::YELLOW,
            GameState::FailedToLoad => Self::RED,
        }
    }

    /// 8-bit components, for 24-bit terminals and the like
    pub fn to_rgb8(self) -> [u8; 3] {
        let scale = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [scale(self.red), scale(self.green), scale(self.blue)]
    }
}

/// Receives one colour per tick
pub trait VisualFeedback {
    fn set_screen_color(&mut self, color: ScreenColor);
}
