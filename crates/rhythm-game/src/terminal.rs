//! Terminal front end for the colour feedback

use std::io::Write;

use rhythm_core::game::{ScreenColor, VisualFeedback};

/// Paints a status bar in the screen colour, redrawn only when it changes
pub struct TerminalFeedback<W: Write> {
    out: W,
    current: Option<ScreenColor>,
}

impl<W: Write> TerminalFeedback<W> {
    pub fn new(out: W) -> Self {
        Self { out, current: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> VisualFeedback for TerminalFeedback<W> {
    fn set_screen_color(&mut self, color: ScreenColor) {
        if self.current == Some(color) {
            return;
        }
        self.current = Some(color);
        let [r, g, b] = color.to_rgb8();
        // 24-bit background, then reset
        let _ = writeln!(self.out, "\x1b[48;2;{};{};{}m{:40}\x1b[0m", r, g, b, "");
        let _ = self.out.flush();
    }
}
