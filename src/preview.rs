//! Terminal stand-in for the keyboard
//!
//! Draws each frame as a grid of colored blocks so the animation can be
//! watched without SteelSeries Engine running.

use crate::animation::{to_u8, FrameBuffer, FrameSink};
use crate::cancel::CancelToken;
use crate::grid::KeyGrid;
use crate::terminal::{rgb, Terminal};
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::style::Color;
use log::warn;
use std::io;

/// Width of one key on screen, in cells
const KEY_WIDTH: usize = 3;
const KEY_GLYPH: char = '█';

/// Returns true if the key should end the preview
pub fn is_quit_key(code: KeyCode, modifiers: KeyModifiers) -> bool {
    matches!(code, KeyCode::Char('q') | KeyCode::Esc)
        || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL))
}

/// Screen cells for one frame: `(x, y, color)` per drawn block
pub fn layout(grid: &KeyGrid, frame: &FrameBuffer) -> Vec<(usize, usize, Color)> {
    let mut cells = Vec::with_capacity(frame.len() * KEY_WIDTH);
    for row in 0..grid.rows() {
        for (col, key) in grid.row(row).enumerate() {
            let [r, g, b] = frame.get(key).map(to_u8).unwrap_or([0, 0, 0]);
            let x = col * (KEY_WIDTH + 1);
            for dx in 0..KEY_WIDTH {
                cells.push((x + dx, row * 2, rgb(r, g, b)));
            }
        }
    }
    cells
}

pub struct PreviewSink {
    term: Terminal,
    grid: KeyGrid,
    cancel: CancelToken,
    frames: u64,
}

impl PreviewSink {
    pub fn new(grid: KeyGrid, cancel: CancelToken) -> io::Result<Self> {
        Ok(Self {
            term: Terminal::new()?,
            grid,
            cancel,
            frames: 0,
        })
    }

    fn draw(&mut self, frame: &FrameBuffer) -> io::Result<()> {
        self.term.clear();
        for (x, y, color) in layout(&self.grid, frame) {
            self.term.set(x as i32 + 1, y as i32 + 1, KEY_GLYPH, Some(color));
        }

        let (_, h) = self.term.size();
        let status = format!("frame {}  |  q/Esc quit", self.frames);
        self.term.set_str(1, h as i32 - 1, &status, Some(Color::DarkGrey));
        self.term.render()
    }
}

impl FrameSink for PreviewSink {
    fn send_frame(&mut self, frame: &FrameBuffer) {
        self.frames += 1;
        if let Err(e) = self.draw(frame) {
            warn!("preview draw failed: {}", e);
        }

        match self.term.check_key() {
            Ok(Some((code, mods))) if is_quit_key(code, mods) => self.cancel.cancel(),
            Ok(_) => {}
            Err(e) => {
                warn!("preview input failed: {}", e);
                self.cancel.cancel();
            }
        }
    }
}
