use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyCode, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Terminal abstraction for rendering
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
}

/// A single cell in the terminal buffer
#[derive(Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
}

impl Default for Cell {
    fn default() -> Self {
        Self { ch: ' ', fg: None }
    }
}

impl Terminal {
    /// Enter the alternate screen in raw mode
    pub fn new() -> io::Result<Self> {
        let (width, height) = size()?;

        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))?;

        let buffer = vec![vec![Cell::default(); width as usize]; height as usize];

        Ok(Self {
            width,
            height,
            buffer,
        })
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            for cell in row {
                *cell = Cell::default();
            }
        }
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg);
        }
    }

    /// Render the entire buffer to screen
    pub fn render(&self) -> io::Result<()> {
        let mut stdout = stdout();

        for (y, row) in self.buffer.iter().enumerate() {
            queue!(stdout, MoveTo(0, y as u16))?;

            for cell in row {
                if let Some(color) = cell.fg {
                    queue!(stdout, SetForegroundColor(color), Print(cell.ch), ResetColor)?;
                } else {
                    queue!(stdout, Print(cell.ch))?;
                }
            }
        }

        stdout.flush()?;
        Ok(())
    }

    /// Check for keypress (non-blocking), returns (code, modifiers)
    pub fn check_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        if poll(Duration::from_millis(0))? {
            if let Event::Key(key_event) = read()? {
                return Ok(Some((key_event.code, key_event.modifiers)));
            }
        }
        Ok(None)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Helper to create RGB colors
pub fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}
