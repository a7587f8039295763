//! Key grid topology
//!
//! Keys are numbered row-major: row 0 holds keys `0..cols`, row 1 holds
//! `cols..2*cols`, and so on. Each key also has a mirror key `offset`
//! positions further along, wrapping at the end of the grid. The mirror
//! receives the fade-out half of the wave.

use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyGrid {
    rows: usize,
    cols: usize,
    mirror_offset: usize,
}

impl KeyGrid {
    /// `rows * cols` must not overflow; `AnimationConfig::validate` checks it.
    /// Offsets of a full grid length or more wrap around.
    pub fn new(rows: usize, cols: usize, mirror_offset: usize) -> Self {
        let len = rows * cols;
        let mirror_offset = if len == 0 { 0 } else { mirror_offset % len };
        Self { rows, cols, mirror_offset }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of keys (frame buffer length)
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Flat key indices of row `row`
    pub fn row(&self, row: usize) -> Range<usize> {
        let start = row * self.cols;
        start..start + self.cols
    }

    pub fn mirror(&self, key: usize) -> usize {
        let to_end = self.len() - key;
        if self.mirror_offset >= to_end {
            self.mirror_offset - to_end
        } else {
            key + self.mirror_offset
        }
    }

    /// `(key, mirror)` pairs for every key in `row`
    pub fn mirror_row(&self, row: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row(row).map(move |key| (key, self.mirror(key)))
    }

    /// Row order of one sweep: bottom row first
    pub fn rows_reversed(&self) -> impl Iterator<Item = usize> {
        (0..self.rows).rev()
    }
}
