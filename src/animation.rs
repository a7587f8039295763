//! Row wave animation
//!
//! A saturated color walks the edges of the RGB cube, advancing once per
//! row. The current row fades up to that color over `steps` sub-steps while
//! the row two positions away fades out the color from two rows earlier.
//! Rows are visited bottom to top, forever.

use crate::cancel::CancelToken;
use crate::config::AnimationConfig;
use crate::error::Result;
use crate::grid::KeyGrid;
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

pub type Rgb = [f32; 3];

const BLACK: Rgb = [0.0; 3];

/// One color per key, row-major
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    keys: Vec<Rgb>,
}

impl FrameBuffer {
    pub fn new(len: usize) -> Self {
        Self { keys: vec![BLACK; len] }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn get(&self, key: usize) -> Option<Rgb> {
        self.keys.get(key).copied()
    }

    fn set(&mut self, key: usize, color: Rgb) {
        self.keys[key] = color;
    }

    /// Integer triples as the daemon expects them
    pub fn to_bitmap(&self) -> Vec<[u8; 3]> {
        self.keys.iter().map(|&c| to_u8(c)).collect()
    }
}

pub fn to_u8(color: Rgb) -> [u8; 3] {
    color.map(|c| c.round().clamp(0.0, 255.0) as u8)
}

/// Saturated color walking the RGB cube edges
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorState {
    rgb: [u8; 3],
}

impl ColorState {
    pub fn new(rgb: [u8; 3]) -> Self {
        Self { rgb }
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }

    /// One hue step. The first full component (in R, G, B order) leads:
    /// drain the component before it, then fill the one after it, then
    /// start draining the leader itself.
    ///
    /// Red leads: B down, else G up, else R down.
    /// Green leads: R down, else B up, else G down.
    /// Blue leads: G down, else R up, else B down.
    pub fn advance(&mut self, step: u8) {
        let Some(lead) = self.rgb.iter().position(|&c| c == 255) else {
            return;
        };
        let before = (lead + 2) % 3;
        let after = (lead + 1) % 3;

        if self.rgb[before] > 0 {
            self.rgb[before] = self.rgb[before].saturating_sub(step);
        } else if self.rgb[after] < 255 {
            self.rgb[after] = self.rgb[after].saturating_add(step);
        } else {
            self.rgb[lead] = self.rgb[lead].saturating_sub(step);
        }
    }

    /// Per-sub-step increment that fades from black to this color
    pub fn fade_increment(&self, steps: u32) -> Rgb {
        let steps = steps as f32;
        self.rgb.map(|c| c as f32 / steps)
    }
}

/// Fade increments for the last three rows
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RowWindow {
    /// Row currently fading in
    pub entering: Rgb,
    /// Previous row, now at full brightness
    pub holding: Rgb,
    /// Row before that, fading out
    pub leaving: Rgb,
}

impl RowWindow {
    pub fn shift(&mut self, next: Rgb) {
        self.leaving = self.holding;
        self.holding = self.entering;
        self.entering = next;
    }
}

/// Receives every frame the engine emits.
///
/// Sending is fire-and-forget: a sink that cannot deliver a frame should log
/// and return so the animation keeps advancing.
pub trait FrameSink {
    fn send_frame(&mut self, frame: &FrameBuffer);
}

/// Position of the engine inside a sweep
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    pub substep: u32,
}

pub struct AnimationEngine {
    config: AnimationConfig,
    grid: KeyGrid,
    color: ColorState,
    window: RowWindow,
    frame: FrameBuffer,
    sweep_index: usize,
    substep: u32,
    sweeps: u64,
}

impl AnimationEngine {
    pub fn new(config: AnimationConfig, seed: [u8; 3]) -> Result<Self> {
        config.validate()?;
        let grid = KeyGrid::new(config.rows, config.cols, config.mirror_offset);
        Ok(Self {
            frame: FrameBuffer::new(grid.len()),
            grid,
            color: ColorState::new(seed),
            window: RowWindow::default(),
            sweep_index: 0,
            substep: 0,
            sweeps: 0,
            config,
        })
    }

    /// Seed from a random palette color.
    pub fn with_rng<R: Rng + ?Sized>(config: AnimationConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let seed = config.palette.choose(rng).copied().unwrap_or([255, 0, 0]);
        Self::new(config, seed)
    }

    pub fn grid(&self) -> &KeyGrid {
        &self.grid
    }

    pub fn color(&self) -> ColorState {
        self.color
    }

    /// Row and sub-step the next call to `next_frame` will paint
    pub fn position(&self) -> Position {
        Position {
            row: self.current_row(),
            substep: self.substep,
        }
    }

    fn current_row(&self) -> usize {
        self.grid.rows_reversed().nth(self.sweep_index).unwrap_or(0)
    }

    /// Advance one sub-step and return the painted frame.
    pub fn next_frame(&mut self) -> &FrameBuffer {
        let row = self.current_row();

        if self.substep == 0 {
            self.color.advance(self.config.hue_step);
            self.window.shift(self.color.fade_increment(self.config.steps));
        }

        self.paint(row, self.substep);

        self.substep += 1;
        if self.substep > self.config.steps {
            self.substep = 0;
            self.sweep_index += 1;
            if self.sweep_index == self.grid.rows() {
                self.sweep_index = 0;
                self.sweeps += 1;
                debug!("sweep {} done, color {:?}", self.sweeps, self.color.rgb());
            }
        }

        &self.frame
    }

    fn paint(&mut self, row: usize, i: u32) {
        let grid = self.grid;
        let up = scale(self.window.entering, i);
        let down = scale(self.window.leaving, self.config.steps - i);
        for (key, mirror) in grid.mirror_row(row) {
            self.frame.set(key, up);
            self.frame.set(mirror, down);
        }
    }

    /// Lazy, endless sequence of frame snapshots
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { engine: self }
    }

    /// Drive the animation into `sink` until `cancel` fires. Returns the
    /// number of frames emitted.
    pub fn run<S: FrameSink + ?Sized>(&mut self, sink: &mut S, cancel: &CancelToken) -> u64 {
        info!(
            "animation started: {}x{} grid, start color {:?}",
            self.grid.rows(),
            self.grid.cols(),
            self.color.rgb()
        );

        let delay = self.config.delay;
        let mut emitted = 0;
        while !cancel.is_cancelled() {
            sink.send_frame(self.next_frame());
            emitted += 1;
            if cancel.is_cancelled() || cancel.wait(delay) {
                break;
            }
        }

        info!("animation stopped after {} frames", emitted);
        emitted
    }
}

fn scale(color: Rgb, factor: u32) -> Rgb {
    let factor = factor as f32;
    color.map(|c| c * factor)
}

pub struct Frames<'a> {
    engine: &'a mut AnimationEngine,
}

impl Iterator for Frames<'_> {
    type Item = FrameBuffer;

    fn next(&mut self) -> Option<FrameBuffer> {
        Some(self.engine.next_frame().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PALETTE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn engine(seed: [u8; 3]) -> AnimationEngine {
        AnimationEngine::new(AnimationConfig::default(), seed).unwrap()
    }

    #[test]
    fn red_seed_first_advance_fills_green() {
        let mut color = ColorState::new([255, 0, 0]);
        color.advance(17);
        assert_eq!(color.rgb(), [255, 17, 0]);
    }

    #[test]
    fn magenta_seed_first_advance_drains_blue() {
        let mut color = ColorState::new([255, 0, 255]);
        color.advance(17);
        assert_eq!(color.rgb(), [255, 0, 238]);
    }

    #[test]
    fn hue_walk_visits_cube_edges() {
        let mut color = ColorState::new([255, 0, 0]);
        let mut corners = Vec::new();
        for _ in 0..90 {
            color.advance(17);
            if color.rgb().iter().all(|&c| c == 0 || c == 255) {
                corners.push(color.rgb());
            }
        }
        assert_eq!(
            corners,
            vec![
                [255, 255, 0],
                [0, 255, 0],
                [0, 255, 255],
                [0, 0, 255],
                [255, 0, 255],
                [255, 0, 0],
            ]
        );
    }

    #[test]
    fn hue_walk_stays_saturated() {
        for seed in DEFAULT_PALETTE {
            let mut color = ColorState::new(seed);
            for _ in 0..500 {
                color.advance(17);
                let rgb = color.rgb();
                assert!(rgb.contains(&255), "{:?} lost saturation", rgb);
                assert!(rgb.contains(&0), "{:?} left the cube edges", rgb);
            }
        }
    }

    #[test]
    fn hue_walk_closes_after_full_cycle() {
        let cycle = 6 * 255 / 17;
        for seed in DEFAULT_PALETTE {
            let mut color = ColorState::new(seed);
            for step in 1..=cycle {
                color.advance(17);
                if step < cycle {
                    assert_ne!(color.rgb(), seed, "returned early at step {}", step);
                }
            }
            assert_eq!(color.rgb(), seed);
        }
    }

    #[test]
    fn window_slots_are_independent() {
        let mut window = RowWindow::default();
        window.shift([1.0, 0.0, 0.0]);
        window.shift([0.0, 2.0, 0.0]);
        window.shift([0.0, 0.0, 3.0]);
        assert_eq!(window.entering, [0.0, 0.0, 3.0]);
        assert_eq!(window.holding, [0.0, 2.0, 0.0]);
        assert_eq!(window.leaving, [1.0, 0.0, 0.0]);

        window.entering[0] = 9.0;
        assert_eq!(window.holding[0], 0.0);
    }

    #[test]
    fn first_row_painted_is_bottom_row() {
        let mut engine = engine([255, 0, 0]);
        assert_eq!(engine.position(), Position { row: 5, substep: 0 });
        engine.next_frame();
        engine.next_frame();
        let frame = &engine.frame;
        for key in 110..132 {
            assert!(frame.get(key).unwrap()[0] > 0.0);
        }
        for key in 0..110 {
            assert_eq!(frame.get(key), Some(BLACK));
        }
    }

    #[test]
    fn entering_row_interpolates_linearly() {
        let mut engine = engine([255, 0, 0]);
        let steps = engine.config.steps;
        for i in 0..=steps {
            let frame = engine.next_frame();
            let expected = [
                (255.0f32 / 15.0) * i as f32,
                (17.0f32 / 15.0) * i as f32,
                0.0,
            ];
            for key in 110..132 {
                assert_eq!(frame.get(key), Some(expected), "sub-step {}", i);
            }
        }
        assert_eq!(to_u8(engine.frame.get(120).unwrap()), [255, 17, 0]);
    }

    #[test]
    fn leaving_row_fades_two_rows_down() {
        let mut engine = engine([255, 0, 0]);
        let steps = engine.config.steps as usize;
        // Rows 5 and 4 fade in; nothing has faded out yet
        for _ in 0..2 * (steps + 1) {
            engine.next_frame();
        }
        assert_eq!(engine.position().row, 3);

        // Row 3 fades in while row 5 (mirror of row 3) fades out row 5's color
        let row5_increment = [255.0f32 / 15.0, 17.0 / 15.0, 0.0];
        for i in 0..=steps {
            let frame = engine.next_frame();
            let remaining = (steps - i) as f32;
            let expected = row5_increment.map(|c| c * remaining);
            for key in 110..132 {
                assert_eq!(frame.get(key), Some(expected));
            }
        }
        for key in 110..132 {
            assert_eq!(engine.frame.get(key), Some(BLACK));
        }
    }

    #[test]
    fn sweep_wraps_back_to_bottom() {
        let mut engine = engine([0, 0, 255]);
        let per_row = engine.config.steps as usize + 1;
        for _ in 0..6 * per_row {
            engine.next_frame();
        }
        assert_eq!(engine.position(), Position { row: 5, substep: 0 });
    }

    #[test]
    fn color_advances_once_per_row() {
        let mut engine = engine([255, 0, 0]);
        let per_row = engine.config.steps as usize + 1;
        for _ in 0..3 * per_row {
            engine.next_frame();
        }
        assert_eq!(engine.color().rgb(), [255, 51, 0]);
    }

    #[test]
    fn frames_iterator_yields_snapshots() {
        let mut engine = engine([0, 255, 0]);
        let frames: Vec<FrameBuffer> = engine.frames().take(3).collect();
        assert_eq!(frames.len(), 3);
        assert_ne!(frames[0], frames[2]);
        assert!(frames.iter().all(|f| f.len() == 132));
    }

    #[test]
    fn seeded_rng_picks_from_palette() {
        let mut rng = StdRng::seed_from_u64(7);
        let engine = AnimationEngine::with_rng(AnimationConfig::default(), &mut rng).unwrap();
        assert!(DEFAULT_PALETTE.contains(&engine.color().rgb()));
    }

    #[test]
    fn huge_mirror_offset_wraps_instead_of_overflowing() {
        let config = AnimationConfig {
            mirror_offset: usize::MAX,
            ..Default::default()
        };
        let mut engine = AnimationEngine::new(config, [255, 0, 0]).unwrap();
        let per_row = engine.config.steps as usize + 1;
        for _ in 0..2 * per_row {
            assert_eq!(engine.next_frame().len(), 132);
        }
    }

    #[test]
    fn invalid_config_rejected_before_state_exists() {
        let config = AnimationConfig { hue_step: 20, ..Default::default() };
        assert!(AnimationEngine::new(config, [255, 0, 0]).is_err());
    }

    struct CancelAfter {
        frames: u64,
        limit: u64,
        token: CancelToken,
    }

    impl FrameSink for CancelAfter {
        fn send_frame(&mut self, _frame: &FrameBuffer) {
            self.frames += 1;
            if self.frames == self.limit {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn cancel_mid_row_stops_immediately() {
        let config = AnimationConfig {
            delay: Duration::from_millis(1),
            ..Default::default()
        };
        let mut engine = AnimationEngine::new(config, [255, 0, 0]).unwrap();
        let token = CancelToken::new();
        let mut sink = CancelAfter { frames: 0, limit: 7, token: token.clone() };

        let emitted = engine.run(&mut sink, &token);
        assert_eq!(emitted, 7);
        assert_eq!(sink.frames, 7);
        assert_eq!(engine.position(), Position { row: 5, substep: 7 });
    }

    #[test]
    fn already_cancelled_emits_nothing() {
        let mut engine = engine([255, 0, 0]);
        let token = CancelToken::new();
        token.cancel();
        let mut sink = CancelAfter { frames: 0, limit: 0, token: token.clone() };
        assert_eq!(engine.run(&mut sink, &token), 0);
    }

    struct Counter(Arc<AtomicU64>);

    impl FrameSink for Counter {
        fn send_frame(&mut self, _frame: &FrameBuffer) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_from_another_thread_is_prompt() {
        let config = AnimationConfig {
            delay: Duration::from_millis(10),
            ..Default::default()
        };
        let count = Arc::new(AtomicU64::new(0));
        let token = CancelToken::new();

        let handle = {
            let count = Arc::clone(&count);
            let token = token.clone();
            thread::spawn(move || {
                let mut engine = AnimationEngine::new(config, [255, 0, 0]).unwrap();
                engine.run(&mut Counter(count), &token)
            })
        };

        thread::sleep(Duration::from_millis(60));
        let cancelled_at = Instant::now();
        token.cancel();
        let emitted = handle.join().unwrap();

        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
        assert_eq!(emitted, count.load(Ordering::SeqCst));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(emitted, count.load(Ordering::SeqCst));
    }
}
