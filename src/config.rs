use crate::error::{KeywaveError, Result};
use crate::settings::Settings;
use std::path::PathBuf;
use std::time::Duration;

/// Startup colors, one of which seeds every run
pub const DEFAULT_PALETTE: [[u8; 3]; 6] = [
    [255, 0, 0],   // Red
    [255, 255, 0], // Yellow
    [0, 255, 0],   // Green
    [0, 255, 255], // Cyan
    [0, 0, 255],   // Blue
    [255, 0, 255], // Magenta
];

pub const DEFAULT_ROWS: usize = 6;
pub const DEFAULT_COLS: usize = 22;
pub const DEFAULT_STEPS: u32 = 15;
pub const DEFAULT_HUE_STEP: u8 = 17;
pub const DEFAULT_DELAY_MS: u64 = 10;
/// Upper bound on `rows * cols`; real per-key keyboards are a few hundred keys
pub const MAX_KEYS: usize = 1 << 16;

/// Tunables for the wave animation
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationConfig {
    pub rows: usize,
    pub cols: usize,
    /// Distance (in keys) from a lit key to the key that fades out with it
    pub mirror_offset: usize,
    /// Sub-steps per row fade; each row emits `steps + 1` frames
    pub steps: u32,
    /// Amount a color component moves per hue advance
    pub hue_step: u8,
    pub delay: Duration,
    pub palette: Vec<[u8; 3]>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            mirror_offset: DEFAULT_COLS * 2,
            steps: DEFAULT_STEPS,
            hue_step: DEFAULT_HUE_STEP,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl AnimationConfig {
    /// Reject tunables the hue walk and grid cannot honor.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(KeywaveError::InvalidConfig(msg)) };

        if self.rows == 0 || self.cols == 0 {
            return invalid(format!("grid must be non-empty, got {}x{}", self.rows, self.cols));
        }
        match self.rows.checked_mul(self.cols) {
            Some(keys) if keys <= MAX_KEYS => {}
            _ => {
                return invalid(format!(
                    "grid {}x{} exceeds {} keys",
                    self.rows, self.cols, MAX_KEYS
                ))
            }
        }
        if self.steps == 0 {
            return invalid("steps must be at least 1".into());
        }
        if self.hue_step == 0 || 255 % self.hue_step != 0 {
            return invalid(format!("hue_step must evenly divide 255, got {}", self.hue_step));
        }
        if self.palette.is_empty() {
            return invalid("palette must contain at least one color".into());
        }
        for color in &self.palette {
            if !color.contains(&255) || !color.contains(&0) {
                return invalid(format!("palette color {:?} is not fully saturated", color));
            }
            if color.iter().any(|c| c % self.hue_step != 0) {
                return invalid(format!(
                    "palette color {:?} is off the hue_step {} grid",
                    color, self.hue_step
                ));
            }
        }
        Ok(())
    }
}

/// Identity under which the animation registers with GameSense
#[derive(Clone, Debug, PartialEq)]
pub struct AppInfo {
    pub game: String,
    pub display_name: String,
    pub developer: String,
    pub event: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            game: "CUSTOM_KEYBOARD_LIGHTING".to_string(),
            display_name: "Custom Keyboard Lighting".to_string(),
            developer: "yrfriendmark".to_string(),
            event: "BITMAP_EVENT".to_string(),
        }
    }
}

/// How to find and talk to the daemon
#[derive(Clone, Debug, PartialEq)]
pub struct DaemonConfig {
    /// `host:port`, skips coreProps.json when set
    pub address: Option<String>,
    pub core_props: Option<PathBuf>,
    pub timeout: Duration,
    pub heartbeat: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: None,
            core_props: None,
            timeout: Duration::from_millis(500),
            heartbeat: Duration::from_secs(10),
        }
    }
}

/// Fully resolved configuration for one invocation
#[derive(Clone, Debug, Default)]
pub struct KeywaveConfig {
    pub animation: AnimationConfig,
    pub app: AppInfo,
    pub daemon: DaemonConfig,
    pub seed: Option<u64>,
}

impl KeywaveConfig {
    /// Layer the settings file over the built-in defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::default();

        let anim = &settings.animation;
        if let Some(rows) = anim.rows {
            config.animation.rows = rows;
        }
        if let Some(cols) = anim.cols {
            config.animation.cols = cols;
            config.animation.mirror_offset = cols.saturating_mul(2);
        }
        if let Some(offset) = anim.mirror_offset {
            config.animation.mirror_offset = offset;
        }
        if let Some(steps) = anim.steps {
            config.animation.steps = steps;
        }
        if let Some(hue_step) = anim.hue_step {
            config.animation.hue_step = hue_step;
        }
        if let Some(ms) = anim.delay_ms {
            config.animation.delay = Duration::from_millis(ms);
        }
        if let Some(ref palette) = anim.palette {
            config.animation.palette = palette.clone();
        }

        let app = &settings.app;
        if let Some(ref game) = app.game {
            config.app.game = game.clone();
        }
        if let Some(ref name) = app.display_name {
            config.app.display_name = name.clone();
        }
        if let Some(ref developer) = app.developer {
            config.app.developer = developer.clone();
        }
        if let Some(ref event) = app.event {
            config.app.event = event.clone();
        }

        let daemon = &settings.daemon;
        config.daemon.address = daemon.address.clone();
        config.daemon.core_props = daemon.core_props.clone();
        if let Some(ms) = daemon.timeout_ms {
            config.daemon.timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = daemon.heartbeat_secs {
            config.daemon.heartbeat = Duration::from_secs(secs.max(1));
        }

        config
    }
}
