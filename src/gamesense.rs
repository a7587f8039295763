//! GameSense HTTP client: session lifecycle and bitmap frame transport

use crate::animation::{FrameBuffer, FrameSink};
use crate::config::AppInfo;
use crate::error::{KeywaveError, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

/// Event value sent with every frame. The bitmap handler ignores it but the
/// daemon requires one.
const EVENT_VALUE: u32 = 100;

#[derive(Serialize)]
struct GameMetadata<'a> {
    game: &'a str,
    game_display_name: &'a str,
    developer: &'a str,
}

#[derive(Serialize)]
struct GameRef<'a> {
    game: &'a str,
}

#[derive(Serialize)]
struct EventRef<'a> {
    game: &'a str,
    event: &'a str,
}

#[derive(Serialize)]
struct Handler {
    #[serde(rename = "device-type")]
    device_type: &'static str,
    zone: &'static str,
    mode: &'static str,
}

#[derive(Serialize)]
struct BindGameEvent<'a> {
    game: &'a str,
    event: &'a str,
    value_optional: bool,
    handlers: [Handler; 1],
}

#[derive(Serialize)]
struct BitmapFrame {
    bitmap: Vec<[u8; 3]>,
}

#[derive(Serialize)]
struct EventData {
    value: u32,
    frame: BitmapFrame,
}

/// Body of a `game_event` request carrying one frame
#[derive(Serialize)]
pub struct GameEvent<'a> {
    game: &'a str,
    event: &'a str,
    data: EventData,
}

impl<'a> GameEvent<'a> {
    pub fn new(app: &'a AppInfo, frame: &FrameBuffer) -> Self {
        Self {
            game: &app.game,
            event: &app.event,
            data: EventData {
                value: EVENT_VALUE,
                frame: BitmapFrame {
                    bitmap: frame.to_bitmap(),
                },
            },
        }
    }
}

#[derive(Clone)]
pub struct GameSenseClient {
    agent: ureq::Agent,
    base_url: String,
    app: AppInfo,
    dropped: u64,
}

impl GameSenseClient {
    pub fn new(base_url: impl Into<String>, app: AppInfo, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into(),
            app,
            dropped: 0,
        }
    }

    /// Frames lost in the current failure streak
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<()> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|e| KeywaveError::http(endpoint, e))?;
        // Drain the body so the connection goes back to the pool
        let _ = response.into_string();
        Ok(())
    }

    pub fn register_application(&self) -> Result<()> {
        self.post(
            "game_metadata",
            &GameMetadata {
                game: &self.app.game,
                game_display_name: &self.app.display_name,
                developer: &self.app.developer,
            },
        )?;
        info!("registered {} with GameSense", self.app.game);
        Ok(())
    }

    pub fn bind_animation_event(&self) -> Result<()> {
        self.post(
            "bind_game_event",
            &BindGameEvent {
                game: &self.app.game,
                event: &self.app.event,
                value_optional: true,
                handlers: [Handler {
                    device_type: "rgb-per-key-zones",
                    zone: "all",
                    mode: "bitmap",
                }],
            },
        )?;
        debug!("bound {}/{} to per-key bitmap handler", self.app.game, self.app.event);
        Ok(())
    }

    pub fn unregister_application(&self) -> Result<()> {
        self.post("remove_game", &GameRef { game: &self.app.game })?;
        info!("removed {} from GameSense", self.app.game);
        Ok(())
    }

    pub fn unbind_animation_event(&self) -> Result<()> {
        self.post(
            "remove_game_event",
            &EventRef {
                game: &self.app.game,
                event: &self.app.event,
            },
        )
    }

    /// Keeps the daemon from timing out the session (~15s without events).
    pub fn send_heartbeat(&self) -> Result<()> {
        self.post("game_heartbeat", &GameRef { game: &self.app.game })
    }
}

impl FrameSink for GameSenseClient {
    /// Posts the frame synchronously. A stalled daemon holds the animation
    /// thread for up to the agent timeout, so cancellation can lag by that
    /// much rather than by one sub-step.
    fn send_frame(&mut self, frame: &FrameBuffer) {
        let sent = self.post("game_event", &GameEvent::new(&self.app, frame));
        match sent {
            Ok(()) => {
                if self.dropped > 0 {
                    info!("daemon reachable again after {} dropped frames", self.dropped);
                    self.dropped = 0;
                }
            }
            Err(e) => {
                if self.dropped == 0 {
                    warn!("dropping frames: {}", e);
                } else {
                    debug!("frame dropped: {}", e);
                }
                self.dropped += 1;
            }
        }
    }
}
