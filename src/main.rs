mod animation;
mod cancel;
mod config;
mod daemon;
mod error;
mod gamesense;
mod grid;
mod preview;
mod settings;
mod terminal;

use animation::AnimationEngine;
use cancel::CancelToken;
use clap::{Parser, Subcommand};
use config::KeywaveConfig;
use error::{KeywaveError, Result};
use gamesense::{GameEvent, GameSenseClient};
use log::{info, warn};
use preview::PreviewSink;
use rand::rngs::StdRng;
use rand::SeedableRng;
use settings::Settings;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "keywave")]
#[command(version)]
#[command(about = "Per-key RGB wave animation for SteelSeries keyboards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the wave to the keyboard through SteelSeries Engine
    Run {
        /// Random seed for the starting color
        #[arg(short, long)]
        seed: Option<u64>,

        /// Delay between frames in milliseconds
        #[arg(short, long)]
        delay: Option<u64>,

        /// Daemon address (host:port), skips coreProps.json
        #[arg(short, long)]
        address: Option<String>,

        /// Path to coreProps.json
        #[arg(long)]
        core_props: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(short = 't', long)]
        duration: Option<f64>,

        /// Unbind the event and unregister on exit (Enter or --duration;
        /// an interrupt signal such as Ctrl-C skips it)
        #[arg(short, long)]
        cleanup: bool,
    },

    /// Play the animation in the terminal instead of on the keyboard
    Preview {
        /// Random seed for the starting color
        #[arg(short, long)]
        seed: Option<u64>,

        /// Delay between frames in milliseconds
        #[arg(short, long)]
        delay: Option<u64>,
    },

    /// Print frame payloads as JSON lines
    Dump {
        /// Number of frames to print
        #[arg(short, long, default_value = "16")]
        frames: usize,

        /// Random seed for the starting color
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Remove the lighting event and application from SteelSeries Engine
    Remove {
        /// Daemon address (host:port), skips coreProps.json
        #[arg(short, long)]
        address: Option<String>,

        /// Path to coreProps.json
        #[arg(long)]
        core_props: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Preview { .. } | Commands::Dump { .. } => "warn",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = dispatch(cli.command) {
        eprintln!("keywave: {}", e);
        std::process::exit(1);
    }
}

fn dispatch(command: Commands) -> Result<()> {
    let mut config = KeywaveConfig::from_settings(&Settings::load()?);

    match command {
        Commands::Run {
            seed,
            delay,
            address,
            core_props,
            duration,
            cleanup,
        } => {
            config.seed = seed;
            apply_delay(&mut config, delay);
            apply_daemon(&mut config, address, core_props);
            let duration = duration
                .map(|secs| {
                    Duration::try_from_secs_f64(secs)
                        .map_err(|_| KeywaveError::InvalidConfig(format!("bad duration {}", secs)))
                })
                .transpose()?;
            run(&config, duration, cleanup)
        }
        Commands::Preview { seed, delay } => {
            config.seed = seed;
            apply_delay(&mut config, delay);
            run_preview(&config)
        }
        Commands::Dump { frames, seed } => {
            config.seed = seed;
            dump(&config, frames)
        }
        Commands::Remove { address, core_props } => {
            apply_daemon(&mut config, address, core_props);
            remove(&config)
        }
    }
}

fn apply_delay(config: &mut KeywaveConfig, delay: Option<u64>) {
    if let Some(ms) = delay {
        config.animation.delay = Duration::from_millis(ms);
    }
}

fn apply_daemon(config: &mut KeywaveConfig, address: Option<String>, core_props: Option<PathBuf>) {
    if address.is_some() {
        config.daemon.address = address;
    }
    if core_props.is_some() {
        config.daemon.core_props = core_props;
    }
}

fn new_engine(config: &KeywaveConfig) -> Result<AnimationEngine> {
    let seed = config.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });
    let mut rng = StdRng::seed_from_u64(seed);
    let engine = AnimationEngine::with_rng(config.animation.clone(), &mut rng)?;
    info!("seed {} picked start color {:?}", seed, engine.color().rgb());
    Ok(engine)
}

/// Cancel on Enter or EOF. Only when stdin is interactive, so a detached
/// run is not stopped by an empty stdin. Without a terminal and without
/// `--duration`, only a signal ends the run.
fn watch_stdin(cancel: CancelToken) {
    if !io::stdin().is_terminal() {
        return;
    }
    info!("press Enter to stop");
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        cancel.cancel();
    });
}

fn run(config: &KeywaveConfig, duration: Option<Duration>, cleanup: bool) -> Result<()> {
    let base_url = daemon::resolve_base_url(&config.daemon)?;
    let mut engine = new_engine(config)?;

    let client = GameSenseClient::new(base_url.as_str(), config.app.clone(), config.daemon.timeout);
    client.register_application()?;
    client.bind_animation_event()?;

    let cancel = CancelToken::new();
    watch_stdin(cancel.clone());

    let animation = {
        let mut sink = client.clone();
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("animation".into())
            .spawn(move || {
                let frames = engine.run(&mut sink, &cancel);
                (frames, sink.dropped_frames(), engine.position())
            })?
    };

    let beats = keep_alive(&cancel, config.daemon.heartbeat, duration, || {
        if let Err(e) = client.send_heartbeat() {
            warn!("heartbeat failed: {}", e);
        }
    });

    let (frames, dropped, stopped_at) = animation
        .join()
        .map_err(|_| KeywaveError::Io(io::Error::new(io::ErrorKind::Other, "animation thread panicked")))?;
    info!(
        "sent {} frames to {} ({} beats), stopped at row {} sub-step {}",
        frames, base_url, beats, stopped_at.row, stopped_at.substep
    );
    if dropped > 0 {
        warn!("last {} frames were dropped", dropped);
    }

    if cleanup {
        client.unbind_animation_event()?;
        client.unregister_application()?;
    }
    Ok(())
}

/// Call `beat` every `interval` until `cancel` fires or `duration` runs
/// out. Cancels the token when the duration is what ends it. Returns the
/// number of beats.
fn keep_alive(
    cancel: &CancelToken,
    interval: Duration,
    duration: Option<Duration>,
    mut beat: impl FnMut(),
) -> u64 {
    let started = Instant::now();
    let mut beats = 0;
    loop {
        let mut wait = interval;
        if let Some(limit) = duration {
            let left = limit.saturating_sub(started.elapsed());
            if left.is_zero() {
                cancel.cancel();
                break;
            }
            wait = wait.min(left);
        }
        if cancel.wait(wait) {
            break;
        }
        beat();
        beats += 1;
    }
    beats
}

fn run_preview(config: &KeywaveConfig) -> Result<()> {
    let mut engine = new_engine(config)?;
    let cancel = CancelToken::new();
    let mut sink = PreviewSink::new(*engine.grid(), cancel.clone())?;
    engine.run(&mut sink, &cancel);
    Ok(())
}

fn dump(config: &KeywaveConfig, frames: usize) -> Result<()> {
    let mut engine = new_engine(config)?;
    for frame in engine.frames().take(frames) {
        println!("{}", serde_json::to_string(&GameEvent::new(&config.app, &frame))?);
    }
    Ok(())
}

fn remove(config: &KeywaveConfig) -> Result<()> {
    let base_url = daemon::resolve_base_url(&config.daemon)?;
    let client = GameSenseClient::new(base_url, config.app.clone(), config.daemon.timeout);
    client.unbind_animation_event()?;
    client.unregister_application()?;
    Ok(())
}
