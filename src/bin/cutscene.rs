//! cutscene-world-server binary
//!
//! Plays a scene for one viewer against the headless world and prints every
//! playback event as a JSON line on stdout. Useful as a self-test of scene
//! files and playback settings without a game host.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                                | Default                    | Description                       |
//! |------------------------------------|----------------------------|-----------------------------------|
//! | `CUTSCENE_TICK_RATE_HZ`            | `20`                       | Playback tick rate                |
//! | `CUTSCENE_RECOVERY_COOLDOWN_TICKS` | `20`                       | Min ticks between lock recoveries |
//! | `CUTSCENE_LOOK_AT_DAMPING`         | `0.35`                     | Look-at turn fraction per tick    |
//! | `CUTSCENE_LOOK_AHEAD_TICKS`        | *(preset)*                 | Look-ahead override               |
//! | `CUTSCENE_CAMERA_HEAD_ITEM`        | `minecraft:carved_pumpkin` | Head item while watching          |
//! | `CUTSCENE_MAX_SESSIONS`            | `0` (unlimited)            | Concurrent session cap            |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cutscene_world::{
    actor::{ActorTickAction, PoseFlags, SceneActorTemplate},
    driver::{DriverConfig, PlaybackDriver},
    headless::HeadlessWorld,
    keyframe::{ActionbarKey, CameraKey, CommandExecutor, CommandKey},
    protocol::PlaybackEvent,
    scene::Scene,
    service::CutsceneService,
    session::SessionOptions,
    smoothing::SmoothingMode,
    transform::Transform,
    types::PlaybackConfig,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cutscene-world-server",
    about = "Cutscene World playback engine",
    version
)]
struct Args {
    /// Scene JSON file (built-in demo scene when omitted)
    #[arg(long, env = "CUTSCENE_SCENE")]
    scene: Option<PathBuf>,

    /// Optional TOML config file layered under CUTSCENE_* env vars
    #[arg(long, env = "CUTSCENE_CONFIG")]
    config: Option<PathBuf>,

    /// Viewer id to play the scene for
    #[arg(long, env = "CUTSCENE_VIEWER", default_value = "viewer-1")]
    viewer: String,

    /// Tick rate (Hz); overrides the config file
    #[arg(long)]
    tick_rate_hz: Option<f32>,

    /// First tick to play
    #[arg(long, default_value_t = 0)]
    start_tick: u64,

    /// Last tick to play (defaults to the scene duration)
    #[arg(long)]
    end_tick: Option<u64>,

    /// Play as an editor preview
    #[arg(long)]
    preview: bool,

    /// Use the packet-level camera lock instead of native spectating
    #[arg(long)]
    packet_camera: bool,

    /// Keep ticking after the scene finished (until Ctrl-C)
    #[arg(long)]
    keep_running: bool,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cutscene_world=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(hz) = args.tick_rate_hz {
        config.tick_rate_hz = hz;
    }

    let scene = match &args.scene {
        Some(path) => load_scene(path)?,
        None => demo_scene(),
    };

    log::info!(
        "Starting cutscene-world-server (scene='{}', viewer='{}', {:.0}Hz)",
        scene.name(),
        args.viewer,
        config.tick_rate_hz,
    );

    // Headless world with a single viewer standing at spawn
    let world = HeadlessWorld::new();
    world.add_viewer(
        &args.viewer,
        &args.viewer,
        Transform::new(0.0, 64.0, 0.0, 0.0, 0.0).in_world("world"),
    );
    world.set_packet_camera_available(args.packet_camera);

    let mut service = CutsceneService::new(config.clone(), world.collaborators())
        .context("Invalid playback configuration")?;

    let options = SessionOptions {
        preview: args.preview,
        start_tick: args.start_tick,
        end_tick: args.end_tick,
    };
    let started = service
        .start(&args.viewer, scene.into_shared(), options)
        .context("Failed to start playback")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    tx.send(PlaybackEvent::Started(started))
        .context("Event channel closed before playback started")?;

    // Print events as JSON lines
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Failed to serialise {} event: {}", event.subject(), e),
            }
        }
    });

    let driver_config = DriverConfig {
        tick_rate_hz: config.tick_rate_hz,
        exit_when_idle: !args.keep_running,
    };
    let service = Arc::new(parking_lot::Mutex::new(service));

    // Run until the scene ends or shutdown
    PlaybackDriver::new(driver_config, service).run(tx).await?;

    printer.await.context("Event printer task failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<PlaybackConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    let config: PlaybackConfig = builder
        .add_source(config::Environment::with_prefix("CUTSCENE").try_parsing(true))
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;
    Ok(config)
}

fn load_scene(path: &Path) -> Result<Scene> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene file {}", path.display()))?;
    let mut scene: Scene = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse scene file {}", path.display()))?;
    scene.normalize();
    Ok(scene)
}

/// Two-second fly-by with one walking actor, a greeting and a command.
fn demo_scene() -> Scene {
    let mut scene = Scene::new("demo", 40);

    let at = |x: f64, z: f64, yaw: f32| {
        Transform::new(x, 70.0, z, yaw, 15.0).in_world("world")
    };
    scene.add_camera(0, CameraKey::new(at(0.0, 0.0, 0.0), SmoothingMode::Default));
    scene.add_camera(20, CameraKey::new(at(10.0, 10.0, 90.0), SmoothingMode::Default));
    scene.add_camera(40, CameraKey::new(at(20.0, 0.0, 180.0), SmoothingMode::Default));

    scene.add_actionbar(5, ActionbarKey::new("Welcome, {viewer}", 30));
    scene.add_command(
        10,
        CommandKey {
            commands: vec!["/say {viewer} is watching {scene} ({progress}%)".into()],
            executor: CommandExecutor::Console,
            allow_global: false,
        },
    );

    let mut guide = SceneActorTemplate::new("guide", "Guide");
    for tick in 10..=30u64 {
        let x = 5.0 + (tick - 10) as f64 * 0.25;
        guide.record_pose(
            tick,
            Transform::new(x, 64.0, 5.0, -90.0, 0.0).in_world("world"),
            PoseFlags::default(),
        );
    }
    guide.set_action(ActorTickAction {
        animation: Some("wave".into()),
        ..ActorTickAction::at(12)
    });
    scene.add_actor(guide);

    scene
}
