//! Keyframe payloads, one struct per track kind, plus the [`KeyframeEvent`]
//! union used for per-tick dispatch.

use serde::{Deserialize, Serialize};

use crate::smoothing::SmoothingMode;
use crate::transform::Transform;
use crate::types::EntityId;

// ---------------------------------------------------------------------------
// Generic keyframe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct KeyframeId(pub u64);

impl std::fmt::Display for KeyframeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kf{}", self.0)
    }
}

/// A timestamped payload. Time is in ticks and never negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keyframe<P> {
    pub id: KeyframeId,
    pub time: u64,
    pub payload: P,
}

impl<P> Keyframe<P> {
    /// Negative times clamp to 0.
    pub fn new(id: KeyframeId, time: i64, payload: P) -> Self {
        Self {
            id,
            time: clamp_time(time),
            payload,
        }
    }
}

pub(crate) fn clamp_time(time: i64) -> u64 {
    time.max(0) as u64
}

// ---------------------------------------------------------------------------
// Look-at
// ---------------------------------------------------------------------------

/// Something a camera or actor can be pointed at. Entity references are
/// resolved every tick, so a moving target is followed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LookAtTarget {
    #[default]
    None,
    Position { transform: Transform },
    Entity { entity: EntityRef },
}

impl LookAtTarget {
    pub fn is_none(&self) -> bool {
        matches!(self, LookAtTarget::None)
    }
}

/// A reference to a live entity, looked up by id at use time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// A world entity the scene author pinned directly.
    World(EntityId),
    /// A scene actor, resolved through the session's actor handles.
    Actor(String),
    /// A model entity spawned by a model keyframe in this session.
    Model(String),
    /// The watching viewer.
    Viewer,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraKey {
    pub transform: Transform,
    #[serde(default)]
    pub smoothing: SmoothingMode,
    /// Shorthand for an instant cut regardless of `smoothing`.
    #[serde(default)]
    pub instant: bool,
    #[serde(default)]
    pub look_at: LookAtTarget,
}

impl CameraKey {
    pub fn new(transform: Transform, smoothing: SmoothingMode) -> Self {
        Self {
            transform,
            smoothing,
            instant: false,
            look_at: LookAtTarget::None,
        }
    }

    pub fn looking_at(mut self, target: LookAtTarget) -> Self {
        self.look_at = target;
        self
    }

    /// Effective mode after the instant flag and scene default are applied.
    pub fn effective_smoothing(&self, scene_default: SmoothingMode) -> SmoothingMode {
        if self.instant {
            SmoothingMode::Instant
        } else {
            self.smoothing.resolve(scene_default)
        }
    }
}

/// Principal a command keyframe runs as.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandExecutor {
    #[default]
    Viewer,
    /// The viewer, with elevated permissions for the duration of the command.
    ViewerElevated,
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandKey {
    pub commands: Vec<String>,
    #[serde(default)]
    pub executor: CommandExecutor,
    /// Permit selectors that reach beyond the viewer (`@a`, `@e`, `@r`).
    #[serde(default)]
    pub allow_global: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionbarKey {
    pub text: String,
    pub duration_ticks: u64,
}

impl ActionbarKey {
    pub fn new(text: impl Into<String>, duration_ticks: u64) -> Self {
        Self {
            text: text.into(),
            duration_ticks: duration_ticks.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelAction {
    Spawn,
    Animate,
    Stop,
    Despawn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelKey {
    pub action: ModelAction,
    /// Entry in the scene's model library.
    pub model_id: String,
    /// Session-local name the spawned entity is known by.
    pub entity_ref: String,
    #[serde(default)]
    pub animation_id: Option<String>,
    #[serde(default)]
    pub looped: bool,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub spawn_transform: Option<Transform>,
}

fn default_speed() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticleKey {
    pub particle_id: String,
    pub transform: Transform,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoundKey {
    pub sound_id: String,
    pub transform: Transform,
    #[serde(default = "default_unit")]
    pub volume: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
}

fn default_unit() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockIllusionKey {
    pub block_id: String,
    pub transform: Transform,
}

// ---------------------------------------------------------------------------
// Dispatch union
// ---------------------------------------------------------------------------

/// One keyframe of any kind, as handed to the session for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyframeEvent {
    Camera(Keyframe<CameraKey>),
    Command(Keyframe<CommandKey>),
    Actionbar(Keyframe<ActionbarKey>),
    Model(Keyframe<ModelKey>),
    Particle(Keyframe<ParticleKey>),
    Sound(Keyframe<SoundKey>),
    BlockIllusion(Keyframe<BlockIllusionKey>),
}

impl KeyframeEvent {
    pub fn id(&self) -> KeyframeId {
        match self {
            KeyframeEvent::Camera(k) => k.id,
            KeyframeEvent::Command(k) => k.id,
            KeyframeEvent::Actionbar(k) => k.id,
            KeyframeEvent::Model(k) => k.id,
            KeyframeEvent::Particle(k) => k.id,
            KeyframeEvent::Sound(k) => k.id,
            KeyframeEvent::BlockIllusion(k) => k.id,
        }
    }

    pub fn time(&self) -> u64 {
        match self {
            KeyframeEvent::Camera(k) => k.time,
            KeyframeEvent::Command(k) => k.time,
            KeyframeEvent::Actionbar(k) => k.time,
            KeyframeEvent::Model(k) => k.time,
            KeyframeEvent::Particle(k) => k.time,
            KeyframeEvent::Sound(k) => k.time,
            KeyframeEvent::BlockIllusion(k) => k.time,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            KeyframeEvent::Camera(_) => "camera",
            KeyframeEvent::Command(_) => "command",
            KeyframeEvent::Actionbar(_) => "actionbar",
            KeyframeEvent::Model(_) => "model",
            KeyframeEvent::Particle(_) => "particle",
            KeyframeEvent::Sound(_) => "sound",
            KeyframeEvent::BlockIllusion(_) => "block_illusion",
        }
    }
}
