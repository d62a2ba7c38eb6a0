//! Contracts the playback engine needs from the surrounding world.
//!
//! ```text
//! CutsceneService
//!   └── Collaborators
//!         ├── WorldHost            (required)  viewers, entities, effects, commands
//!         ├── VisibilityController (required)  per-viewer entity visibility
//!         ├── PuppetProvider       (optional)  actor puppets
//!         ├── ObservationLock      (optional)  packet-level camera targeting
//!         ├── ModelProvider        (optional)  animated model entities
//!         └── TextFormatter                    placeholder substitution
//! ```
//!
//! Optional integrations report `is_available()`. Callers branch on it; an
//! absent integration is a normal code path, never an error.

use std::collections::HashSet;

use log::info;
use serde::{Deserialize, Serialize};

use crate::actor::{PoseFlags, SkinDescriptor};
use crate::error::Result;
use crate::keyframe::{BlockIllusionKey, ParticleKey, SoundKey};
use crate::placeholder::{BraceFormatter, TextFormatter};
use crate::scene::ModelEntry;
use crate::transform::Transform;
use crate::types::{EntityId, HostFeatures, PuppetHandle, ViewerId};

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    /// Fixed observation: no body, view follows a target entity.
    Spectator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub effect: String,
    pub amplifier: u8,
    pub duration_ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerInfo {
    pub id: ViewerId,
    pub name: String,
    pub transform: Transform,
}

/// Everything about a viewer that a session changes and must put back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    pub location: Transform,
    pub movement_mode: MovementMode,
    pub allow_flight: bool,
    pub flying: bool,
    pub fly_speed: f32,
    pub walk_speed: f32,
    /// `None` when the viewer has no max-health attribute.
    pub max_health: Option<f64>,
    pub status_effects: Vec<StatusEffect>,
    pub head_item: Option<String>,
}

/// Who a command runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "viewer", rename_all = "snake_case")]
pub enum CommandPrincipal {
    Viewer(ViewerId),
    ElevatedViewer(ViewerId),
    Console,
}

// ---------------------------------------------------------------------------
// Required collaborators
// ---------------------------------------------------------------------------

pub trait WorldHost: Send {
    /// Probed once when the service is built.
    fn features(&self) -> HostFeatures;

    /// `None` when the viewer is not connected.
    fn viewer(&self, viewer: &str) -> Option<ViewerInfo>;
    fn capture_viewer(&self, viewer: &str) -> Result<ViewerSnapshot>;
    /// Restore everything in the snapshot except `location`.
    fn restore_viewer(&mut self, viewer: &str, snapshot: &ViewerSnapshot) -> Result<()>;
    fn set_movement_mode(&mut self, viewer: &str, mode: MovementMode) -> Result<()>;
    fn set_head_item(&mut self, viewer: &str, item: Option<&str>) -> Result<()>;
    fn teleport_viewer(&mut self, viewer: &str, to: &Transform) -> Result<()>;

    /// Native fixed-observation fallback: spectate `target`.
    fn set_spectator_target(&mut self, viewer: &str, target: Option<EntityId>) -> Result<()>;
    fn spectator_target(&self, viewer: &str) -> Option<EntityId>;

    /// Spawn the invisible entity a session's camera rides on.
    fn spawn_camera_proxy(&mut self, at: &Transform) -> Result<EntityId>;
    fn entity_transform(&self, entity: EntityId) -> Option<Transform>;
    fn teleport_entity(&mut self, entity: EntityId, to: &Transform) -> Result<()>;
    fn set_entity_scale(&mut self, entity: EntityId, scale: f64) -> Result<()>;
    fn remove_entity(&mut self, entity: EntityId) -> Result<()>;

    fn send_actionbar(&mut self, viewer: &str, text: &str);
    fn dispatch_command(&mut self, principal: &CommandPrincipal, command: &str) -> Result<()>;
    fn play_particle(&mut self, viewer: &str, particle: &ParticleKey) -> Result<()>;
    fn play_sound(&mut self, viewer: &str, sound: &SoundKey) -> Result<()>;
    fn show_block_illusion(&mut self, viewer: &str, block: &BlockIllusionKey) -> Result<()>;
}

pub trait VisibilityController: Send {
    fn hide_from_all_except(&mut self, entity: EntityId, owner: &str);
    fn show_to(&mut self, entity: EntityId, viewer: &str);
}

// ---------------------------------------------------------------------------
// Optional collaborators
// ---------------------------------------------------------------------------

pub trait PuppetProvider: Send {
    fn is_available(&self) -> bool;
    fn create(&mut self, kind: &str, name: &str) -> Option<PuppetHandle>;
    fn spawn(&mut self, puppet: PuppetHandle, at: &Transform) -> bool;
    fn destroy(&mut self, puppet: PuppetHandle);
    /// `None` once the puppet has no live body.
    fn world_entity(&self, puppet: PuppetHandle) -> Option<EntityId>;
    /// Walk mode only: pursue `to` at the provider's own speed.
    fn set_move_destination(&mut self, puppet: PuppetHandle, to: &Transform);
    fn apply_skin(&mut self, puppet: PuppetHandle, skin: &SkinDescriptor);
    /// Returns whether native per-viewer filtering succeeded.
    fn restrict_visibility(&mut self, puppet: PuppetHandle, owner: &str) -> bool;
    fn play_animation(&mut self, puppet: PuppetHandle, animation: &str) -> bool;
    fn set_pose_flags(&mut self, puppet: PuppetHandle, flags: PoseFlags);
}

/// Packet-level camera targeting from a richer protocol integration.
pub trait ObservationLock: Send {
    fn is_available(&self) -> bool;
    fn apply_locked_view(&mut self, viewer: &str, target: EntityId) -> Result<()>;
    fn clear_locked_view(&mut self, viewer: &str);
    fn locked_target(&self, viewer: &str) -> Option<EntityId>;
}

pub trait ModelProvider: Send {
    fn is_available(&self) -> bool;
    fn spawn_model(&mut self, entry: &ModelEntry, at: &Transform) -> Result<EntityId>;
    fn play_animation(
        &mut self,
        entity: EntityId,
        animation: &str,
        looped: bool,
        speed: f32,
    ) -> Result<()>;
    fn stop_animation(&mut self, entity: EntityId) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Absent integrations
// ---------------------------------------------------------------------------

/// Stand-in when no puppet plugin is installed.
pub struct NoPuppets;

impl PuppetProvider for NoPuppets {
    fn is_available(&self) -> bool {
        false
    }
    fn create(&mut self, _kind: &str, _name: &str) -> Option<PuppetHandle> {
        None
    }
    fn spawn(&mut self, _puppet: PuppetHandle, _at: &Transform) -> bool {
        false
    }
    fn destroy(&mut self, _puppet: PuppetHandle) {}
    fn world_entity(&self, _puppet: PuppetHandle) -> Option<EntityId> {
        None
    }
    fn set_move_destination(&mut self, _puppet: PuppetHandle, _to: &Transform) {}
    fn apply_skin(&mut self, _puppet: PuppetHandle, _skin: &SkinDescriptor) {}
    fn restrict_visibility(&mut self, _puppet: PuppetHandle, _owner: &str) -> bool {
        false
    }
    fn play_animation(&mut self, _puppet: PuppetHandle, _animation: &str) -> bool {
        false
    }
    fn set_pose_flags(&mut self, _puppet: PuppetHandle, _flags: PoseFlags) {}
}

/// Stand-in when no packet-level camera integration is installed.
pub struct NoPacketCamera;

impl ObservationLock for NoPacketCamera {
    fn is_available(&self) -> bool {
        false
    }
    fn apply_locked_view(&mut self, _viewer: &str, _target: EntityId) -> Result<()> {
        Ok(())
    }
    fn clear_locked_view(&mut self, _viewer: &str) {}
    fn locked_target(&self, _viewer: &str) -> Option<EntityId> {
        None
    }
}

pub struct NoModels;

impl ModelProvider for NoModels {
    fn is_available(&self) -> bool {
        false
    }
    fn spawn_model(&mut self, entry: &ModelEntry, _at: &Transform) -> Result<EntityId> {
        Err(crate::error::CutsceneError::UnknownEffect {
            kind: "model",
            id: entry.id.clone(),
        })
    }
    fn play_animation(
        &mut self,
        _entity: EntityId,
        _animation: &str,
        _looped: bool,
        _speed: f32,
    ) -> Result<()> {
        Ok(())
    }
    fn stop_animation(&mut self, _entity: EntityId) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

pub struct Collaborators {
    pub host: Box<dyn WorldHost>,
    pub visibility: Box<dyn VisibilityController>,
    pub puppets: Box<dyn PuppetProvider>,
    pub camera_protocol: Box<dyn ObservationLock>,
    pub models: Box<dyn ModelProvider>,
    pub formatter: Box<dyn TextFormatter>,
}

impl Collaborators {
    /// Required collaborators only; every optional integration starts absent.
    pub fn new(host: Box<dyn WorldHost>, visibility: Box<dyn VisibilityController>) -> Self {
        Self {
            host,
            visibility,
            puppets: Box::new(NoPuppets),
            camera_protocol: Box::new(NoPacketCamera),
            models: Box::new(NoModels),
            formatter: Box::new(BraceFormatter),
        }
    }

    pub fn with_puppets(mut self, puppets: Box<dyn PuppetProvider>) -> Self {
        self.puppets = puppets;
        self
    }

    pub fn with_camera_protocol(mut self, lock: Box<dyn ObservationLock>) -> Self {
        self.camera_protocol = lock;
        self
    }

    pub fn with_models(mut self, models: Box<dyn ModelProvider>) -> Self {
        self.models = models;
        self
    }

    pub fn with_formatter(mut self, formatter: Box<dyn TextFormatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

// ---------------------------------------------------------------------------
// Degradation log
// ---------------------------------------------------------------------------

/// Remembers which missing integrations were already reported, so each one
/// is logged once per service rather than every tick.
#[derive(Debug, Default)]
pub struct CapabilityLog {
    reported: HashSet<&'static str>,
}

impl CapabilityLog {
    pub fn note_missing(&mut self, feature: &'static str, message: &str) {
        if self.reported.insert(feature) {
            info!("{}", message);
        }
    }

    pub fn was_reported(&self, feature: &str) -> bool {
        self.reported.contains(feature)
    }
}
