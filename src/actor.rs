//! Actor templates: a recorded performance for one puppeteered character.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keyframe::LookAtTarget;
use crate::transform::Transform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Teleport to the recorded pose every tick.
    #[default]
    Exact,
    /// Hand the recorded pose to the puppet as a walk destination.
    Walk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinDescriptor {
    pub texture: String,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseFlags {
    pub sneaking: bool,
    pub sprinting: bool,
    pub swimming: bool,
    pub gliding: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorTransformTick {
    pub tick: u64,
    pub transform: Transform,
    #[serde(default)]
    pub flags: PoseFlags,
}

/// Discrete things an actor does on one tick. Fired once, on `tick` only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorTickAction {
    pub tick: u64,
    pub spawn: bool,
    pub despawn: bool,
    /// The recorded pose is not applied on this tick; the actor keeps its
    /// current placement (any look-at still applies).
    pub manual_transform: bool,
    pub animation: Option<String>,
    pub look_at: LookAtTarget,
    pub command: Option<String>,
    pub scale: Option<f64>,
    pub skin: Option<SkinDescriptor>,
}

impl ActorTickAction {
    pub fn at(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Whether this action does anything at all.
    pub fn is_meaningful(&self) -> bool {
        self.spawn
            || self.despawn
            || self.manual_transform
            || self.animation.is_some()
            || !self.look_at.is_none()
            || self.command.is_some()
            || self.scale.is_some()
            || self.skin.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneActorTemplate {
    pub actor_id: String,
    #[serde(default = "default_kind")]
    pub entity_kind: String,
    pub display_name: String,
    #[serde(default)]
    pub skin: Option<SkinDescriptor>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub playback_mode: PlaybackMode,
    /// Included in preview sessions.
    #[serde(default)]
    pub previewable: bool,
    #[serde(default)]
    pub transform_ticks: BTreeMap<u64, ActorTransformTick>,
    #[serde(default)]
    pub actions: BTreeMap<u64, ActorTickAction>,
}

fn default_kind() -> String {
    "player".into()
}

fn default_scale() -> f64 {
    1.0
}

impl SceneActorTemplate {
    pub fn new(actor_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            entity_kind: default_kind(),
            display_name: display_name.into(),
            skin: None,
            scale: 1.0,
            playback_mode: PlaybackMode::Exact,
            previewable: false,
            transform_ticks: BTreeMap::new(),
            actions: BTreeMap::new(),
        }
    }

    pub fn record_pose(&mut self, tick: u64, transform: Transform, flags: PoseFlags) {
        self.transform_ticks.insert(
            tick,
            ActorTransformTick {
                tick,
                transform,
                flags,
            },
        );
    }

    /// Store an action, keyed by its own tick.
    pub fn set_action(&mut self, action: ActorTickAction) {
        self.actions.insert(action.tick, action);
    }

    pub fn clear_recording(&mut self) {
        self.transform_ticks.clear();
        self.actions.clear();
    }

    /// Non-empty recording: at least one pose or one meaningful action.
    pub fn has_recording(&self) -> bool {
        !self.transform_ticks.is_empty() || self.actions.values().any(|a| a.is_meaningful())
    }

    /// Eligible for playback in the given context. Evaluated every tick so a
    /// recording cleared mid-preview drops out immediately.
    pub fn is_playable(&self, preview: bool) -> bool {
        self.has_recording() && (!preview || self.previewable)
    }

    /// Step-hold: the pose recorded at `tick`, or else the latest one before it.
    pub fn pose_at(&self, tick: u64) -> Option<&ActorTransformTick> {
        self.transform_ticks
            .range(..=tick)
            .next_back()
            .map(|(_, pose)| pose)
    }

    pub fn first_pose(&self) -> Option<&ActorTransformTick> {
        self.transform_ticks.values().next()
    }

    pub fn action_at(&self, tick: u64) -> Option<&ActorTickAction> {
        self.actions.get(&tick)
    }

    /// Actors with any spawn action stay hidden until that action fires.
    pub fn has_spawn_action(&self) -> bool {
        self.actions.values().any(|a| a.spawn)
    }

    /// Whether the actor should be visible on `tick`, replaying only the
    /// spawn/despawn flags of earlier actions. Used to seed sessions that
    /// start mid-timeline; no other action side effects are replayed.
    pub fn spawned_before(&self, tick: u64) -> bool {
        let mut spawned = !self.has_spawn_action()
            && self.first_pose().is_some_and(|p| p.tick < tick);
        for action in self.actions.range(..tick).map(|(_, a)| a) {
            if action.despawn {
                spawned = false;
            } else if action.spawn {
                spawned = true;
            }
        }
        spawned
    }
}
