//! The scene: one track per keyframe kind, actor templates and the model
//! library. Owned by the authoring layer; sessions hold a [`SharedScene`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::actor::SceneActorTemplate;
use crate::keyframe::{
    ActionbarKey, BlockIllusionKey, CameraKey, CommandKey, Keyframe, KeyframeEvent, KeyframeId,
    ModelKey, ParticleKey, SoundKey,
};
use crate::smoothing::{SmoothingMode, SmoothingQuality};
use crate::track::Track;
use crate::transform::Transform;

/// Scenes are read by live sessions while the editor may still hold them.
pub type SharedScene = Arc<RwLock<Scene>>;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// What happens to the viewer when the timeline finishes normally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndAction {
    /// Return to where the viewer stood before the scene.
    #[default]
    Restore,
    /// Leave the viewer at the camera's final position.
    StayAtCamera,
    Teleport { transform: Transform },
}

/// Library entry referenced by model keyframes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    /// Asset name understood by the model provider.
    pub asset: String,
    #[serde(default)]
    pub default_animation: Option<String>,
    #[serde(default = "default_model_scale")]
    pub scale: f64,
}

fn default_model_scale() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    name: String,
    pub duration_ticks: u64,
    #[serde(default)]
    pub default_smoothing: SmoothingMode,
    #[serde(default)]
    pub quality: SmoothingQuality,
    #[serde(default)]
    pub camera: Track<CameraKey>,
    #[serde(default)]
    pub commands: Track<CommandKey>,
    #[serde(default)]
    pub actionbars: Track<ActionbarKey>,
    #[serde(default)]
    pub models: Track<ModelKey>,
    #[serde(default)]
    pub particles: Track<ParticleKey>,
    #[serde(default)]
    pub sounds: Track<SoundKey>,
    #[serde(default)]
    pub blocks: Track<BlockIllusionKey>,
    #[serde(default)]
    pub actors: BTreeMap<String, SceneActorTemplate>,
    #[serde(default)]
    pub model_library: BTreeMap<String, ModelEntry>,
    #[serde(default)]
    pub end_action: EndAction,
    #[serde(default)]
    next_keyframe_id: u64,
}

impl Scene {
    pub fn new(name: impl Into<String>, duration_ticks: u64) -> Self {
        Self {
            name: name.into(),
            duration_ticks,
            default_smoothing: SmoothingMode::Ease,
            quality: SmoothingQuality::default(),
            camera: Track::new(),
            commands: Track::new(),
            actionbars: Track::new(),
            models: Track::new(),
            particles: Track::new(),
            sounds: Track::new(),
            blocks: Track::new(),
            actors: BTreeMap::new(),
            model_library: BTreeMap::new(),
            end_action: EndAction::Restore,
            next_keyframe_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_shared(self) -> SharedScene {
        Arc::new(RwLock::new(self))
    }

    /// Re-establish invariants after loading from an external format:
    /// track order and a keyframe id counter above every stored id.
    pub fn normalize(&mut self) {
        self.camera.normalize();
        self.commands.normalize();
        self.actionbars.normalize();
        self.models.normalize();
        self.particles.normalize();
        self.sounds.normalize();
        self.blocks.normalize();

        let max_id = self
            .all_keyframe_ids()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0);
        self.next_keyframe_id = self.next_keyframe_id.max(max_id);
    }

    fn all_keyframe_ids(&self) -> impl Iterator<Item = KeyframeId> + '_ {
        self.camera
            .iter()
            .map(|k| k.id)
            .chain(self.commands.iter().map(|k| k.id))
            .chain(self.actionbars.iter().map(|k| k.id))
            .chain(self.models.iter().map(|k| k.id))
            .chain(self.particles.iter().map(|k| k.id))
            .chain(self.sounds.iter().map(|k| k.id))
            .chain(self.blocks.iter().map(|k| k.id))
    }

    fn allocate_id(&mut self) -> KeyframeId {
        let id = KeyframeId(self.next_keyframe_id);
        self.next_keyframe_id += 1;
        id
    }

    // -----------------------------------------------------------------------
    // Keyframe creation
    // -----------------------------------------------------------------------

    pub fn add_camera(&mut self, time: i64, key: CameraKey) -> KeyframeId {
        let id = self.allocate_id();
        self.camera.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_command(&mut self, time: i64, key: CommandKey) -> KeyframeId {
        let id = self.allocate_id();
        self.commands.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_actionbar(&mut self, time: i64, key: ActionbarKey) -> KeyframeId {
        let id = self.allocate_id();
        self.actionbars.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_model(&mut self, time: i64, key: ModelKey) -> KeyframeId {
        let id = self.allocate_id();
        self.models.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_particle(&mut self, time: i64, key: ParticleKey) -> KeyframeId {
        let id = self.allocate_id();
        self.particles.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_sound(&mut self, time: i64, key: SoundKey) -> KeyframeId {
        let id = self.allocate_id();
        self.sounds.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_block_illusion(&mut self, time: i64, key: BlockIllusionKey) -> KeyframeId {
        let id = self.allocate_id();
        self.blocks.insert(Keyframe::new(id, time, key));
        id
    }

    pub fn add_actor(&mut self, template: SceneActorTemplate) {
        self.actors.insert(template.actor_id.clone(), template);
    }

    pub fn add_model_entry(&mut self, entry: ModelEntry) {
        self.model_library.insert(entry.id.clone(), entry);
    }

    // -----------------------------------------------------------------------
    // Playback views
    // -----------------------------------------------------------------------

    /// Every keyframe scheduled exactly at `tick`, cloned, camera first and
    /// then in track declaration order.
    pub fn keyframes_at(&self, tick: u64) -> Vec<KeyframeEvent> {
        let mut out = Vec::new();
        out.extend(self.camera.at_tick(tick).cloned().map(KeyframeEvent::Camera));
        out.extend(self.commands.at_tick(tick).cloned().map(KeyframeEvent::Command));
        out.extend(self.actionbars.at_tick(tick).cloned().map(KeyframeEvent::Actionbar));
        out.extend(self.models.at_tick(tick).cloned().map(KeyframeEvent::Model));
        out.extend(self.particles.at_tick(tick).cloned().map(KeyframeEvent::Particle));
        out.extend(self.sounds.at_tick(tick).cloned().map(KeyframeEvent::Sound));
        out.extend(self.blocks.at_tick(tick).cloned().map(KeyframeEvent::BlockIllusion));
        out
    }

    /// Sum of all track revisions; changes whenever any track changes.
    pub fn revision(&self) -> u64 {
        self.camera.revision()
            + self.commands.revision()
            + self.actionbars.revision()
            + self.models.revision()
            + self.particles.revision()
            + self.sounds.revision()
            + self.blocks.revision()
    }
}
