//! In-memory world that implements every collaborator.
//!
//! Used by the server binary (no real game host attached) and by the tests.
//! All clones share one [`HeadlessState`], so a test can keep a handle,
//! box clones into [`Collaborators`], and inspect or poke the world between
//! ticks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::actor::{PoseFlags, SkinDescriptor};
use crate::error::{CutsceneError, Result};
use crate::host::{
    Collaborators, CommandPrincipal, ModelProvider, MovementMode, ObservationLock,
    PuppetProvider, StatusEffect, ViewerInfo, ViewerSnapshot, VisibilityController, WorldHost,
};
use crate::keyframe::{BlockIllusionKey, ParticleKey, SoundKey};
use crate::scene::ModelEntry;
use crate::transform::Transform;
use crate::types::{EntityId, HostFeatures, PuppetHandle, ViewerId};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessViewer {
    pub name: String,
    pub transform: Transform,
    pub movement_mode: MovementMode,
    pub allow_flight: bool,
    pub flying: bool,
    pub fly_speed: f32,
    pub walk_speed: f32,
    pub max_health: Option<f64>,
    pub status_effects: Vec<StatusEffect>,
    pub head_item: Option<String>,
    pub spectator_target: Option<EntityId>,
    pub packet_target: Option<EntityId>,
    pub teleports: u32,
}

impl HeadlessViewer {
    fn new(name: &str, transform: Transform) -> Self {
        Self {
            name: name.to_string(),
            transform,
            movement_mode: MovementMode::Survival,
            allow_flight: false,
            flying: false,
            fly_speed: 0.1,
            walk_speed: 0.2,
            max_health: Some(20.0),
            status_effects: Vec::new(),
            head_item: None,
            spectator_target: None,
            packet_target: None,
            teleports: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    CameraProxy,
    Puppet(PuppetHandle),
    Model(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessEntity {
    pub kind: EntityKind,
    pub transform: Transform,
    pub scale: f64,
    /// `None` means visible to everyone.
    pub visible_to: Option<BTreeSet<ViewerId>>,
}

impl HeadlessEntity {
    pub fn is_visible_to(&self, viewer: &str) -> bool {
        self.visible_to.as_ref().is_none_or(|v| v.contains(viewer))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessPuppet {
    pub kind: String,
    pub name: String,
    pub entity: Option<EntityId>,
    pub skin: Option<SkinDescriptor>,
    pub flags: PoseFlags,
    pub destination: Option<Transform>,
    pub animations: Vec<String>,
}

/// Effects sent to a viewer, in dispatch order.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectRecord {
    Particle { viewer: ViewerId, particle_id: String },
    Sound { viewer: ViewerId, sound_id: String },
    Block { viewer: ViewerId, block_id: String },
    ModelAnimation { entity: EntityId, animation: String },
    ModelStop { entity: EntityId },
}

#[derive(Debug)]
pub struct HeadlessState {
    pub features: HostFeatures,
    pub viewers: BTreeMap<ViewerId, HeadlessViewer>,
    pub entities: BTreeMap<EntityId, HeadlessEntity>,
    pub puppets: BTreeMap<u64, HeadlessPuppet>,
    pub commands: Vec<(CommandPrincipal, String)>,
    pub actionbars: Vec<(ViewerId, String)>,
    pub effects: Vec<EffectRecord>,
    pub puppets_available: bool,
    pub packet_camera_available: bool,
    pub models_available: bool,
    /// Puppet provider honours per-viewer filtering itself.
    pub native_puppet_visibility: bool,
    /// Commands containing this text panic inside the host.
    pub panic_on_command: Option<String>,
    /// Number of upcoming puppet spawns that fail.
    pub failing_puppet_spawns: u32,
    next_entity: u64,
    next_puppet: u64,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            features: HostFeatures {
                scale_attribute: true,
                extended_poses: true,
            },
            viewers: BTreeMap::new(),
            entities: BTreeMap::new(),
            puppets: BTreeMap::new(),
            commands: Vec::new(),
            actionbars: Vec::new(),
            effects: Vec::new(),
            puppets_available: true,
            packet_camera_available: false,
            models_available: true,
            native_puppet_visibility: true,
            panic_on_command: None,
            failing_puppet_spawns: 0,
            next_entity: 1,
            next_puppet: 1,
        }
    }
}

impl HeadlessState {
    fn spawn_entity(&mut self, kind: EntityKind, at: &Transform) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(
            id,
            HeadlessEntity {
                kind,
                transform: at.clone(),
                scale: 1.0,
                visible_to: None,
            },
        );
        id
    }

    fn viewer_mut(&mut self, viewer: &str) -> Result<&mut HeadlessViewer> {
        self.viewers
            .get_mut(viewer)
            .ok_or_else(|| CutsceneError::ViewerNotFound(viewer.to_string()))
    }

    fn entity_mut(&mut self, entity: EntityId) -> Result<&mut HeadlessEntity> {
        self.entities
            .get_mut(&entity)
            .ok_or(CutsceneError::EntityMissing(entity))
    }
}

// ---------------------------------------------------------------------------
// HeadlessWorld
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HeadlessWorld {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(features: HostFeatures) -> Self {
        let world = Self::new();
        world.state().features = features;
        world
    }

    /// Box a clone of this world into every collaborator slot.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(Box::new(self.clone()), Box::new(self.clone()))
            .with_puppets(Box::new(self.clone()))
            .with_camera_protocol(Box::new(self.clone()))
            .with_models(Box::new(self.clone()))
    }

    pub fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock()
    }

    // -----------------------------------------------------------------------
    // Scenario controls
    // -----------------------------------------------------------------------

    pub fn add_viewer(&self, id: &str, name: &str, at: Transform) {
        self.state()
            .viewers
            .insert(id.to_string(), HeadlessViewer::new(name, at));
    }

    /// Change a viewer in place, as gameplay would between or during scenes.
    pub fn edit_viewer<F>(&self, id: &str, f: F)
    where
        F: FnOnce(&mut HeadlessViewer),
    {
        if let Some(v) = self.state().viewers.get_mut(id) {
            f(v);
        }
    }

    pub fn remove_viewer(&self, id: &str) {
        self.state().viewers.remove(id);
    }

    /// Knock the viewer off whatever it is spectating.
    pub fn detach_lock(&self, id: &str) {
        if let Some(v) = self.state().viewers.get_mut(id) {
            v.spectator_target = None;
            v.packet_target = None;
        }
    }

    pub fn kill_entity(&self, entity: EntityId) {
        self.state().entities.remove(&entity);
    }

    /// Remove the puppet's body but keep its handle, as when a provider
    /// despawns an NPC behind our back.
    pub fn kill_puppet_body(&self, puppet: PuppetHandle) {
        let mut state = self.state();
        let body = state.puppets.get_mut(&puppet.0).and_then(|p| p.entity.take());
        if let Some(entity) = body {
            state.entities.remove(&entity);
        }
    }

    pub fn set_puppets_available(&self, available: bool) {
        self.state().puppets_available = available;
    }

    pub fn set_packet_camera_available(&self, available: bool) {
        self.state().packet_camera_available = available;
    }

    pub fn set_models_available(&self, available: bool) {
        self.state().models_available = available;
    }

    pub fn set_native_puppet_visibility(&self, native: bool) {
        self.state().native_puppet_visibility = native;
    }

    pub fn fail_puppet_spawns(&self, count: u32) {
        self.state().failing_puppet_spawns = count;
    }

    pub fn panic_on_command(&self, needle: &str) {
        self.state().panic_on_command = Some(needle.to_string());
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn viewer_state(&self, id: &str) -> Option<HeadlessViewer> {
        self.state().viewers.get(id).cloned()
    }

    pub fn entity(&self, entity: EntityId) -> Option<HeadlessEntity> {
        self.state().entities.get(&entity).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.state().entities.len()
    }

    pub fn live_puppets(&self) -> usize {
        self.state()
            .puppets
            .values()
            .filter(|p| p.entity.is_some())
            .count()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn actionbars_for(&self, viewer: &str) -> Vec<String> {
        self.state()
            .actionbars
            .iter()
            .filter(|(v, _)| v == viewer)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn effects(&self) -> Vec<EffectRecord> {
        self.state().effects.clone()
    }
}

// ---------------------------------------------------------------------------
// WorldHost
// ---------------------------------------------------------------------------

impl WorldHost for HeadlessWorld {
    fn features(&self) -> HostFeatures {
        self.state().features
    }

    fn viewer(&self, viewer: &str) -> Option<ViewerInfo> {
        self.state().viewers.get(viewer).map(|v| ViewerInfo {
            id: viewer.to_string(),
            name: v.name.clone(),
            transform: v.transform.clone(),
        })
    }

    fn capture_viewer(&self, viewer: &str) -> Result<ViewerSnapshot> {
        let state = self.state();
        let v = state
            .viewers
            .get(viewer)
            .ok_or_else(|| CutsceneError::ViewerNotFound(viewer.to_string()))?;
        Ok(ViewerSnapshot {
            location: v.transform.clone(),
            movement_mode: v.movement_mode,
            allow_flight: v.allow_flight,
            flying: v.flying,
            fly_speed: v.fly_speed,
            walk_speed: v.walk_speed,
            max_health: v.max_health,
            status_effects: v.status_effects.clone(),
            head_item: v.head_item.clone(),
        })
    }

    fn restore_viewer(&mut self, viewer: &str, snapshot: &ViewerSnapshot) -> Result<()> {
        let mut state = self.state();
        let v = state.viewer_mut(viewer)?;
        v.movement_mode = snapshot.movement_mode;
        v.allow_flight = snapshot.allow_flight;
        v.flying = snapshot.flying;
        v.fly_speed = snapshot.fly_speed;
        v.walk_speed = snapshot.walk_speed;
        v.max_health = snapshot.max_health;
        v.status_effects = snapshot.status_effects.clone();
        v.head_item = snapshot.head_item.clone();
        Ok(())
    }

    fn set_movement_mode(&mut self, viewer: &str, mode: MovementMode) -> Result<()> {
        let mut state = self.state();
        let v = state.viewer_mut(viewer)?;
        v.movement_mode = mode;
        if mode != MovementMode::Spectator {
            v.spectator_target = None;
        }
        Ok(())
    }

    fn set_head_item(&mut self, viewer: &str, item: Option<&str>) -> Result<()> {
        self.state().viewer_mut(viewer)?.head_item = item.map(str::to_string);
        Ok(())
    }

    fn teleport_viewer(&mut self, viewer: &str, to: &Transform) -> Result<()> {
        let mut state = self.state();
        let v = state.viewer_mut(viewer)?;
        v.transform = to.clone();
        v.teleports += 1;
        Ok(())
    }

    fn set_spectator_target(&mut self, viewer: &str, target: Option<EntityId>) -> Result<()> {
        let mut state = self.state();
        if let Some(entity) = target {
            if !state.entities.contains_key(&entity) {
                return Err(CutsceneError::EntityMissing(entity));
            }
        }
        state.viewer_mut(viewer)?.spectator_target = target;
        Ok(())
    }

    fn spectator_target(&self, viewer: &str) -> Option<EntityId> {
        self.state().viewers.get(viewer)?.spectator_target
    }

    fn spawn_camera_proxy(&mut self, at: &Transform) -> Result<EntityId> {
        let id = self.state().spawn_entity(EntityKind::CameraProxy, at);
        debug!("Headless camera proxy {} at {}", id, at);
        Ok(id)
    }

    fn entity_transform(&self, entity: EntityId) -> Option<Transform> {
        self.state().entities.get(&entity).map(|e| e.transform.clone())
    }

    fn teleport_entity(&mut self, entity: EntityId, to: &Transform) -> Result<()> {
        self.state().entity_mut(entity)?.transform = to.clone();
        Ok(())
    }

    fn set_entity_scale(&mut self, entity: EntityId, scale: f64) -> Result<()> {
        self.state().entity_mut(entity)?.scale = scale;
        Ok(())
    }

    fn remove_entity(&mut self, entity: EntityId) -> Result<()> {
        self.state()
            .entities
            .remove(&entity)
            .map(|_| ())
            .ok_or(CutsceneError::EntityMissing(entity))
    }

    fn send_actionbar(&mut self, viewer: &str, text: &str) {
        self.state()
            .actionbars
            .push((viewer.to_string(), text.to_string()));
    }

    fn dispatch_command(&mut self, principal: &CommandPrincipal, command: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(needle) = &state.panic_on_command {
            if command.contains(needle.as_str()) {
                panic!("host crashed running '{}'", command);
            }
        }
        state.commands.push((principal.clone(), command.to_string()));
        Ok(())
    }

    fn play_particle(&mut self, viewer: &str, particle: &ParticleKey) -> Result<()> {
        if particle.particle_id.is_empty() {
            return Err(CutsceneError::UnknownEffect {
                kind: "particle",
                id: String::new(),
            });
        }
        self.state().effects.push(EffectRecord::Particle {
            viewer: viewer.to_string(),
            particle_id: particle.particle_id.clone(),
        });
        Ok(())
    }

    fn play_sound(&mut self, viewer: &str, sound: &SoundKey) -> Result<()> {
        if sound.sound_id.is_empty() {
            return Err(CutsceneError::UnknownEffect {
                kind: "sound",
                id: String::new(),
            });
        }
        self.state().effects.push(EffectRecord::Sound {
            viewer: viewer.to_string(),
            sound_id: sound.sound_id.clone(),
        });
        Ok(())
    }

    fn show_block_illusion(&mut self, viewer: &str, block: &BlockIllusionKey) -> Result<()> {
        if block.block_id.is_empty() {
            return Err(CutsceneError::UnknownEffect {
                kind: "block",
                id: String::new(),
            });
        }
        self.state().effects.push(EffectRecord::Block {
            viewer: viewer.to_string(),
            block_id: block.block_id.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

impl VisibilityController for HeadlessWorld {
    fn hide_from_all_except(&mut self, entity: EntityId, owner: &str) {
        if let Some(e) = self.state().entities.get_mut(&entity) {
            e.visible_to = Some(BTreeSet::from([owner.to_string()]));
        }
    }

    fn show_to(&mut self, entity: EntityId, viewer: &str) {
        if let Some(e) = self.state().entities.get_mut(&entity) {
            if let Some(set) = e.visible_to.as_mut() {
                set.insert(viewer.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Puppets
// ---------------------------------------------------------------------------

impl PuppetProvider for HeadlessWorld {
    fn is_available(&self) -> bool {
        self.state().puppets_available
    }

    fn create(&mut self, kind: &str, name: &str) -> Option<PuppetHandle> {
        let mut state = self.state();
        if !state.puppets_available {
            return None;
        }
        let handle = state.next_puppet;
        state.next_puppet += 1;
        state.puppets.insert(
            handle,
            HeadlessPuppet {
                kind: kind.to_string(),
                name: name.to_string(),
                entity: None,
                skin: None,
                flags: PoseFlags::default(),
                destination: None,
                animations: Vec::new(),
            },
        );
        Some(PuppetHandle(handle))
    }

    fn spawn(&mut self, puppet: PuppetHandle, at: &Transform) -> bool {
        let mut state = self.state();
        if !state.puppets.contains_key(&puppet.0) {
            return false;
        }
        if state.failing_puppet_spawns > 0 {
            state.failing_puppet_spawns -= 1;
            return false;
        }
        let entity = state.spawn_entity(EntityKind::Puppet(puppet), at);
        if let Some(p) = state.puppets.get_mut(&puppet.0) {
            p.entity = Some(entity);
        }
        true
    }

    fn destroy(&mut self, puppet: PuppetHandle) {
        let mut state = self.state();
        if let Some(entity) = state.puppets.remove(&puppet.0).and_then(|p| p.entity) {
            state.entities.remove(&entity);
        }
    }

    fn world_entity(&self, puppet: PuppetHandle) -> Option<EntityId> {
        let state = self.state();
        state
            .puppets
            .get(&puppet.0)?
            .entity
            .filter(|e| state.entities.contains_key(e))
    }

    fn set_move_destination(&mut self, puppet: PuppetHandle, to: &Transform) {
        let mut state = self.state();
        // No pathfinding: the body arrives immediately.
        let entity = state.puppets.get_mut(&puppet.0).and_then(|p| {
            p.destination = Some(to.clone());
            p.entity
        });
        if let Some(e) = entity.and_then(|e| state.entities.get_mut(&e)) {
            e.transform = to.clone();
        }
    }

    fn apply_skin(&mut self, puppet: PuppetHandle, skin: &SkinDescriptor) {
        if let Some(p) = self.state().puppets.get_mut(&puppet.0) {
            p.skin = Some(skin.clone());
        }
    }

    fn restrict_visibility(&mut self, puppet: PuppetHandle, owner: &str) -> bool {
        let mut state = self.state();
        if !state.native_puppet_visibility {
            return false;
        }
        let Some(entity) = state.puppets.get(&puppet.0).and_then(|p| p.entity) else {
            return false;
        };
        match state.entities.get_mut(&entity) {
            Some(e) => {
                e.visible_to = Some(BTreeSet::from([owner.to_string()]));
                true
            }
            None => false,
        }
    }

    fn play_animation(&mut self, puppet: PuppetHandle, animation: &str) -> bool {
        match self.state().puppets.get_mut(&puppet.0) {
            Some(p) => {
                p.animations.push(animation.to_string());
                true
            }
            None => false,
        }
    }

    fn set_pose_flags(&mut self, puppet: PuppetHandle, flags: PoseFlags) {
        if let Some(p) = self.state().puppets.get_mut(&puppet.0) {
            p.flags = flags;
        }
    }
}

// ---------------------------------------------------------------------------
// Packet camera
// ---------------------------------------------------------------------------

impl ObservationLock for HeadlessWorld {
    fn is_available(&self) -> bool {
        self.state().packet_camera_available
    }

    fn apply_locked_view(&mut self, viewer: &str, target: EntityId) -> Result<()> {
        let mut state = self.state();
        if !state.entities.contains_key(&target) {
            return Err(CutsceneError::EntityMissing(target));
        }
        state.viewer_mut(viewer)?.packet_target = Some(target);
        Ok(())
    }

    fn clear_locked_view(&mut self, viewer: &str) {
        if let Some(v) = self.state().viewers.get_mut(viewer) {
            v.packet_target = None;
        }
    }

    fn locked_target(&self, viewer: &str) -> Option<EntityId> {
        self.state().viewers.get(viewer)?.packet_target
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

impl ModelProvider for HeadlessWorld {
    fn is_available(&self) -> bool {
        self.state().models_available
    }

    fn spawn_model(&mut self, entry: &ModelEntry, at: &Transform) -> Result<EntityId> {
        let mut state = self.state();
        let id = state.spawn_entity(EntityKind::Model(entry.asset.clone()), at);
        if let Some(e) = state.entities.get_mut(&id) {
            e.scale = entry.scale;
        }
        Ok(id)
    }

    fn play_animation(
        &mut self,
        entity: EntityId,
        animation: &str,
        _looped: bool,
        _speed: f32,
    ) -> Result<()> {
        let mut state = self.state();
        state.entity_mut(entity)?;
        state.effects.push(EffectRecord::ModelAnimation {
            entity,
            animation: animation.to_string(),
        });
        Ok(())
    }

    fn stop_animation(&mut self, entity: EntityId) -> Result<()> {
        let mut state = self.state();
        state.entity_mut(entity)?;
        state.effects.push(EffectRecord::ModelStop { entity });
        Ok(())
    }
}
