//! Actor playback: drives puppets from recorded actor templates.
//!
//! Poses are step-held (the latest recorded pose at or before the tick),
//! never interpolated. Discrete actions fire on their own tick only.
//! Without a puppet provider this whole module is a silent no-op.

use std::collections::HashMap;

use log::{debug, warn};

use crate::actor::{
    ActorTickAction, ActorTransformTick, PlaybackMode, PoseFlags, SceneActorTemplate,
    SkinDescriptor,
};
use crate::host::{CapabilityLog, Collaborators, CommandPrincipal, ViewerInfo, WorldHost};
use crate::keyframe::{EntityRef, LookAtTarget};
use crate::placeholder::Placeholders;
use crate::transform::{Transform, Vec3};
use crate::types::{EntityId, HostFeatures, PuppetHandle, SessionStats};

/// Step-hold pose resolution: exact tick if recorded, else the latest before it.
pub fn resolve_pose(template: &SceneActorTemplate, tick: u64) -> Option<&ActorTransformTick> {
    template.pose_at(tick)
}

// ---------------------------------------------------------------------------
// Per-tick view of a template
// ---------------------------------------------------------------------------

/// The slice of a template one tick needs, copied out of the shared scene
/// so playback never iterates live scene data.
#[derive(Debug, Clone)]
pub struct ActorFrame {
    pub actor_id: String,
    pub entity_kind: String,
    pub display_name: String,
    pub skin: Option<SkinDescriptor>,
    pub scale: f64,
    pub playback_mode: PlaybackMode,
    pub playable: bool,
    pub pose: Option<ActorTransformTick>,
    pub action: Option<ActorTickAction>,
    pub has_spawn_action: bool,
    pub first_pose_tick: Option<u64>,
    /// Spawn state implied by everything before this tick.
    pub spawned_before: bool,
}

impl ActorFrame {
    pub fn capture(template: &SceneActorTemplate, tick: u64, preview: bool) -> Self {
        Self {
            actor_id: template.actor_id.clone(),
            entity_kind: template.entity_kind.clone(),
            display_name: template.display_name.clone(),
            skin: template.skin.clone(),
            scale: template.scale,
            playback_mode: template.playback_mode,
            playable: template.is_playable(preview),
            pose: resolve_pose(template, tick).cloned(),
            action: template.action_at(tick).cloned(),
            has_spawn_action: template.has_spawn_action(),
            first_pose_tick: template.first_pose().map(|p| p.tick),
            spawned_before: template.spawned_before(tick),
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// One actor's live state inside one session. Refers to world entities by
/// id only.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionActorHandle {
    pub actor_id: String,
    pub puppet: Option<PuppetHandle>,
    pub entity: Option<EntityId>,
    /// A puppet body was spawned and has not been despawned by the timeline.
    pub spawned: bool,
    /// The timeline currently wants this actor visible.
    pub wants_spawned: bool,
    pub last_applied: Option<Transform>,
    /// Provider-side per-viewer filtering worked; no manual re-hiding needed.
    pub native_visibility: bool,
}

impl SessionActorHandle {
    fn new(actor_id: &str, wants_spawned: bool) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            puppet: None,
            entity: None,
            spawned: false,
            wants_spawned,
            last_applied: None,
            native_visibility: false,
        }
    }
}

/// Inputs shared by every actor on one tick.
pub struct ActorTickContext<'a> {
    pub viewer: &'a ViewerInfo,
    pub tick: u64,
    pub features: HostFeatures,
    pub placeholders: &'a Placeholders,
    pub models: &'a HashMap<String, EntityId>,
}

// ---------------------------------------------------------------------------
// ActorPlayback
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ActorPlayback {
    handles: HashMap<String, SessionActorHandle>,
}

impl ActorPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, actor_id: &str) -> Option<&SessionActorHandle> {
        self.handles.get(actor_id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &SessionActorHandle> {
        self.handles.values()
    }

    /// Live world entity of a spawned actor.
    pub fn entity_of(&self, actor_id: &str) -> Option<EntityId> {
        self.handles
            .get(actor_id)
            .filter(|h| h.spawned)
            .and_then(|h| h.entity)
    }

    /// Advance every actor by one tick.
    pub fn tick(
        &mut self,
        frames: &[ActorFrame],
        ctx: &ActorTickContext<'_>,
        collab: &mut Collaborators,
        capabilities: &mut CapabilityLog,
        stats: &mut SessionStats,
    ) {
        self.drop_removed(frames, collab);
        if frames.is_empty() {
            return;
        }
        if !collab.puppets.is_available() {
            capabilities.note_missing("puppets", "puppet provider unavailable; actors disabled");
            return;
        }

        let mut look_ats = Vec::new();
        for frame in frames {
            if let Some(target) = self.tick_actor(frame, ctx, collab, stats) {
                look_ats.push((frame.actor_id.clone(), target));
            }
        }

        // Look-ats run after every actor moved so actor→actor targets see
        // this tick's positions.
        for (actor_id, target) in look_ats {
            self.face(&actor_id, &target, ctx, collab);
        }
    }

    /// Destroy handles whose actor is no longer in the scene.
    fn drop_removed(&mut self, frames: &[ActorFrame], collab: &mut Collaborators) {
        self.handles.retain(|actor_id, handle| {
            if frames.iter().any(|f| &f.actor_id == actor_id) {
                return true;
            }
            debug!("Actor '{}' was removed from the scene", actor_id);
            despawn(handle, collab);
            false
        });
    }

    fn tick_actor(
        &mut self,
        frame: &ActorFrame,
        ctx: &ActorTickContext<'_>,
        collab: &mut Collaborators,
        stats: &mut SessionStats,
    ) -> Option<LookAtTarget> {
        if !frame.playable {
            // Recording cleared or preview flag removed while playing.
            if let Some(handle) = self.handles.get_mut(&frame.actor_id) {
                handle.wants_spawned = false;
                despawn(handle, collab);
            }
            return None;
        }

        let handle = self
            .handles
            .entry(frame.actor_id.clone())
            .or_insert_with(|| SessionActorHandle::new(&frame.actor_id, frame.spawned_before));

        if !frame.has_spawn_action && frame.first_pose_tick == Some(ctx.tick) {
            handle.wants_spawned = true;
        }
        if let Some(action) = &frame.action {
            if action.despawn {
                handle.wants_spawned = false;
            } else if action.spawn {
                handle.wants_spawned = true;
            }
        }

        if !handle.wants_spawned {
            despawn(handle, collab);
            return None;
        }

        if !ensure_spawned(handle, frame, ctx, collab, stats) {
            return None;
        }
        let (Some(puppet), Some(entity)) = (handle.puppet, handle.entity) else {
            return None;
        };

        let manual = frame.action.as_ref().is_some_and(|a| a.manual_transform);
        if let (Some(pose), false) = (&frame.pose, manual) {
            apply_pose(handle, puppet, entity, frame.playback_mode, pose, ctx, collab);
        }

        let mut look_at = None;
        if let Some(action) = &frame.action {
            look_at = apply_action(handle, puppet, entity, action, ctx, collab, stats);
        }

        if !handle.native_visibility {
            collab.visibility.hide_from_all_except(entity, &ctx.viewer.id);
            collab.visibility.show_to(entity, &ctx.viewer.id);
        }

        look_at
    }

    fn face(
        &mut self,
        actor_id: &str,
        target: &LookAtTarget,
        ctx: &ActorTickContext<'_>,
        collab: &mut Collaborators,
    ) {
        let Some(target_pos) = resolve_look_at(target, collab.host.as_ref(), self, ctx.models, ctx.viewer)
        else {
            debug!("Actor '{}' look-at target unresolved", actor_id);
            return;
        };
        let Some(handle) = self.handles.get_mut(actor_id) else {
            return;
        };
        let Some(entity) = handle.entity else {
            return;
        };
        let Some(current) = collab
            .host
            .entity_transform(entity)
            .or_else(|| handle.last_applied.clone())
        else {
            return;
        };

        let facing = current.facing(&target_pos);
        match collab.host.teleport_entity(entity, &facing) {
            Ok(()) => handle.last_applied = Some(facing),
            Err(e) => warn!("Actor '{}' look-at failed: {}", actor_id, e),
        }
    }

    /// Remove every puppet this session created.
    pub fn despawn_all(&mut self, collab: &mut Collaborators) {
        for handle in self.handles.values_mut() {
            despawn(handle, collab);
        }
        self.handles.clear();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Make sure the handle has a live puppet. At most one (re)spawn attempt per
/// call; returns `false` if the actor must be skipped this tick.
fn ensure_spawned(
    handle: &mut SessionActorHandle,
    frame: &ActorFrame,
    ctx: &ActorTickContext<'_>,
    collab: &mut Collaborators,
    stats: &mut SessionStats,
) -> bool {
    let alive = handle.puppet.and_then(|p| collab.puppets.world_entity(p));
    if handle.spawned {
        if let Some(entity) = alive {
            handle.entity = Some(entity);
            return true;
        }
        warn!(
            "Actor '{}' puppet became invalid; respawning",
            handle.actor_id
        );
        stats.puppet_respawns += 1;
    }

    if let Some(old) = handle.puppet.take() {
        collab.puppets.destroy(old);
    }
    handle.spawned = false;
    handle.entity = None;
    handle.last_applied = None;

    let Some(pose) = &frame.pose else {
        debug!(
            "Actor '{}' wants to spawn but has no pose yet",
            handle.actor_id
        );
        return false;
    };

    let Some(puppet) = collab
        .puppets
        .create(&frame.entity_kind, &frame.display_name)
    else {
        warn!("Puppet provider refused to create actor '{}'", handle.actor_id);
        return false;
    };
    if let Some(skin) = &frame.skin {
        collab.puppets.apply_skin(puppet, skin);
    }
    if !collab.puppets.spawn(puppet, &pose.transform) {
        warn!("Failed to spawn actor '{}'", handle.actor_id);
        collab.puppets.destroy(puppet);
        return false;
    }
    let Some(entity) = collab.puppets.world_entity(puppet) else {
        warn!("Actor '{}' spawned without a world entity", handle.actor_id);
        collab.puppets.destroy(puppet);
        return false;
    };

    handle.native_visibility = collab.puppets.restrict_visibility(puppet, &ctx.viewer.id);
    if (frame.scale - 1.0).abs() > f64::EPSILON && ctx.features.scale_attribute {
        if let Err(e) = collab.host.set_entity_scale(entity, frame.scale) {
            warn!("Actor '{}' scale not applied: {}", handle.actor_id, e);
        }
    }

    debug!("Spawned actor '{}' as {}", handle.actor_id, entity);
    handle.puppet = Some(puppet);
    handle.entity = Some(entity);
    handle.spawned = true;
    handle.last_applied = Some(pose.transform.clone());
    true
}

fn despawn(handle: &mut SessionActorHandle, collab: &mut Collaborators) {
    if let Some(puppet) = handle.puppet.take() {
        collab.puppets.destroy(puppet);
        debug!("Despawned actor '{}'", handle.actor_id);
    }
    handle.entity = None;
    handle.spawned = false;
    handle.last_applied = None;
}

fn apply_pose(
    handle: &mut SessionActorHandle,
    puppet: PuppetHandle,
    entity: EntityId,
    mode: PlaybackMode,
    pose: &ActorTransformTick,
    ctx: &ActorTickContext<'_>,
    collab: &mut Collaborators,
) {
    match mode {
        PlaybackMode::Exact => {
            if let Err(e) = collab.host.teleport_entity(entity, &pose.transform) {
                warn!("Actor '{}' pose not applied: {}", handle.actor_id, e);
                return;
            }
        }
        PlaybackMode::Walk => collab.puppets.set_move_destination(puppet, &pose.transform),
    }

    let mut flags = pose.flags;
    if !ctx.features.extended_poses {
        flags = PoseFlags {
            swimming: false,
            gliding: false,
            ..flags
        };
    }
    collab.puppets.set_pose_flags(puppet, flags);
    handle.last_applied = Some(pose.transform.clone());
}

/// Fire one tick's discrete action. Returns a look-at to resolve once all
/// actors have moved.
fn apply_action(
    handle: &mut SessionActorHandle,
    puppet: PuppetHandle,
    entity: EntityId,
    action: &ActorTickAction,
    ctx: &ActorTickContext<'_>,
    collab: &mut Collaborators,
    stats: &mut SessionStats,
) -> Option<LookAtTarget> {
    if let Some(skin) = &action.skin {
        collab.puppets.apply_skin(puppet, skin);
    }
    if let Some(scale) = action.scale {
        if ctx.features.scale_attribute {
            if let Err(e) = collab.host.set_entity_scale(entity, scale) {
                warn!("Actor '{}' scale override failed: {}", handle.actor_id, e);
                stats.skipped_effects += 1;
            }
        } else {
            debug!("Host has no scale attribute; ignoring scale for '{}'", handle.actor_id);
        }
    }
    if let Some(animation) = &action.animation {
        if !collab.puppets.play_animation(puppet, animation) {
            warn!(
                "Actor '{}' animation '{}' not played",
                handle.actor_id, animation
            );
            stats.skipped_effects += 1;
        }
    }
    if let Some(command) = &action.command {
        let text = collab.formatter.format(command, ctx.placeholders);
        let text = text.trim_start_matches('/');
        if let Err(e) = collab
            .host
            .dispatch_command(&CommandPrincipal::Console, text)
        {
            warn!("Actor '{}' command failed: {}", handle.actor_id, e);
            stats.skipped_effects += 1;
        }
    }

    if action.look_at.is_none() {
        None
    } else {
        Some(action.look_at.clone())
    }
}

/// World position of a look-at target right now.
pub(crate) fn resolve_look_at(
    target: &LookAtTarget,
    host: &dyn WorldHost,
    actors: &ActorPlayback,
    models: &HashMap<String, EntityId>,
    viewer: &ViewerInfo,
) -> Option<Vec3> {
    match target {
        LookAtTarget::None => None,
        LookAtTarget::Position { transform } => Some(transform.position),
        LookAtTarget::Entity { entity } => {
            let id = match entity {
                EntityRef::World(id) => Some(*id),
                EntityRef::Actor(actor) => actors.entity_of(actor),
                EntityRef::Model(name) => models.get(name).copied(),
                EntityRef::Viewer => return Some(viewer.transform.position),
            }?;
            host.entity_transform(id).map(|t| t.position)
        }
    }
}
