//! One viewer watching one scene.
//!
//! A [`SceneSession`] is created by [`CutsceneService::start`], advanced by
//! [`CutsceneService::tick`] and consumed by [`SceneSession::teardown`].
//! Every tick, in order:
//!
//! 1. viewer presence check
//! 2. observation lock re-assertion (with recovery cooldown)
//! 3. actor playback
//! 4. camera rig + proxy visibility
//! 5. keyframe dispatch for exactly this tick
//! 6. actionbar refresh/expiry
//! 7. advance, or finish at the end tick
//!
//! [`CutsceneService::start`]: crate::service::CutsceneService::start
//! [`CutsceneService::tick`]: crate::service::CutsceneService::tick

use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};

use crate::actor_playback::{resolve_look_at, ActorFrame, ActorPlayback, ActorTickContext};
use crate::camera::{interpolate, CameraRig, RigParams};
use crate::error::{CutsceneError, Result};
use crate::host::{
    CapabilityLog, Collaborators, CommandPrincipal, MovementMode, ViewerInfo, ViewerSnapshot,
};
use crate::keyframe::{
    ActionbarKey, CameraKey, CommandExecutor, CommandKey, Keyframe, KeyframeEvent, ModelAction,
    ModelKey,
};
use crate::placeholder::Placeholders;
use crate::protocol::{SessionStarted, SessionStopped, SessionTick};
use crate::scene::{EndAction, ModelEntry, SharedScene};
use crate::smoothing::{SmoothingMode, SmoothingQuality};
use crate::transform::Transform;
use crate::types::{EntityId, HostFeatures, PlaybackConfig, SessionStats, ViewerId};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Playing,
    Paused,
}

/// Why a session reached STOPPED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    Stopped,
    ViewerMissing,
    Disconnected,
    RuntimeException(String),
    /// A new session was started for the same viewer.
    Replaced,
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Finished => "finished",
            StopReason::Stopped => "stopped",
            StopReason::ViewerMissing => "viewer_missing",
            StopReason::Disconnected => "disconnected",
            StopReason::RuntimeException(_) => "runtime_exception",
            StopReason::Replaced => "replaced",
            StopReason::Shutdown => "shutdown",
        }
    }

    fn viewer_gone(&self) -> bool {
        matches!(self, StopReason::ViewerMissing | StopReason::Disconnected)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::RuntimeException(detail) => write!(f, "runtime_exception ({})", detail),
            other => f.write_str(other.as_str()),
        }
    }
}

/// How the viewer's view is pinned to the camera proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    PacketCamera,
    NativeSpectator,
}

impl LockBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockBackend::PacketCamera => "packet_camera",
            LockBackend::NativeSpectator => "native_spectator",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub preview: bool,
    pub start_tick: u64,
    /// Defaults to the scene duration; always capped by it.
    pub end_tick: Option<u64>,
}

impl SessionOptions {
    pub fn preview() -> Self {
        Self {
            preview: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveActionbar {
    text: String,
    /// First tick on which the text is no longer shown.
    expires_at: u64,
}

/// Outcome of one processed tick.
#[derive(Debug, Clone)]
pub(crate) struct TickStep {
    pub update: SessionTick,
    pub finished: bool,
}

/// Services a session borrows from its owner for one call.
pub(crate) struct SessionEnv<'a> {
    pub config: &'a PlaybackConfig,
    pub features: HostFeatures,
    pub collab: &'a mut Collaborators,
    pub capabilities: &'a mut CapabilityLog,
}

/// Everything one tick reads from the shared scene, copied under a short
/// read lock.
struct SceneFrame {
    name: String,
    duration: u64,
    default_smoothing: SmoothingMode,
    quality: SmoothingQuality,
    camera: Vec<Keyframe<CameraKey>>,
    actors: Vec<ActorFrame>,
    events: Vec<KeyframeEvent>,
    model_entries: HashMap<String, ModelEntry>,
}

// ---------------------------------------------------------------------------
// SceneSession
// ---------------------------------------------------------------------------

pub struct SceneSession {
    viewer: ViewerId,
    scene: SharedScene,
    scene_name: String,
    snapshot: ViewerSnapshot,
    start_tick: u64,
    tick: u64,
    end_tick: u64,
    state: SessionState,
    preview: bool,
    owned_entities: BTreeSet<EntityId>,
    rig: CameraRig,
    actors: ActorPlayback,
    actionbar: Option<ActiveActionbar>,
    last_recovery_tick: Option<u64>,
    model_refs: HashMap<String, EntityId>,
    lock: LockBackend,
    stats: SessionStats,
}

impl SceneSession {
    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    /// Snapshot the viewer, spawn the proxy and lock the view. On failure
    /// everything done so far is rolled back.
    pub(crate) fn begin(
        viewer: &str,
        scene: SharedScene,
        options: &SessionOptions,
        env: &mut SessionEnv<'_>,
    ) -> Result<(SceneSession, SessionStarted)> {
        let host = &mut env.collab.host;
        if host.viewer(viewer).is_none() {
            return Err(CutsceneError::ViewerNotFound(viewer.to_string()));
        }

        let (scene_name, end_tick, initial) = {
            let s = scene.read();
            let duration = s.duration_ticks;
            let end = options.end_tick.unwrap_or(duration).min(duration);
            if options.start_tick > end {
                return Err(CutsceneError::InvalidRange {
                    start: options.start_tick,
                    end,
                    duration,
                });
            }
            let camera = s.camera.snapshot();
            let initial = interpolate(
                &camera,
                options.start_tick as f64,
                s.default_smoothing,
                s.quality.uses_spline(),
            )
            .ok_or_else(|| CutsceneError::NoCameraKeyframes(s.name().to_string()))?;
            (s.name().to_string(), end, initial.transform)
        };

        let snapshot = host.capture_viewer(viewer)?;
        let proxy = host.spawn_camera_proxy(&initial)?;

        let mut session = SceneSession {
            viewer: viewer.to_string(),
            scene,
            scene_name,
            snapshot,
            start_tick: options.start_tick,
            tick: options.start_tick,
            end_tick,
            state: SessionState::Playing,
            preview: options.preview,
            owned_entities: BTreeSet::from([proxy]),
            rig: CameraRig::new(proxy),
            actors: ActorPlayback::new(),
            actionbar: None,
            last_recovery_tick: None,
            model_refs: HashMap::new(),
            lock: LockBackend::NativeSpectator,
            stats: SessionStats::default(),
        };

        if let Err(e) = session.engage(&initial, env) {
            warn!(
                "Could not start '{}' for {}: {}; rolling back",
                session.scene_name, session.viewer, e
            );
            session.teardown(StopReason::Stopped, env);
            return Err(e);
        }

        info!(
            "Started scene '{}' for {} (ticks {}..={}, {}, preview={})",
            session.scene_name,
            session.viewer,
            session.tick,
            session.end_tick,
            session.lock.as_str(),
            session.preview
        );

        let started = SessionStarted {
            viewer: session.viewer.clone(),
            scene: session.scene_name.clone(),
            preview: session.preview,
            start_tick: session.tick,
            end_tick: session.end_tick,
            lock_backend: session.lock.as_str().to_string(),
        };
        Ok((session, started))
    }

    fn engage(&mut self, initial: &Transform, env: &mut SessionEnv<'_>) -> Result<()> {
        let proxy = self.rig.proxy();
        let collab = &mut *env.collab;

        collab.visibility.hide_from_all_except(proxy, &self.viewer);
        collab.visibility.show_to(proxy, &self.viewer);

        collab
            .host
            .set_movement_mode(&self.viewer, MovementMode::Spectator)?;
        collab.host.teleport_viewer(&self.viewer, initial)?;

        self.lock = if collab.camera_protocol.is_available() {
            collab.camera_protocol.apply_locked_view(&self.viewer, proxy)?;
            LockBackend::PacketCamera
        } else {
            env.capabilities.note_missing(
                "packet_camera",
                "packet camera integration unavailable; using native spectator mode",
            );
            collab.host.set_spectator_target(&self.viewer, Some(proxy))?;
            LockBackend::NativeSpectator
        };

        if let Some(item) = &env.config.camera_head_item {
            collab.host.set_head_item(&self.viewer, Some(item))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    /// Next tick to be processed.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn start_tick(&self) -> u64 {
        self.start_tick
    }

    pub fn end_tick(&self) -> u64 {
        self.end_tick
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn camera_proxy(&self) -> EntityId {
        self.rig.proxy()
    }

    pub fn camera_transform(&self) -> Option<&Transform> {
        self.rig.last_transform()
    }

    pub fn lock_backend(&self) -> LockBackend {
        self.lock
    }

    pub fn snapshot(&self) -> &ViewerSnapshot {
        &self.snapshot
    }

    pub fn actors(&self) -> &ActorPlayback {
        &self.actors
    }

    pub fn model_entity(&self, entity_ref: &str) -> Option<EntityId> {
        self.model_refs.get(entity_ref).copied()
    }

    pub fn owned_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.owned_entities.iter().copied()
    }

    pub fn actionbar_text(&self) -> Option<&str> {
        self.actionbar.as_ref().map(|a| a.text.as_str())
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    /// Returns `false` if already paused.
    pub(crate) fn pause(&mut self) -> bool {
        if self.state == SessionState::Paused {
            return false;
        }
        self.state = SessionState::Paused;
        true
    }

    pub(crate) fn resume(&mut self) -> bool {
        if self.state == SessionState::Playing {
            return false;
        }
        self.state = SessionState::Playing;
        true
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub(crate) fn tick(&mut self, env: &mut SessionEnv<'_>) -> Result<TickStep> {
        let tick = self.tick;
        let viewer = env
            .collab
            .host
            .viewer(&self.viewer)
            .ok_or_else(|| CutsceneError::ViewerNotFound(self.viewer.clone()))?;

        self.reassert_lock(tick, env)?;

        let frame = self.capture_frame(tick);
        let placeholders = Placeholders::for_tick(&viewer, &frame.name, tick, frame.duration);

        // Actors
        {
            let ctx = ActorTickContext {
                viewer: &viewer,
                tick,
                features: env.features,
                placeholders: &placeholders,
                models: &self.model_refs,
            };
            self.actors.tick(
                &frame.actors,
                &ctx,
                env.collab,
                env.capabilities,
                &mut self.stats,
            );
        }

        // Camera
        let camera = self.drive_camera(&frame, tick, &viewer, env)?;

        // Keyframes scheduled exactly now
        let dispatched = frame.events.len();
        for event in &frame.events {
            self.dispatch(event, &frame, &viewer, &placeholders, env);
        }
        self.stats.keyframes_dispatched += dispatched as u64;

        self.refresh_actionbar(tick, env);

        self.stats.ticks_processed += 1;
        let update = SessionTick {
            viewer: self.viewer.clone(),
            tick,
            camera,
            dispatched,
            actors_spawned: self.actors.handles().filter(|h| h.spawned).count(),
        };

        let finished = tick >= self.end_tick;
        if !finished {
            self.tick += 1;
        }
        Ok(TickStep { update, finished })
    }

    fn capture_frame(&self, tick: u64) -> SceneFrame {
        let scene = self.scene.read();
        let events = scene.keyframes_at(tick);
        let model_entries = events
            .iter()
            .filter_map(|e| match e {
                KeyframeEvent::Model(k) => scene
                    .model_library
                    .get(&k.payload.model_id)
                    .map(|entry| (k.payload.model_id.clone(), entry.clone())),
                _ => None,
            })
            .collect();

        SceneFrame {
            name: scene.name().to_string(),
            duration: scene.duration_ticks,
            default_smoothing: scene.default_smoothing,
            quality: scene.quality,
            camera: scene.camera.snapshot(),
            actors: scene
                .actors
                .values()
                .map(|t| ActorFrame::capture(t, tick, self.preview))
                .collect(),
            events,
            model_entries,
        }
    }

    /// Put the viewer back on the proxy if the lock drifted, at most once
    /// per cooldown window.
    fn reassert_lock(&mut self, tick: u64, env: &mut SessionEnv<'_>) -> Result<()> {
        let proxy = self.rig.proxy();
        let collab = &mut *env.collab;

        if self.lock == LockBackend::PacketCamera && !collab.camera_protocol.is_available() {
            env.capabilities.note_missing(
                "packet_camera",
                "packet camera integration went away; using native spectator mode",
            );
            self.lock = LockBackend::NativeSpectator;
        }

        let current = match self.lock {
            LockBackend::PacketCamera => collab.camera_protocol.locked_target(&self.viewer),
            LockBackend::NativeSpectator => collab.host.spectator_target(&self.viewer),
        };
        if current == Some(proxy) {
            return Ok(());
        }

        self.stats.lock_drift_ticks += 1;
        let cooldown = env.config.recovery_cooldown_ticks;
        let ready = self
            .last_recovery_tick
            .is_none_or(|last| tick >= last.saturating_add(cooldown));
        if !ready {
            debug!(
                "{} lock drifted at tick {}; waiting for recovery cooldown",
                self.viewer, tick
            );
            return Ok(());
        }

        warn!(
            "{} observation lock drifted (target {:?}); recovering at tick {}",
            self.viewer, current, tick
        );
        let at = self
            .rig
            .last_transform()
            .cloned()
            .or_else(|| collab.host.entity_transform(proxy));
        if let Some(at) = at {
            collab.host.teleport_viewer(&self.viewer, &at)?;
        }
        match self.lock {
            LockBackend::PacketCamera => collab.camera_protocol.apply_locked_view(&self.viewer, proxy)?,
            LockBackend::NativeSpectator => {
                collab
                    .host
                    .set_movement_mode(&self.viewer, MovementMode::Spectator)?;
                collab.host.set_spectator_target(&self.viewer, Some(proxy))?;
            }
        }
        self.last_recovery_tick = Some(tick);
        self.stats.forced_recoveries += 1;
        Ok(())
    }

    fn drive_camera(
        &mut self,
        frame: &SceneFrame,
        tick: u64,
        viewer: &ViewerInfo,
        env: &mut SessionEnv<'_>,
    ) -> Result<Option<Transform>> {
        let params = RigParams {
            scene_default: frame.default_smoothing,
            quality: frame.quality,
            damping: env.config.look_at_damping,
            look_ahead: env.config.look_ahead_ticks,
        };

        let collab = &mut *env.collab;
        let transform = {
            let host = collab.host.as_ref();
            let actors = &self.actors;
            let models = &self.model_refs;
            self.rig.advance(&frame.camera, tick, &params, |target| {
                resolve_look_at(target, host, actors, models, viewer)
            })
        };

        let proxy = self.rig.proxy();
        if let Some(transform) = &transform {
            collab.host.teleport_entity(proxy, transform)?;
        }
        collab.visibility.hide_from_all_except(proxy, &self.viewer);
        collab.visibility.show_to(proxy, &self.viewer);
        Ok(transform)
    }

    // -----------------------------------------------------------------------
    // Keyframe dispatch
    // -----------------------------------------------------------------------

    fn dispatch(
        &mut self,
        event: &KeyframeEvent,
        frame: &SceneFrame,
        viewer: &ViewerInfo,
        placeholders: &Placeholders,
        env: &mut SessionEnv<'_>,
    ) {
        let outcome = match event {
            // The rig already sampled this keyframe.
            KeyframeEvent::Camera(_) => Ok(()),
            KeyframeEvent::Command(k) => {
                self.run_commands(&k.payload, placeholders, env);
                Ok(())
            }
            KeyframeEvent::Actionbar(k) => {
                self.show_actionbar(&k.payload, k.time, placeholders, env);
                Ok(())
            }
            KeyframeEvent::Model(k) => self.apply_model(&k.payload, frame, viewer, env),
            KeyframeEvent::Particle(k) => env.collab.host.play_particle(&self.viewer, &k.payload),
            KeyframeEvent::Sound(k) => env.collab.host.play_sound(&self.viewer, &k.payload),
            KeyframeEvent::BlockIllusion(k) => env
                .collab
                .host
                .show_block_illusion(&self.viewer, &k.payload),
        };

        if let Err(e) = outcome {
            warn!(
                "Skipping {} keyframe {} in '{}': {}",
                event.kind(),
                event.id(),
                self.scene_name,
                e
            );
            self.stats.skipped_effects += 1;
        }
    }

    fn run_commands(
        &mut self,
        key: &CommandKey,
        placeholders: &Placeholders,
        env: &mut SessionEnv<'_>,
    ) {
        let principal = match key.executor {
            CommandExecutor::Viewer => CommandPrincipal::Viewer(self.viewer.clone()),
            CommandExecutor::ViewerElevated => CommandPrincipal::ElevatedViewer(self.viewer.clone()),
            CommandExecutor::Console => CommandPrincipal::Console,
        };

        for raw in &key.commands {
            if !key.allow_global && has_global_selector(raw) {
                warn!(
                    "Skipping command with global selector in '{}': {}",
                    self.scene_name, raw
                );
                self.stats.skipped_effects += 1;
                continue;
            }
            let text = env.collab.formatter.format(raw, placeholders);
            let text = text.trim_start_matches('/');
            if text.trim().is_empty() {
                continue;
            }
            if let Err(e) = env.collab.host.dispatch_command(&principal, text) {
                warn!("Command '{}' failed: {}", text, e);
                self.stats.skipped_effects += 1;
            }
        }
    }

    fn show_actionbar(
        &mut self,
        key: &ActionbarKey,
        at: u64,
        placeholders: &Placeholders,
        env: &mut SessionEnv<'_>,
    ) {
        let text = env.collab.formatter.format(&key.text, placeholders);
        self.actionbar = Some(ActiveActionbar {
            text,
            expires_at: at.saturating_add(key.duration_ticks.max(1)),
        });
    }

    fn refresh_actionbar(&mut self, tick: u64, env: &mut SessionEnv<'_>) {
        let Some(bar) = &self.actionbar else {
            return;
        };
        if tick >= bar.expires_at {
            env.collab.host.send_actionbar(&self.viewer, "");
            self.actionbar = None;
        } else {
            env.collab.host.send_actionbar(&self.viewer, &bar.text);
        }
    }

    fn apply_model(
        &mut self,
        key: &ModelKey,
        frame: &SceneFrame,
        viewer: &ViewerInfo,
        env: &mut SessionEnv<'_>,
    ) -> Result<()> {
        let collab = &mut *env.collab;
        if !collab.models.is_available() {
            env.capabilities
                .note_missing("models", "model provider unavailable; model keyframes ignored");
            return Ok(());
        }

        match key.action {
            ModelAction::Spawn => {
                let entry = frame.model_entries.get(&key.model_id).ok_or_else(|| {
                    CutsceneError::UnknownEffect {
                        kind: "model",
                        id: key.model_id.clone(),
                    }
                })?;
                if let Some(old) = self.model_refs.remove(&key.entity_ref) {
                    self.owned_entities.remove(&old);
                    collab.host.remove_entity(old)?;
                }
                let at = key
                    .spawn_transform
                    .clone()
                    .or_else(|| self.rig.last_transform().cloned())
                    .unwrap_or_else(|| viewer.transform.clone());
                let entity = collab.models.spawn_model(entry, &at)?;
                self.owned_entities.insert(entity);
                self.model_refs.insert(key.entity_ref.clone(), entity);
                collab.visibility.hide_from_all_except(entity, &self.viewer);
                collab.visibility.show_to(entity, &self.viewer);

                let animation = key
                    .animation_id
                    .as_ref()
                    .or(entry.default_animation.as_ref());
                if let Some(animation) = animation {
                    collab
                        .models
                        .play_animation(entity, animation, key.looped, key.speed)?;
                }
                debug!("Spawned model '{}' as {}", key.entity_ref, entity);
                Ok(())
            }
            ModelAction::Animate => {
                let entity = self.model_ref(&key.entity_ref)?;
                let animation = key.animation_id.as_ref().ok_or_else(|| {
                    CutsceneError::UnknownEffect {
                        kind: "animation",
                        id: key.entity_ref.clone(),
                    }
                })?;
                collab
                    .models
                    .play_animation(entity, animation, key.looped, key.speed)
            }
            ModelAction::Stop => {
                let entity = self.model_ref(&key.entity_ref)?;
                collab.models.stop_animation(entity)
            }
            ModelAction::Despawn => {
                let entity = self.model_ref(&key.entity_ref)?;
                self.model_refs.remove(&key.entity_ref);
                self.owned_entities.remove(&entity);
                collab.host.remove_entity(entity)
            }
        }
    }

    fn model_ref(&self, entity_ref: &str) -> Result<EntityId> {
        self.model_refs
            .get(entity_ref)
            .copied()
            .ok_or_else(|| CutsceneError::UnknownEffect {
                kind: "model reference",
                id: entity_ref.to_string(),
            })
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Release the viewer and every entity this session owns. Each step is
    /// attempted even if earlier ones fail or panic.
    pub(crate) fn teardown(mut self, reason: StopReason, env: &mut SessionEnv<'_>) -> SessionStopped {
        let viewer = self.viewer.clone();
        let collab = &mut *env.collab;
        let viewer_present = !reason.viewer_gone() && collab.host.viewer(&viewer).is_some();

        if viewer_present {
            let lock = self.lock;
            best_effort("release view lock", || {
                match lock {
                    LockBackend::PacketCamera => collab.camera_protocol.clear_locked_view(&viewer),
                    LockBackend::NativeSpectator => {
                        collab.host.set_spectator_target(&viewer, None)?
                    }
                }
                Ok(())
            });
            if self.actionbar.take().is_some() {
                best_effort("clear actionbar", || {
                    collab.host.send_actionbar(&viewer, "");
                    Ok(())
                });
            }
            best_effort("restore viewer state", || {
                collab.host.restore_viewer(&viewer, &self.snapshot)
            });

            let end_action = if reason == StopReason::Finished {
                self.scene.read().end_action.clone()
            } else {
                EndAction::Restore
            };
            let destination = match end_action {
                EndAction::Restore => self.snapshot.location.clone(),
                EndAction::StayAtCamera => self
                    .rig
                    .last_transform()
                    .cloned()
                    .unwrap_or_else(|| self.snapshot.location.clone()),
                EndAction::Teleport { transform } => transform,
            };
            best_effort("return viewer", || {
                collab.host.teleport_viewer(&viewer, &destination)
            });
        } else {
            debug!("{} is gone; skipping viewer restoration", viewer);
        }

        let actors = &mut self.actors;
        best_effort("despawn actors", || {
            actors.despawn_all(collab);
            Ok(())
        });

        self.model_refs.clear();
        let proxy = self.rig.proxy();
        let mut owned = std::mem::take(&mut self.owned_entities);
        owned.remove(&proxy);
        for entity in owned {
            best_effort("remove session entity", || collab.host.remove_entity(entity));
        }
        best_effort("remove camera proxy", || collab.host.remove_entity(proxy));

        info!(
            "Stopped scene '{}' for {} at tick {}: {}",
            self.scene_name, viewer, self.tick, reason
        );

        let detail = match &reason {
            StopReason::RuntimeException(detail) => Some(detail.clone()),
            _ => None,
        };
        SessionStopped {
            viewer,
            scene: self.scene_name.clone(),
            reason: reason.as_str().to_string(),
            detail,
            final_tick: self.tick,
            preview: self.preview,
            resume_editor: self.preview,
            stats: self.stats.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn has_global_selector(command: &str) -> bool {
    ["@a", "@e", "@r"].iter().any(|s| command.contains(s))
}

/// Run a cleanup step, logging (not propagating) errors and panics.
fn best_effort<F>(step: &str, f: F)
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Cleanup step '{}' failed: {}", step, e),
        Err(payload) => warn!(
            "Cleanup step '{}' panicked: {}",
            step,
            panic_message(payload.as_ref())
        ),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
