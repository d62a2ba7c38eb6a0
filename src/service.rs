//! CutsceneService – owns every active session and advances them one tick at
//! a time.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};

use crate::error::{CutsceneError, Result};
use crate::host::{CapabilityLog, Collaborators};
use crate::protocol::{PlaybackEvent, SessionStarted, SessionStopped, SessionTick};
use crate::scene::SharedScene;
use crate::session::{
    panic_message, SceneSession, SessionEnv, SessionOptions, SessionState, StopReason,
};
use crate::types::{HostFeatures, PlaybackConfig, ServiceStats, ViewerId};

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// Everything produced by a single [`CutsceneService::tick`] call.
///
/// Callers (typically [`PlaybackDriver`](crate::driver::PlaybackDriver))
/// forward these as [`PlaybackEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Service tick counter that produced this report.
    pub tick: u64,
    /// One entry per session that processed a tick.
    pub updates: Vec<SessionTick>,
    /// Sessions that ended this tick, plus any replaced since the last one.
    pub stopped: Vec<SessionStopped>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.stopped.is_empty()
    }

    pub fn into_events(self) -> impl Iterator<Item = PlaybackEvent> {
        self.updates
            .into_iter()
            .map(PlaybackEvent::Tick)
            .chain(self.stopped.into_iter().map(PlaybackEvent::Stopped))
    }
}

pub struct CutsceneService {
    config: PlaybackConfig,
    features: HostFeatures,
    collab: Collaborators,
    sessions: BTreeMap<ViewerId, SceneSession>,
    capabilities: CapabilityLog,
    /// Stop events not returned directly to a caller.
    pending_stops: Vec<SessionStopped>,
    tick_count: u64,
    sessions_started: u64,
    sessions_stopped: u64,
}

impl CutsceneService {
    pub fn new(config: PlaybackConfig, collab: Collaborators) -> Result<Self> {
        config.validate()?;
        let features = collab.host.features();
        info!(
            "Cutscene service ready (scale_attribute={}, extended_poses={})",
            features.scale_attribute, features.extended_poses
        );
        Ok(Self {
            config,
            features,
            collab,
            sessions: BTreeMap::new(),
            capabilities: CapabilityLog::default(),
            pending_stops: Vec::new(),
            tick_count: 0,
            sessions_started: 0,
            sessions_stopped: 0,
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn features(&self) -> HostFeatures {
        self.features
    }

    pub fn capabilities(&self) -> &CapabilityLog {
        &self.capabilities
    }

    // -----------------------------------------------------------------------
    // Session management
    // -----------------------------------------------------------------------

    /// Start playing `scene` for `viewer`. A session already running for the
    /// viewer is stopped first with reason `replaced`; its stop event is
    /// delivered with the next [`TickReport`].
    pub fn start(
        &mut self,
        viewer: &str,
        scene: SharedScene,
        options: SessionOptions,
    ) -> Result<SessionStarted> {
        if let Some(stopped) = self.stop(viewer, StopReason::Replaced) {
            self.pending_stops.push(stopped);
        }

        let limit = self.config.max_sessions;
        if limit > 0 && self.sessions.len() >= limit {
            return Err(CutsceneError::SessionLimit(limit));
        }

        let mut env = SessionEnv {
            config: &self.config,
            features: self.features,
            collab: &mut self.collab,
            capabilities: &mut self.capabilities,
        };
        let (session, started) = SceneSession::begin(viewer, scene, &options, &mut env)?;

        self.sessions.insert(viewer.to_string(), session);
        self.sessions_started += 1;
        Ok(started)
    }

    /// Stop the viewer's session, if any, and release everything it holds.
    pub fn stop(&mut self, viewer: &str, reason: StopReason) -> Option<SessionStopped> {
        let session = self.sessions.remove(viewer)?;
        let mut env = SessionEnv {
            config: &self.config,
            features: self.features,
            collab: &mut self.collab,
            capabilities: &mut self.capabilities,
        };
        let stopped = session.teardown(reason, &mut env);
        self.sessions_stopped += 1;
        Some(stopped)
    }

    /// The viewer left; cleanup skips everything that needs the viewer.
    pub fn disconnect(&mut self, viewer: &str) -> Option<SessionStopped> {
        self.stop(viewer, StopReason::Disconnected)
    }

    pub fn pause(&mut self, viewer: &str) -> Result<()> {
        let session = self
            .sessions
            .get_mut(viewer)
            .ok_or_else(|| CutsceneError::NoSession(viewer.to_string()))?;
        if session.pause() {
            info!(
                "Paused '{}' for {} at tick {}",
                session.scene_name(),
                viewer,
                session.current_tick()
            );
        }
        Ok(())
    }

    pub fn resume(&mut self, viewer: &str) -> Result<()> {
        let session = self
            .sessions
            .get_mut(viewer)
            .ok_or_else(|| CutsceneError::NoSession(viewer.to_string()))?;
        if session.resume() {
            info!(
                "Resumed '{}' for {} at tick {}",
                session.scene_name(),
                viewer,
                session.current_tick()
            );
        }
        Ok(())
    }

    /// Stop every session; used when the service itself goes away.
    pub fn shutdown(&mut self) -> Vec<SessionStopped> {
        let viewers: Vec<ViewerId> = self.sessions.keys().cloned().collect();
        if !viewers.is_empty() {
            info!("Shutting down {} active session(s)", viewers.len());
        }
        let mut stopped = std::mem::take(&mut self.pending_stops);
        stopped.extend(
            viewers
                .iter()
                .filter_map(|viewer| self.stop(viewer, StopReason::Shutdown)),
        );
        stopped
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Advance every playing session by one tick.
    ///
    /// A failing or panicking session is stopped on its own; the rest keep
    /// playing.
    pub fn tick(&mut self) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport {
            tick: self.tick_count,
            updates: Vec::new(),
            stopped: std::mem::take(&mut self.pending_stops),
        };

        let viewers: Vec<ViewerId> = self.sessions.keys().cloned().collect();
        for viewer in viewers {
            let Some(session) = self.sessions.get_mut(&viewer) else {
                continue;
            };
            if session.state() == SessionState::Paused {
                continue;
            }

            let mut env = SessionEnv {
                config: &self.config,
                features: self.features,
                collab: &mut self.collab,
                capabilities: &mut self.capabilities,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| session.tick(&mut env)));

            let reason = match outcome {
                Ok(Ok(step)) => {
                    report.updates.push(step.update);
                    if !step.finished {
                        continue;
                    }
                    debug!("{} reached the end of '{}'", viewer, session.scene_name());
                    StopReason::Finished
                }
                Ok(Err(CutsceneError::ViewerNotFound(_))) => {
                    warn!("{} is no longer present; aborting playback", viewer);
                    StopReason::ViewerMissing
                }
                Ok(Err(e)) => {
                    error!("Session for {} failed: {}", viewer, e);
                    StopReason::RuntimeException(e.to_string())
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Session for {} panicked: {}", viewer, message);
                    StopReason::RuntimeException(CutsceneError::Panic(message).to_string())
                }
            };

            if let Some(stopped) = self.stop(&viewer, reason) {
                report.stopped.push(stopped);
            }
        }

        report
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn session(&self, viewer: &str) -> Option<&SceneSession> {
        self.sessions.get(viewer)
    }

    pub fn active_viewers(&self) -> Vec<ViewerId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.sessions.is_empty() && self.pending_stops.is_empty()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            active_sessions: self.sessions.len(),
            paused_sessions: self
                .sessions
                .values()
                .filter(|s| s.state() == SessionState::Paused)
                .count(),
            sessions_started: self.sessions_started,
            sessions_stopped: self.sessions_stopped,
            total_ticks: self.tick_count,
        }
    }
}
