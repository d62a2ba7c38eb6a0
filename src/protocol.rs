//! `cutscene.*` events emitted by the playback service.
//!
//! Everything a consumer (authoring layer, telemetry, a self-test harness)
//! learns about sessions crosses this boundary.
//!
//! ## Subjects
//!
//! | Subject                       | Payload            | When                         |
//! |-------------------------------|--------------------|------------------------------|
//! | `cutscene.session.started`    | [`SessionStarted`] | a session begins playing     |
//! | `cutscene.session.tick`       | [`SessionTick`]    | every processed tick         |
//! | `cutscene.session.stopped`    | [`SessionStopped`] | a session ends, any reason   |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Every event carries the viewer id and the scene tick it refers to.
//! 3. Collaborator handles (puppets, proxies) never leak out.

use serde::{Deserialize, Serialize};

use crate::transform::Transform;
use crate::types::{SessionStats, ViewerId};

pub mod subjects {
    pub const SESSION_STARTED: &str = "cutscene.session.started";
    pub const SESSION_TICK: &str = "cutscene.session.tick";
    pub const SESSION_STOPPED: &str = "cutscene.session.stopped";
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStarted {
    pub viewer: ViewerId,
    pub scene: String,
    pub preview: bool,
    pub start_tick: u64,
    pub end_tick: u64,
    /// `packet_camera` or `native_spectator`.
    pub lock_backend: String,
}

/// One processed tick of one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTick {
    pub viewer: ViewerId,
    pub tick: u64,
    /// Camera transform applied to the proxy this tick.
    pub camera: Option<Transform>,
    /// Keyframes dispatched this tick (all kinds).
    pub dispatched: usize,
    pub actors_spawned: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStopped {
    pub viewer: ViewerId,
    pub scene: String,
    /// `finished`, `stopped`, `viewer_missing`, `disconnected`,
    /// `runtime_exception`, `replaced` or `shutdown`.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub final_tick: u64,
    pub preview: bool,
    /// The authoring layer should take its own view back.
    pub resume_editor: bool,
    pub stats: SessionStats,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Started(SessionStarted),
    Tick(SessionTick),
    Stopped(SessionStopped),
}

impl PlaybackEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            PlaybackEvent::Started(_) => subjects::SESSION_STARTED,
            PlaybackEvent::Tick(_) => subjects::SESSION_TICK,
            PlaybackEvent::Stopped(_) => subjects::SESSION_STOPPED,
        }
    }

    pub fn viewer(&self) -> &str {
        match self {
            PlaybackEvent::Started(e) => &e.viewer,
            PlaybackEvent::Tick(e) => &e.viewer,
            PlaybackEvent::Stopped(e) => &e.viewer,
        }
    }
}
