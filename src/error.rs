//! Error types shared by the playback engine.
//!
//! Every fallible library call returns [`Result<T>`]. Errors are always
//! session-scoped: the service turns them into a stop reason for the one
//! session that raised them and keeps ticking everyone else.

use thiserror::Error;

use crate::types::{EntityId, ViewerId};

#[derive(Error, Debug)]
pub enum CutsceneError {
    /// The viewer is not connected (or was never known to the host).
    #[error("viewer not found: {0}")]
    ViewerNotFound(ViewerId),

    /// No playback session exists for this viewer.
    #[error("no active session for viewer {0}")]
    NoSession(ViewerId),

    /// The scene has no camera keyframes to drive the proxy with.
    #[error("scene '{0}' has no camera keyframes")]
    NoCameraKeyframes(String),

    /// Requested start/end ticks do not fit the scene timeline.
    #[error("invalid tick range {start}..{end} for scene of {duration} ticks")]
    InvalidRange { start: u64, end: u64, duration: u64 },

    /// The configured session cap is reached.
    #[error("session limit reached ({0})")]
    SessionLimit(usize),

    /// A world entity referenced by id no longer exists.
    #[error("entity {0} does not exist")]
    EntityMissing(EntityId),

    /// A scene references a model, particle, sound or block id the host rejects.
    #[error("unknown {kind} '{id}'")]
    UnknownEffect { kind: &'static str, id: String },

    /// The host refused an operation (spawn, teleport, mode change …).
    #[error("host rejected {operation}: {reason}")]
    Host {
        operation: &'static str,
        reason: String,
    },

    /// A panic escaped a session tick.
    #[error("panic during tick: {0}")]
    Panic(String),

    /// Configuration could not be loaded or is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CutsceneError {
    pub fn host(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Host {
            operation,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CutsceneError>;
