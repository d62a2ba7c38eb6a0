//! Identifiers, configuration and stats shared across all modules.

use serde::{Deserialize, Serialize};

use crate::error::{CutsceneError, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Viewers are identified the way the host identifies connected players.
pub type ViewerId = String;

/// A live world entity. Handles hold this id, never the entity itself.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle issued by a [`PuppetProvider`](crate::host::PuppetProvider).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PuppetHandle(pub u64);

// ---------------------------------------------------------------------------
// Host features
// ---------------------------------------------------------------------------

/// Capabilities of the running world version, probed once when the service
/// is built and read-only afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFeatures {
    /// Entities expose a scale attribute (actor scale overrides).
    pub scale_attribute: bool,
    /// Swim/glide poses can be forced on puppets.
    pub extended_poses: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Rate of the external tick source in Hz.
    pub tick_rate_hz: f32,
    /// Minimum ticks between two forced observation-lock recoveries.
    pub recovery_cooldown_ticks: u64,
    /// Fraction of the remaining look-at angle closed per tick (0, 1].
    pub look_at_damping: f32,
    /// Overrides the look-ahead distance of the scene's quality preset.
    pub look_ahead_ticks: Option<f64>,
    /// Cosmetic head item put on viewers while they watch.
    pub camera_head_item: Option<String>,
    /// Maximum concurrent sessions (0 = unlimited).
    pub max_sessions: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            recovery_cooldown_ticks: 20,
            look_at_damping: 0.35,
            look_ahead_ticks: None,
            camera_head_item: Some("minecraft:carved_pumpkin".into()),
            max_sessions: 0,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_rate_hz > 0.0) {
            return Err(CutsceneError::Config(format!(
                "tick_rate_hz must be positive, got {}",
                self.tick_rate_hz
            )));
        }
        if !(self.look_at_damping > 0.0 && self.look_at_damping <= 1.0) {
            return Err(CutsceneError::Config(format!(
                "look_at_damping must be in (0, 1], got {}",
                self.look_at_damping
            )));
        }
        if let Some(ahead) = self.look_ahead_ticks {
            if ahead < 0.0 {
                return Err(CutsceneError::Config(format!(
                    "look_ahead_ticks must not be negative, got {}",
                    ahead
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Per-session counters, useful to self-test harnesses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks_processed: u64,
    pub keyframes_dispatched: u64,
    /// Ticks on which the observation lock was found detached.
    pub lock_drift_ticks: u64,
    /// Forced lock recoveries (each one teleports the viewer).
    pub forced_recoveries: u64,
    pub skipped_effects: u64,
    pub puppet_respawns: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_sessions: usize,
    pub paused_sessions: usize,
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub total_ticks: u64,
}
