//! Cutscene World
//!
//! Per-viewer cutscene playback for a live multiplayer world: a scripted
//! camera path, recorded actor puppets and timed effects, shown to one viewer
//! at a time while everyone else keeps playing.
//!
//! ## Architecture
//!
//! ```text
//! PlaybackDriver  (driver.rs)            ← fixed-rate tokio loop
//!   └── CutsceneService  (service.rs)    ← sessions by viewer, failure isolation
//!         └── SceneSession  (session.rs) ← lock, dispatch, teardown
//!               ├── CameraRig     (camera.rs)         ← spline + easing + look-at
//!               ├── ActorPlayback (actor_playback.rs) ← step-held puppet poses
//!               └── SharedScene   (scene.rs)          ← tracks, actors, models
//! ```
//!
//! Everything the engine does to the world goes through the traits in
//! [`host`]. [`headless::HeadlessWorld`] implements all of them in memory.

// Data model and playback core are always available (no server feature needed).
pub mod actor;
pub mod actor_playback;
pub mod camera;
pub mod error;
pub mod headless;
pub mod host;
pub mod keyframe;
pub mod placeholder;
pub mod protocol;
pub mod scene;
pub mod service;
pub mod session;
pub mod smoothing;
pub mod track;
pub mod transform;
pub mod types;

// The fixed-rate driver requires the `server` feature.
#[cfg(feature = "server")]
pub mod driver;

// Convenience re-exports
#[cfg(feature = "server")]
pub use driver::{DriverConfig, PlaybackDriver};
pub use error::{CutsceneError, Result};
pub use host::Collaborators;
pub use protocol::PlaybackEvent;
pub use scene::{Scene, SharedScene};
pub use service::{CutsceneService, TickReport};
pub use session::{SessionOptions, SessionState, StopReason};
pub use transform::{Transform, Vec3};
pub use types::{EntityId, PlaybackConfig, ServiceStats, SessionStats, ViewerId};
