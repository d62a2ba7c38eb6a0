//! Camera interpolation: keyframe track + fractional tick → camera transform.
//!
//! [`interpolate`] is the stateless core (bracket, ease, blend). [`CameraRig`]
//! wraps it with the per-session state needed for look-at damping and
//! sub-sampling, and owns the id of the proxy entity the viewer rides.

use crate::keyframe::{CameraKey, Keyframe, LookAtTarget};
use crate::smoothing::{catmull_rom, SmoothingMode, SmoothingQuality};
use crate::transform::{clamp_pitch, lerp_angle, look_angles, Transform, Vec3};
use crate::types::EntityId;

/// Result of sampling the camera track at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSample {
    pub transform: Transform,
    /// Look-at of the keyframe that is active (the one at or before `t`).
    pub look_at: LookAtTarget,
}

/// Sample `keys` (sorted by time) at fractional tick `t`.
///
/// Exact keyframe ticks return that keyframe's transform unchanged, and
/// instant keyframes hold until the next one. Before the first and after
/// the last keyframe the edge keyframe is held.
pub fn interpolate(
    keys: &[Keyframe<CameraKey>],
    t: f64,
    scene_default: SmoothingMode,
    spline: bool,
) -> Option<CameraSample> {
    if keys.is_empty() {
        return None;
    }
    let last = keys.len() - 1;

    let prev_idx = keys
        .iter()
        .rposition(|k| k.time as f64 <= t)
        .unwrap_or(0);
    let next_idx = keys
        .iter()
        .position(|k| k.time as f64 >= t)
        .unwrap_or(last);

    let prev = &keys[prev_idx];
    let next = &keys[next_idx];
    let hold = || CameraSample {
        transform: prev.payload.transform.clone(),
        look_at: prev.payload.look_at.clone(),
    };

    if prev_idx == next_idx {
        return Some(hold());
    }
    let Some(easing) = prev.payload.effective_smoothing(scene_default).easing() else {
        return Some(hold());
    };

    let span = (next.time.saturating_sub(prev.time)).max(1) as f64;
    let u = ((t - prev.time as f64) / span).clamp(0.0, 1.0);
    let eased = easing.apply(u);
    if eased <= 0.0 {
        return Some(hold());
    }
    if eased >= 1.0 {
        return Some(CameraSample {
            transform: next.payload.transform.clone(),
            look_at: prev.payload.look_at.clone(),
        });
    }

    let a = &prev.payload.transform;
    let b = &next.payload.transform;

    let has_neighbors = prev_idx > 0 && next_idx < last && next_idx == prev_idx + 1;
    let position = if spline && has_neighbors {
        catmull_rom(
            &keys[prev_idx - 1].payload.transform.position,
            &a.position,
            &b.position,
            &keys[next_idx + 1].payload.transform.position,
            eased,
        )
    } else {
        a.position.lerp(&b.position, eased)
    };

    Some(CameraSample {
        transform: Transform {
            position,
            yaw: lerp_angle(a.yaw, b.yaw, eased as f32),
            pitch: lerp_angle(a.pitch, b.pitch, eased as f32),
            world: a.world.clone(),
        },
        look_at: prev.payload.look_at.clone(),
    })
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

/// Parameters for one [`CameraRig::advance`] call.
#[derive(Debug, Clone, Copy)]
pub struct RigParams {
    pub scene_default: SmoothingMode,
    pub quality: SmoothingQuality,
    /// Fraction of the remaining look-at angle closed per tick.
    pub damping: f32,
    /// Overrides the preset's look-ahead distance.
    pub look_ahead: Option<f64>,
}

impl RigParams {
    fn look_ahead_ticks(&self) -> Option<f64> {
        self.look_ahead
            .or_else(|| self.quality.look_ahead_ticks())
            .filter(|d| *d > 0.0)
    }
}

/// Per-session camera state.
#[derive(Debug, Clone)]
pub struct CameraRig {
    proxy: EntityId,
    /// Damped yaw/pitch carried between samples.
    orientation: Option<(f32, f32)>,
    last: Option<Transform>,
}

impl CameraRig {
    pub fn new(proxy: EntityId) -> Self {
        Self {
            proxy,
            orientation: None,
            last: None,
        }
    }

    pub fn proxy(&self) -> EntityId {
        self.proxy
    }

    pub fn last_transform(&self) -> Option<&Transform> {
        self.last.as_ref()
    }

    /// Produce the camera transform for `tick`.
    ///
    /// Higher quality presets evaluate several sub-ticks between the previous
    /// tick and this one, keeping only the last; damping is split across
    /// sub-samples so the per-tick turn rate does not depend on quality.
    /// `resolve` maps a look-at target to a world position (entities are
    /// looked up live) or `None` if it cannot be resolved this tick.
    pub fn advance<F>(
        &mut self,
        keys: &[Keyframe<CameraKey>],
        tick: u64,
        params: &RigParams,
        resolve: F,
    ) -> Option<Transform>
    where
        F: Fn(&LookAtTarget) -> Option<Vec3>,
    {
        let n = params.quality.subsamples().max(1);
        let per_sample = 1.0 - (1.0 - params.damping.clamp(0.0, 1.0)).powf(1.0 / n as f32);
        let spline = params.quality.uses_spline();
        let first = if self.last.is_some() { 1 } else { n };

        let mut out = None;
        for s in first..=n {
            let t = (tick as f64 - 1.0 + s as f64 / n as f64).max(0.0);
            let sample = interpolate(keys, t, params.scene_default, spline)?;
            out = Some(self.orient(keys, t, sample, params, per_sample, &resolve));
        }

        self.last = out.clone();
        out
    }

    fn orient<F>(
        &mut self,
        keys: &[Keyframe<CameraKey>],
        t: f64,
        sample: CameraSample,
        params: &RigParams,
        factor: f32,
        resolve: &F,
    ) -> Transform
    where
        F: Fn(&LookAtTarget) -> Option<Vec3>,
    {
        let mut transform = sample.transform;

        let target = match resolve(&sample.look_at) {
            Some(pos) => look_angles(&transform.position, &pos),
            None if sample.look_at.is_none() => params.look_ahead_ticks().and_then(|ahead| {
                let spline = params.quality.uses_spline();
                interpolate(keys, t + ahead, params.scene_default, spline)
                    .and_then(|s| look_angles(&transform.position, &s.transform.position))
            }),
            None => None,
        };

        match target {
            Some((target_yaw, target_pitch)) => {
                let (yaw, pitch) = self
                    .orientation
                    .unwrap_or((transform.yaw, transform.pitch));
                let yaw = lerp_angle(yaw, target_yaw, factor);
                let pitch = clamp_pitch(pitch + (target_pitch - pitch) * factor);
                self.orientation = Some((yaw, pitch));
                transform.yaw = yaw;
                transform.pitch = pitch;
            }
            None => {
                self.orientation = Some((transform.yaw, transform.pitch));
            }
        }
        transform
    }
}
