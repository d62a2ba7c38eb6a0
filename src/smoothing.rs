//! Easing curves, per-keyframe smoothing modes and scene quality presets.
//!
//! Pure math, no dependency on sessions or collaborators.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::transform::Vec3;

// ---------------------------------------------------------------------------
// Easing curves
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    /// Cubic smoothstep `3t² − 2t³`.
    SmoothStep,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    SineInOut,
}

impl Easing {
    /// Remap normalized progress `t` in [0, 1]. Endpoints map to themselves.
    #[inline]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::SmoothStep => t * t * (3.0 - 2.0 * t),

            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }

            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }

            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Smoothing mode (per keyframe)
// ---------------------------------------------------------------------------

/// How a camera keyframe blends toward the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Use the scene's default mode.
    #[default]
    Default,
    /// Hard cut: hold this keyframe until the next one.
    Instant,
    Linear,
    /// Smoothstep in and out.
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Gentle sine in/out.
    Soft,
}

impl SmoothingMode {
    /// Resolve `Default` against the scene default. A scene default of
    /// `Default` falls back to `Ease`.
    pub fn resolve(self, scene_default: SmoothingMode) -> SmoothingMode {
        match (self, scene_default) {
            (SmoothingMode::Default, SmoothingMode::Default) => SmoothingMode::Ease,
            (SmoothingMode::Default, other) => other,
            (mode, _) => mode,
        }
    }

    /// Curve for a resolved mode. `Instant` has no curve.
    pub fn easing(self) -> Option<Easing> {
        match self {
            SmoothingMode::Instant => None,
            SmoothingMode::Linear => Some(Easing::Linear),
            SmoothingMode::Default | SmoothingMode::Ease => Some(Easing::SmoothStep),
            SmoothingMode::EaseIn => Some(Easing::CubicIn),
            SmoothingMode::EaseOut => Some(Easing::CubicOut),
            SmoothingMode::EaseInOut => Some(Easing::CubicInOut),
            SmoothingMode::Soft => Some(Easing::SineInOut),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality presets (per scene)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingQuality {
    Fast,
    #[default]
    Balanced,
    Cinematic,
}

impl SmoothingQuality {
    /// Evaluations per tick; only the last one is kept.
    pub fn subsamples(self) -> u32 {
        match self {
            SmoothingQuality::Fast => 1,
            SmoothingQuality::Balanced => 2,
            SmoothingQuality::Cinematic => 4,
        }
    }

    pub fn uses_spline(self) -> bool {
        !matches!(self, SmoothingQuality::Fast)
    }

    /// How far ahead (ticks) to sample for anticipatory turning.
    pub fn look_ahead_ticks(self) -> Option<f64> {
        match self {
            SmoothingQuality::Cinematic => Some(6.0),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Splines
// ---------------------------------------------------------------------------

/// Centripetal Catmull-Rom (alpha = 0.5) between `p1` and `p2`.
///
/// Returns `p1` at `t = 0` and `p2` at `t = 1`. Degenerate knot spacing
/// collapses to a linear blend.
pub fn catmull_rom(p0: &Vec3, p1: &Vec3, p2: &Vec3, p3: &Vec3, t: f64) -> Vec3 {
    const ALPHA: f64 = 0.5;
    const EPS: f64 = 1e-6;

    if t <= 0.0 {
        return *p1;
    }
    if t >= 1.0 {
        return *p2;
    }

    let knot = |a: &Vec3, b: &Vec3| a.distance(b).powf(ALPHA).max(EPS);
    let t0 = 0.0;
    let t1 = t0 + knot(p0, p1);
    let t2 = t1 + knot(p1, p2);
    let t3 = t2 + knot(p2, p3);

    if (t2 - t1) <= EPS {
        return p1.lerp(p2, t);
    }

    let tt = t1 + (t2 - t1) * t;
    let mix = |a: &Vec3, b: &Vec3, ta: f64, tb: f64| -> Vec3 {
        let w = (tt - ta) / (tb - ta);
        a.lerp(b, w)
    };

    let a1 = mix(p0, p1, t0, t1);
    let a2 = mix(p1, p2, t1, t2);
    let a3 = mix(p2, p3, t2, t3);
    let b1 = mix(&a1, &a2, t0, t2);
    let b2 = mix(&a2, &a3, t1, t3);
    mix(&b1, &b2, t1, t2)
}
