//! Positions, orientations and the angle math shared by camera and actors.
//!
//! Angles follow the block-game convention: yaw 0 faces +Z, yaw 90 faces
//! −X, positive pitch looks down. All angles are degrees.

use serde::{Deserialize, Serialize};

/// Pitch limit applied after look-at damping.
pub const PITCH_LIMIT: f32 = 89.9;

// ---------------------------------------------------------------------------
// Vec3
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn lerp(&self, other: &Vec3, t: f64) -> Vec3 {
        Vec3::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Position + orientation + optional world tag.
///
/// A plain value: keyframes, actor ticks and handles each hold their own copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<String>,
}

impl Transform {
    pub fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            yaw,
            pitch,
            world: None,
        }
    }

    pub fn in_world(mut self, world: impl Into<String>) -> Self {
        self.world = Some(world.into());
        self
    }

    pub fn distance(&self, other: &Transform) -> f64 {
        self.position.distance(&other.position)
    }

    /// Angle-aware blend: position is linear, yaw/pitch take the shortest arc.
    /// The world tag is taken from `self` until `t` reaches 1.
    pub fn lerp(&self, other: &Transform, t: f64) -> Transform {
        Transform {
            position: self.position.lerp(&other.position, t),
            yaw: lerp_angle(self.yaw, other.yaw, t as f32),
            pitch: lerp_angle(self.pitch, other.pitch, t as f32),
            world: if t >= 1.0 {
                other.world.clone()
            } else {
                self.world.clone()
            },
        }
    }

    /// Same transform, facing `target`. Unchanged if the target coincides
    /// with our own position.
    pub fn facing(&self, target: &Vec3) -> Transform {
        let mut out = self.clone();
        if let Some((yaw, pitch)) = look_angles(&self.position, target) {
            out.yaw = yaw;
            out.pitch = pitch;
        }
        out
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} yaw={:.1} pitch={:.1}",
            self.position, self.yaw, self.pitch
        )?;
        if let Some(world) = &self.world {
            write!(f, " in {}", world)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Angle helpers
// ---------------------------------------------------------------------------

/// Wrap an angle into (−180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Shortest signed difference `to - from`, in (−180, 180].
pub fn angle_delta(from: f32, to: f32) -> f32 {
    wrap_degrees(to - from)
}

/// Shortest-arc interpolation. 350 → 10 at 0.5 passes through 0, not 180.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    wrap_degrees(from + angle_delta(from, to) * t)
}

/// Yaw/pitch that look from `from` towards `to`, or `None` if the points coincide.
pub fn look_angles(from: &Vec3, to: &Vec3) -> Option<(f32, f32)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dz = to.z - from.z;
    let horizontal = (dx * dx + dz * dz).sqrt();
    if horizontal < 1e-9 && dy.abs() < 1e-9 {
        return None;
    }
    let yaw = (-dx).atan2(dz).to_degrees() as f32;
    let pitch = (-dy).atan2(horizontal).to_degrees() as f32;
    Some((wrap_degrees(yaw), pitch))
}

pub fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_half_open_range() {
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
    }

    #[test]
    fn lerp_angle_takes_short_way_round() {
        let mid = lerp_angle(350.0, 10.0, 0.5);
        assert!(mid.abs() < 1e-4, "expected ~0, got {}", mid);

        let mid = lerp_angle(10.0, 350.0, 0.5);
        assert!(mid.abs() < 1e-4, "expected ~0, got {}", mid);
    }

    #[test]
    fn look_angles_match_axes() {
        let origin = Vec3::zero();
        let (yaw, pitch) = look_angles(&origin, &Vec3::new(0.0, 0.0, 5.0)).unwrap();
        assert!(yaw.abs() < 1e-4);
        assert!(pitch.abs() < 1e-4);

        let (yaw, _) = look_angles(&origin, &Vec3::new(-5.0, 0.0, 0.0)).unwrap();
        assert!((yaw - 90.0).abs() < 1e-4);

        let (_, pitch) = look_angles(&origin, &Vec3::new(0.0, -5.0, 0.0)).unwrap();
        assert!((pitch - 90.0).abs() < 1e-4);

        assert!(look_angles(&origin, &origin).is_none());
    }
}
