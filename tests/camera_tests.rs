//! Camera interpolation and rig tests

#[cfg(test)]
mod tests {
    use cutscene_world::{
        camera::{interpolate, CameraRig, RigParams},
        keyframe::{CameraKey, Keyframe, KeyframeId, LookAtTarget},
        smoothing::{SmoothingMode, SmoothingQuality},
        transform::{Transform, Vec3, PITCH_LIMIT},
        types::EntityId,
    };

    fn key(id: u64, time: i64, x: f64, yaw: f32, mode: SmoothingMode) -> Keyframe<CameraKey> {
        Keyframe::new(
            KeyframeId(id),
            time,
            CameraKey::new(Transform::new(x, 64.0, 0.0, yaw, 0.0), mode),
        )
    }

    fn three_keys(mode: SmoothingMode) -> Vec<Keyframe<CameraKey>> {
        vec![
            key(0, 0, 0.0, 0.0, mode),
            key(1, 20, 10.0, 0.0, mode),
            key(2, 40, 20.0, 0.0, mode),
        ]
    }

    fn resolve_position(target: &LookAtTarget) -> Option<Vec3> {
        match target {
            LookAtTarget::Position { transform } => Some(transform.position),
            _ => None,
        }
    }

    fn params(quality: SmoothingQuality, damping: f32) -> RigParams {
        RigParams {
            scene_default: SmoothingMode::Linear,
            quality,
            damping,
            look_ahead: None,
        }
    }

    // -----------------------------------------------------------------------
    // interpolate
    // -----------------------------------------------------------------------

    #[test]
    fn empty_track_has_no_sample() {
        assert!(interpolate(&[], 3.0, SmoothingMode::Ease, true).is_none());
    }

    #[test]
    fn keyframe_ticks_return_exact_transform() {
        let keys = three_keys(SmoothingMode::Ease);
        for k in &keys {
            let s = interpolate(&keys, k.time as f64, SmoothingMode::Ease, true).unwrap();
            assert_eq!(s.transform, k.payload.transform);
        }
    }

    #[test]
    fn edges_hold_first_and_last_keyframe() {
        let keys = vec![
            key(0, 10, 1.0, 0.0, SmoothingMode::Linear),
            key(1, 20, 2.0, 0.0, SmoothingMode::Linear),
        ];
        let before = interpolate(&keys, 0.0, SmoothingMode::Linear, false).unwrap();
        let after = interpolate(&keys, 99.0, SmoothingMode::Linear, false).unwrap();
        assert_eq!(before.transform.position.x, 1.0);
        assert_eq!(after.transform.position.x, 2.0);
    }

    #[test]
    fn linear_midpoint() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Linear),
            key(1, 10, 10.0, 0.0, SmoothingMode::Linear),
        ];
        let s = interpolate(&keys, 5.0, SmoothingMode::Linear, false).unwrap();
        assert!((s.transform.position.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn ease_applies_smoothstep() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Ease),
            key(1, 8, 8.0, 0.0, SmoothingMode::Ease),
        ];
        // u = 0.25 → 3u² − 2u³ = 0.15625
        let s = interpolate(&keys, 2.0, SmoothingMode::Ease, false).unwrap();
        assert!((s.transform.position.x - 1.25).abs() < 1e-9);
    }

    #[test]
    fn default_mode_uses_scene_default() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Default),
            key(1, 8, 8.0, 0.0, SmoothingMode::Default),
        ];
        let linear = interpolate(&keys, 2.0, SmoothingMode::Linear, false).unwrap();
        assert!((linear.transform.position.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn yaw_takes_shortest_arc() {
        let keys = vec![
            key(0, 0, 0.0, 350.0, SmoothingMode::Linear),
            key(1, 10, 0.0, 10.0, SmoothingMode::Linear),
        ];
        let s = interpolate(&keys, 5.0, SmoothingMode::Linear, false).unwrap();
        assert!(s.transform.yaw.abs() < 1e-3, "yaw was {}", s.transform.yaw);
    }

    #[test]
    fn instant_keyframe_holds_until_next() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Instant),
            key(1, 10, 10.0, 0.0, SmoothingMode::Linear),
        ];
        let held = interpolate(&keys, 9.5, SmoothingMode::Linear, true).unwrap();
        assert_eq!(held.transform.position.x, 0.0);

        let cut = interpolate(&keys, 10.0, SmoothingMode::Linear, true).unwrap();
        assert_eq!(cut.transform.position.x, 10.0);
    }

    #[test]
    fn instant_flag_overrides_mode() {
        let mut first = key(0, 0, 0.0, 0.0, SmoothingMode::Linear);
        first.payload.instant = true;
        let keys = vec![first, key(1, 10, 10.0, 0.0, SmoothingMode::Linear)];

        let held = interpolate(&keys, 5.0, SmoothingMode::Linear, false).unwrap();
        assert_eq!(held.transform.position.x, 0.0);
    }

    #[test]
    fn spline_reproduces_evenly_spaced_line() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Linear),
            key(1, 10, 10.0, 0.0, SmoothingMode::Linear),
            key(2, 20, 20.0, 0.0, SmoothingMode::Linear),
            key(3, 30, 30.0, 0.0, SmoothingMode::Linear),
        ];
        let s = interpolate(&keys, 15.0, SmoothingMode::Linear, true).unwrap();
        assert!((s.transform.position.x - 15.0).abs() < 1e-6);
    }

    #[test]
    fn look_at_comes_from_active_keyframe() {
        let target = LookAtTarget::Position {
            transform: Transform::new(5.0, 64.0, 5.0, 0.0, 0.0),
        };
        let keys = vec![
            Keyframe::new(
                KeyframeId(0),
                0,
                CameraKey::new(Transform::new(0.0, 64.0, 0.0, 0.0, 0.0), SmoothingMode::Linear)
                    .looking_at(target.clone()),
            ),
            key(1, 10, 10.0, 0.0, SmoothingMode::Linear),
        ];
        let s = interpolate(&keys, 4.0, SmoothingMode::Linear, false).unwrap();
        assert_eq!(s.look_at, target);
    }

    // -----------------------------------------------------------------------
    // CameraRig
    // -----------------------------------------------------------------------

    #[test]
    fn rig_follows_curve_without_target() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Linear),
            key(1, 10, 10.0, 90.0, SmoothingMode::Linear),
        ];
        let mut rig = CameraRig::new(EntityId(1));
        let t = rig
            .advance(&keys, 5, &params(SmoothingQuality::Fast, 0.5), resolve_position)
            .unwrap();
        assert!((t.position.x - 5.0).abs() < 1e-9);
        assert!((t.yaw - 45.0).abs() < 1e-3);
        assert_eq!(rig.last_transform(), Some(&t));
    }

    #[test]
    fn rig_subsamples_land_on_the_tick() {
        let keys = vec![
            key(0, 0, 0.0, 0.0, SmoothingMode::Linear),
            key(1, 10, 10.0, 0.0, SmoothingMode::Linear),
        ];
        let mut rig = CameraRig::new(EntityId(1));
        let p = params(SmoothingQuality::Cinematic, 0.5);
        rig.advance(&keys, 0, &p, resolve_position);
        let t = rig.advance(&keys, 1, &p, resolve_position).unwrap();
        assert!((t.position.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn look_at_turn_is_damped() {
        let keys = vec![Keyframe::new(
            KeyframeId(0),
            0,
            CameraKey::new(Transform::new(0.0, 64.0, 0.0, 0.0, 0.0), SmoothingMode::Linear)
                .looking_at(LookAtTarget::Position {
                    transform: Transform::new(-10.0, 64.0, 0.0, 0.0, 0.0),
                }),
        )];
        let mut rig = CameraRig::new(EntityId(1));
        let p = params(SmoothingQuality::Fast, 0.5);

        // Target yaw is 90; half the remaining angle closes per tick.
        let first = rig.advance(&keys, 0, &p, resolve_position).unwrap();
        assert!((first.yaw - 45.0).abs() < 1e-3, "yaw was {}", first.yaw);

        let second = rig.advance(&keys, 1, &p, resolve_position).unwrap();
        assert!((second.yaw - 67.5).abs() < 1e-3, "yaw was {}", second.yaw);
    }

    #[test]
    fn look_at_pitch_is_clamped() {
        let keys = vec![Keyframe::new(
            KeyframeId(0),
            0,
            CameraKey::new(Transform::new(0.0, 64.0, 0.0, 0.0, 0.0), SmoothingMode::Linear)
                .looking_at(LookAtTarget::Position {
                    transform: Transform::new(0.0, 200.0, 0.001, 0.0, 0.0),
                }),
        )];
        let mut rig = CameraRig::new(EntityId(1));
        let t = rig
            .advance(&keys, 0, &params(SmoothingQuality::Fast, 1.0), resolve_position)
            .unwrap();
        assert!(t.pitch >= -PITCH_LIMIT - 1e-4);
        assert!(t.pitch < -80.0);
    }
}
