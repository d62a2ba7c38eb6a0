//! CutsceneService end-to-end tests against the headless world

#[cfg(test)]
mod tests {
    use cutscene_world::{
        actor::{PoseFlags, SceneActorTemplate},
        error::CutsceneError,
        headless::{EffectRecord, HeadlessViewer, HeadlessWorld},
        host::{CommandPrincipal, MovementMode, StatusEffect},
        keyframe::{
            ActionbarKey, CameraKey, CommandExecutor, CommandKey, ModelAction, ModelKey,
            ParticleKey, SoundKey,
        },
        protocol::{SessionStopped, SessionTick},
        scene::{EndAction, ModelEntry, Scene, SharedScene},
        service::CutsceneService,
        session::{SessionOptions, SessionState, StopReason},
        smoothing::SmoothingMode,
        transform::Transform,
        types::PlaybackConfig,
    };

    fn home() -> Transform {
        Transform::new(100.0, 64.0, 100.0, 45.0, 0.0).in_world("world")
    }

    fn camera_at(x: f64) -> Transform {
        Transform::new(x, 80.0, 0.0, 0.0, 10.0).in_world("world")
    }

    /// 40-tick scene with camera keyframes at 0, 20 and 40.
    fn base_scene(name: &str) -> Scene {
        let mut scene = Scene::new(name, 40);
        scene.add_camera(0, CameraKey::new(camera_at(0.0), SmoothingMode::Default));
        scene.add_camera(20, CameraKey::new(camera_at(10.0), SmoothingMode::Default));
        scene.add_camera(40, CameraKey::new(camera_at(20.0), SmoothingMode::Default));
        scene
    }

    fn world_with(viewers: &[&str]) -> HeadlessWorld {
        let world = HeadlessWorld::new();
        for id in viewers {
            let mut name = id.to_string();
            name[..1].make_ascii_uppercase();
            world.add_viewer(id, &name, home());
        }
        world
    }

    fn service(world: &HeadlessWorld) -> CutsceneService {
        CutsceneService::new(PlaybackConfig::default(), world.collaborators()).unwrap()
    }

    fn start(svc: &mut CutsceneService, viewer: &str, scene: &SharedScene) {
        svc.start(viewer, scene.clone(), SessionOptions::default())
            .unwrap();
    }

    /// Tick until the viewer's session stops; returns its updates and the
    /// stop event.
    fn run_to_end(svc: &mut CutsceneService, viewer: &str) -> (Vec<SessionTick>, SessionStopped) {
        let mut updates = Vec::new();
        for _ in 0..1000 {
            let report = svc.tick();
            updates.extend(report.updates.into_iter().filter(|u| u.viewer == viewer));
            if let Some(stopped) = report.stopped.into_iter().find(|s| s.viewer == viewer) {
                return (updates, stopped);
            }
        }
        panic!("session for {} never stopped", viewer);
    }

    fn command(text: &str, executor: CommandExecutor) -> CommandKey {
        CommandKey {
            commands: vec![text.to_string()],
            executor,
            allow_global: false,
        }
    }

    fn model_key(action: ModelAction, animation: Option<&str>) -> ModelKey {
        ModelKey {
            action,
            model_id: "statue".into(),
            entity_ref: "s1".into(),
            animation_id: animation.map(str::to_string),
            looped: false,
            speed: 1.0,
            spawn_transform: None,
        }
    }

    // -----------------------------------------------------------------------
    // Timeline
    // -----------------------------------------------------------------------

    #[test]
    fn forty_tick_scene_runs_41_updates_then_finishes() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);

        let (updates, stopped) = run_to_end(&mut svc, "alex");

        assert_eq!(updates.len(), 41);
        let ticks: Vec<u64> = updates.iter().map(|u| u.tick).collect();
        assert_eq!(ticks, (0..=40).collect::<Vec<_>>());
        assert_eq!(stopped.reason, "finished");
        assert_eq!(stopped.final_tick, 40);
        assert_eq!(stopped.stats.ticks_processed, 41);
        assert!(svc.session("alex").is_none());
    }

    #[test]
    fn camera_hits_keyframes_exactly() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);

        let (updates, _) = run_to_end(&mut svc, "alex");

        assert_eq!(updates[0].camera, Some(camera_at(0.0)));
        assert_eq!(updates[20].camera, Some(camera_at(10.0)));
        assert_eq!(updates[40].camera, Some(camera_at(20.0)));
        let mid = updates[10].camera.as_ref().unwrap().position.x;
        assert!(mid > 0.0 && mid < 10.0);
    }

    #[test]
    fn start_mid_timeline_and_custom_end() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();

        let options = SessionOptions {
            start_tick: 20,
            ..Default::default()
        };
        let started = svc.start("alex", scene.clone(), options).unwrap();
        assert_eq!(started.start_tick, 20);
        let (updates, _) = run_to_end(&mut svc, "alex");
        assert_eq!(updates.len(), 21);
        assert_eq!(updates.first().map(|u| u.tick), Some(20));

        let options = SessionOptions {
            end_tick: Some(10),
            ..Default::default()
        };
        svc.start("alex", scene, options).unwrap();
        let (updates, stopped) = run_to_end(&mut svc, "alex");
        assert_eq!(updates.len(), 11);
        assert_eq!(stopped.final_tick, 10);
    }

    #[test]
    fn pause_halts_progress() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);

        for _ in 0..3 {
            svc.tick();
        }
        svc.pause("alex").unwrap();
        assert_eq!(svc.stats().paused_sessions, 1);

        for _ in 0..5 {
            let report = svc.tick();
            assert!(report.updates.is_empty());
        }
        let session = svc.session("alex").unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(session.current_tick(), 3);

        svc.resume("alex").unwrap();
        let report = svc.tick();
        assert_eq!(report.updates.len(), 1);
        assert_eq!(report.updates[0].tick, 3);
    }

    #[test]
    fn pause_without_session_is_an_error() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        assert!(matches!(svc.pause("alex"), Err(CutsceneError::NoSession(_))));
        assert!(matches!(svc.resume("alex"), Err(CutsceneError::NoSession(_))));
    }

    // -----------------------------------------------------------------------
    // Start validation
    // -----------------------------------------------------------------------

    #[test]
    fn start_rejects_unknown_viewer() {
        let world = world_with(&[]);
        let mut svc = service(&world);
        let result = svc.start("ghost", base_scene("s").into_shared(), SessionOptions::default());
        assert!(matches!(result, Err(CutsceneError::ViewerNotFound(_))));
    }

    #[test]
    fn start_rejects_scene_without_camera_and_leaves_no_trace() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let before = world.viewer_state("alex").unwrap();

        let result = svc.start("alex", Scene::new("empty", 10).into_shared(), SessionOptions::default());

        assert!(matches!(result, Err(CutsceneError::NoCameraKeyframes(_))));
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.viewer_state("alex").unwrap(), before);
    }

    #[test]
    fn start_rejects_bad_range() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("s").into_shared();

        let late = SessionOptions {
            start_tick: 50,
            ..Default::default()
        };
        assert!(matches!(
            svc.start("alex", scene.clone(), late),
            Err(CutsceneError::InvalidRange { .. })
        ));

        let inverted = SessionOptions {
            start_tick: 10,
            end_tick: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            svc.start("alex", scene, inverted),
            Err(CutsceneError::InvalidRange { .. })
        ));
    }

    #[test]
    fn session_limit_is_enforced() {
        let world = world_with(&["alex", "blake"]);
        let config = PlaybackConfig {
            max_sessions: 1,
            ..Default::default()
        };
        let mut svc = CutsceneService::new(config, world.collaborators()).unwrap();
        let scene = base_scene("s").into_shared();

        start(&mut svc, "alex", &scene);
        let result = svc.start("blake", scene.clone(), SessionOptions::default());
        assert!(matches!(result, Err(CutsceneError::SessionLimit(1))));

        // Replacing your own session is still allowed.
        start(&mut svc, "alex", &scene);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let world = world_with(&[]);
        let config = PlaybackConfig {
            look_at_damping: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            CutsceneService::new(config, world.collaborators()),
            Err(CutsceneError::Config(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Session symmetry
    // -----------------------------------------------------------------------

    #[test]
    fn viewer_is_restored_after_finish() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let before = world.viewer_state("alex").unwrap();
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);

        let during = world.viewer_state("alex").unwrap();
        assert_eq!(during.movement_mode, MovementMode::Spectator);
        assert_eq!(during.head_item.as_deref(), Some("minecraft:carved_pumpkin"));
        assert_eq!(
            during.spectator_target,
            svc.session("alex").map(|s| s.camera_proxy())
        );

        run_to_end(&mut svc, "alex");

        let after = world.viewer_state("alex").unwrap();
        assert_eq!(after.transform, before.transform);
        assert_eq!(after.movement_mode, before.movement_mode);
        assert_eq!(after.head_item, before.head_item);
        assert_eq!(after.fly_speed, before.fly_speed);
        assert_eq!(after.spectator_target, None);
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.live_puppets(), 0);
    }

    #[test]
    fn camera_proxy_is_visible_only_to_its_viewer() {
        let world = world_with(&["alex", "blake"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        svc.tick();

        let proxy = svc.session("alex").unwrap().camera_proxy();
        let entity = world.entity(proxy).unwrap();
        assert!(entity.is_visible_to("alex"));
        assert!(!entity.is_visible_to("blake"));
    }

    fn settled(mut viewer: HeadlessViewer) -> HeadlessViewer {
        viewer.teleports = 0;
        viewer
    }

    #[test]
    fn viewer_state_survives_start_then_stop() {
        let states: Vec<Box<dyn Fn(&mut HeadlessViewer)>> = vec![
            Box::new(|v| {
                v.movement_mode = MovementMode::Creative;
                v.allow_flight = true;
                v.flying = true;
                v.fly_speed = 0.25;
            }),
            Box::new(|v| {
                v.movement_mode = MovementMode::Adventure;
                v.walk_speed = 0.05;
                v.max_health = Some(40.0);
                v.head_item = Some("minecraft:diamond_helmet".into());
            }),
            Box::new(|v| {
                v.max_health = None;
                v.status_effects = vec![
                    StatusEffect {
                        effect: "night_vision".into(),
                        amplifier: 0,
                        duration_ticks: 600,
                    },
                    StatusEffect {
                        effect: "speed".into(),
                        amplifier: 2,
                        duration_ticks: 40,
                    },
                ];
            }),
        ];

        for packet_camera in [false, true] {
            for setup in &states {
                check_symmetry(packet_camera, setup.as_ref());
            }
        }
    }

    fn check_symmetry(packet_camera: bool, setup: &dyn Fn(&mut HeadlessViewer)) {
        let world = world_with(&["alex"]);
        world.set_packet_camera_available(packet_camera);
        world.edit_viewer("alex", |v| setup(v));
        let mut svc = service(&world);
        let before = world.viewer_state("alex").unwrap();

        svc.start("alex", base_scene("intro").into_shared(), SessionOptions::default())
            .unwrap();
        svc.tick();
        // Gameplay keeps touching the viewer while the scene plays.
        world.edit_viewer("alex", |v| {
            v.status_effects.clear();
            v.flying = !v.flying;
            v.walk_speed = 0.9;
        });
        svc.stop("alex", StopReason::Stopped).unwrap();

        let after = world.viewer_state("alex").unwrap();
        assert_eq!(settled(after), settled(before), "packet_camera={}", packet_camera);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn end_action_applies_only_to_finished_sessions() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("outro");
        scene.end_action = EndAction::Teleport {
            transform: Transform::new(1.0, 2.0, 3.0, 0.0, 0.0),
        };
        let scene = scene.into_shared();

        start(&mut svc, "alex", &scene);
        run_to_end(&mut svc, "alex");
        let pos = world.viewer_state("alex").unwrap().transform.position;
        assert_eq!((pos.x, pos.y, pos.z), (1.0, 2.0, 3.0));

        world.add_viewer("alex", "Alex", home());
        start(&mut svc, "alex", &scene);
        svc.tick();
        let stopped = svc.stop("alex", StopReason::Stopped).unwrap();
        assert_eq!(stopped.reason, "stopped");
        assert_eq!(world.viewer_state("alex").unwrap().transform, home());
    }

    #[test]
    fn packet_camera_is_preferred_when_available() {
        let world = world_with(&["alex"]);
        world.set_packet_camera_available(true);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();

        let started = svc.start("alex", scene, SessionOptions::default()).unwrap();
        assert_eq!(started.lock_backend, "packet_camera");
        let proxy = svc.session("alex").unwrap().camera_proxy();
        assert_eq!(world.viewer_state("alex").unwrap().packet_target, Some(proxy));
        assert!(!svc.capabilities().was_reported("packet_camera"));

        svc.stop("alex", StopReason::Stopped);
        assert_eq!(world.viewer_state("alex").unwrap().packet_target, None);
    }

    #[test]
    fn native_spectator_fallback_is_reported_once() {
        let world = world_with(&["alex", "blake"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();

        let started = svc.start("alex", scene.clone(), SessionOptions::default()).unwrap();
        svc.start("blake", scene, SessionOptions::default()).unwrap();

        assert_eq!(started.lock_backend, "native_spectator");
        assert!(svc.capabilities().was_reported("packet_camera"));
    }

    // -----------------------------------------------------------------------
    // Observation lock recovery
    // -----------------------------------------------------------------------

    #[test]
    fn lock_recovery_respects_cooldown() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        let proxy = svc.session("alex").unwrap().camera_proxy();

        svc.tick(); // tick 0
        let teleports_before = world.viewer_state("alex").unwrap().teleports;

        world.detach_lock("alex");
        svc.tick(); // tick 1: recovered immediately
        let stats = svc.session("alex").unwrap().stats().clone();
        assert_eq!(stats.forced_recoveries, 1);
        assert_eq!(world.viewer_state("alex").unwrap().spectator_target, Some(proxy));
        assert_eq!(
            world.viewer_state("alex").unwrap().teleports,
            teleports_before + 1
        );

        world.detach_lock("alex");
        for _ in 2..=20 {
            svc.tick();
        }
        let stats = svc.session("alex").unwrap().stats().clone();
        assert_eq!(stats.forced_recoveries, 1);
        assert_eq!(stats.lock_drift_ticks, 20);
        assert_eq!(world.viewer_state("alex").unwrap().spectator_target, None);

        svc.tick(); // tick 21: cooldown elapsed
        let stats = svc.session("alex").unwrap().stats().clone();
        assert_eq!(stats.forced_recoveries, 2);
        assert_eq!(world.viewer_state("alex").unwrap().spectator_target, Some(proxy));
    }

    // -----------------------------------------------------------------------
    // Keyframe dispatch
    // -----------------------------------------------------------------------

    #[test]
    fn commands_fire_exactly_once_with_placeholders() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.add_command(10, command("/say {viewer} at {tick} of {scene}", CommandExecutor::Viewer));
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        run_to_end(&mut svc, "alex");

        let commands = world.state().commands.clone();
        assert_eq!(
            commands,
            vec![(
                CommandPrincipal::Viewer("alex".into()),
                "say Alex at 10 of intro".to_string()
            )]
        );
    }

    #[test]
    fn global_selectors_need_opt_in() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.add_command(2, command("kill @e", CommandExecutor::Console));
        scene.add_command(
            3,
            CommandKey {
                allow_global: true,
                ..command("effect give @a glowing", CommandExecutor::Console)
            },
        );
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        let (_, stopped) = run_to_end(&mut svc, "alex");

        assert_eq!(world.commands(), vec!["effect give @a glowing".to_string()]);
        assert_eq!(stopped.stats.skipped_effects, 1);
    }

    #[test]
    fn actionbar_shows_for_its_duration_then_clears() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.add_actionbar(5, ActionbarKey::new("Hi {viewer}", 3));
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        for _ in 0..=8 {
            svc.tick();
        }

        assert_eq!(
            world.actionbars_for("alex"),
            vec!["Hi Alex", "Hi Alex", "Hi Alex", ""]
        );
        assert!(svc.session("alex").unwrap().actionbar_text().is_none());
    }

    #[test]
    fn huge_actionbar_duration_does_not_abort_playback() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        let key: ActionbarKey =
            serde_json::from_str(r#"{ "text": "forever", "duration_ticks": 18446744073709551615 }"#)
                .unwrap();
        scene.add_actionbar(3, key);
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        let (updates, stopped) = run_to_end(&mut svc, "alex");

        assert_eq!(updates.len(), 41);
        assert_eq!(stopped.reason, "finished");
        let shown = world.actionbars_for("alex");
        assert_eq!(shown.iter().filter(|t| *t == "forever").count(), 38);
        assert_eq!(shown.last().map(String::as_str), Some(""));
    }

    #[test]
    fn effects_dispatch_and_malformed_ones_are_skipped() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.add_particle(
            3,
            ParticleKey {
                particle_id: "flame".into(),
                transform: camera_at(0.0),
                count: 4,
            },
        );
        scene.add_sound(
            3,
            SoundKey {
                sound_id: String::new(),
                transform: camera_at(0.0),
                volume: 1.0,
                pitch: 1.0,
            },
        );
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        let (_, stopped) = run_to_end(&mut svc, "alex");

        assert_eq!(
            world.effects(),
            vec![EffectRecord::Particle {
                viewer: "alex".into(),
                particle_id: "flame".into()
            }]
        );
        assert_eq!(stopped.stats.skipped_effects, 1);
    }

    #[test]
    fn model_keyframes_spawn_animate_and_despawn() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.add_model_entry(ModelEntry {
            id: "statue".into(),
            asset: "statue.bbmodel".into(),
            default_animation: Some("idle".into()),
            scale: 1.0,
        });
        scene.add_model(2, model_key(ModelAction::Spawn, None));
        scene.add_model(4, model_key(ModelAction::Animate, Some("wave")));
        scene.add_model(6, model_key(ModelAction::Despawn, None));
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        for _ in 0..=2 {
            svc.tick();
        }
        let model = svc.session("alex").unwrap().model_entity("s1").unwrap();
        assert!(world.entity(model).unwrap().is_visible_to("alex"));

        for _ in 3..=6 {
            svc.tick();
        }
        assert!(svc.session("alex").unwrap().model_entity("s1").is_none());
        assert!(world.entity(model).is_none());
        assert_eq!(
            world.effects(),
            vec![
                EffectRecord::ModelAnimation {
                    entity: model,
                    animation: "idle".into()
                },
                EffectRecord::ModelAnimation {
                    entity: model,
                    animation: "wave".into()
                },
            ]
        );
    }

    #[test]
    fn model_library_key_may_differ_from_entry_id() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.model_library.insert(
            "statue".into(),
            ModelEntry {
                id: "statue_v2".into(),
                asset: "statue_v2.bbmodel".into(),
                default_animation: None,
                scale: 1.0,
            },
        );
        scene.add_model(2, model_key(ModelAction::Spawn, None));
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        for _ in 0..=2 {
            svc.tick();
        }

        let session = svc.session("alex").unwrap();
        assert!(session.model_entity("s1").is_some());
        assert_eq!(session.stats().skipped_effects, 0);
    }

    #[test]
    fn model_keyframes_are_ignored_without_provider() {
        let world = world_with(&["alex"]);
        world.set_models_available(false);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        scene.add_model(1, model_key(ModelAction::Spawn, None));
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        let (updates, stopped) = run_to_end(&mut svc, "alex");

        assert_eq!(updates.len(), 41);
        assert_eq!(stopped.reason, "finished");
        assert!(svc.capabilities().was_reported("models"));
        assert_eq!(world.entity_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Actors
    // -----------------------------------------------------------------------

    #[test]
    fn actor_appears_at_tick_ten_for_viewer_only() {
        let world = world_with(&["alex", "blake"]);
        world.set_native_puppet_visibility(false);
        let mut svc = service(&world);
        let mut scene = base_scene("intro");
        let mut guide = SceneActorTemplate::new("guide", "Guide");
        for tick in 10..=30 {
            guide.record_pose(tick, camera_at(tick as f64), PoseFlags::default());
        }
        scene.add_actor(guide);
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        for _ in 0..10 {
            let report = svc.tick();
            assert_eq!(report.updates[0].actors_spawned, 0);
        }
        assert_eq!(world.live_puppets(), 0);

        let report = svc.tick();
        assert_eq!(report.updates[0].tick, 10);
        assert_eq!(report.updates[0].actors_spawned, 1);
        let entity = svc.session("alex").unwrap().actors().entity_of("guide").unwrap();
        let puppet = world.entity(entity).unwrap();
        assert!(puppet.is_visible_to("alex"));
        assert!(!puppet.is_visible_to("blake"));

        run_to_end(&mut svc, "alex");
        assert_eq!(world.live_puppets(), 0);
    }

    #[test]
    fn preview_sessions_only_play_previewable_actors() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("draft");
        let mut shown = SceneActorTemplate::new("shown", "Shown");
        shown.previewable = true;
        shown.record_pose(0, camera_at(0.0), PoseFlags::default());
        let mut hidden = SceneActorTemplate::new("hidden", "Hidden");
        hidden.record_pose(0, camera_at(1.0), PoseFlags::default());
        scene.add_actor(shown);
        scene.add_actor(hidden);
        let scene = scene.into_shared();

        let started = svc.start("alex", scene, SessionOptions::preview()).unwrap();
        assert!(started.preview);
        svc.tick();

        let session = svc.session("alex").unwrap();
        assert!(session.actors().entity_of("shown").is_some());
        assert!(session.actors().entity_of("hidden").is_none());

        let stopped = svc.stop("alex", StopReason::Stopped).unwrap();
        assert!(stopped.preview);
        assert!(stopped.resume_editor);
    }

    #[test]
    fn cleared_recording_drops_actor_mid_session() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("live-edit");
        let mut actor = SceneActorTemplate::new("extra", "Extra");
        actor.record_pose(0, camera_at(0.0), PoseFlags::default());
        scene.add_actor(actor);
        let scene = scene.into_shared();
        start(&mut svc, "alex", &scene);

        svc.tick();
        assert_eq!(world.live_puppets(), 1);

        if let Some(actor) = scene.write().actors.get_mut("extra") {
            actor.clear_recording();
        }
        svc.tick();
        assert_eq!(world.live_puppets(), 0);
    }

    #[test]
    fn removed_actor_is_dropped_mid_session() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let mut scene = base_scene("live-edit");
        let mut actor = SceneActorTemplate::new("extra", "Extra");
        actor.previewable = true;
        actor.record_pose(0, camera_at(0.0), PoseFlags::default());
        scene.add_actor(actor);
        let scene = scene.into_shared();
        svc.start("alex", scene.clone(), SessionOptions::preview())
            .unwrap();

        svc.tick();
        assert_eq!(world.live_puppets(), 1);

        scene.write().actors.remove("extra");
        svc.tick();
        assert_eq!(world.live_puppets(), 0);
        assert!(svc.session("alex").unwrap().actors().handle("extra").is_none());
    }

    // -----------------------------------------------------------------------
    // Stop reasons and isolation
    // -----------------------------------------------------------------------

    #[test]
    fn missing_viewer_aborts_and_cleans_up() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        svc.tick();

        world.remove_viewer("alex");
        let report = svc.tick();

        assert!(report.updates.is_empty());
        assert_eq!(report.stopped.len(), 1);
        assert_eq!(report.stopped[0].reason, "viewer_missing");
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn disconnect_cleans_up_without_viewer() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        svc.tick();

        world.remove_viewer("alex");
        let stopped = svc.disconnect("alex").unwrap();

        assert_eq!(stopped.reason, "disconnected");
        assert_eq!(world.entity_count(), 0);
        assert!(svc.active_viewers().is_empty());
    }

    #[test]
    fn runtime_error_aborts_only_that_session() {
        let world = world_with(&["alex", "blake"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        start(&mut svc, "blake", &scene);
        svc.tick();

        let proxy = svc.session("blake").unwrap().camera_proxy();
        world.kill_entity(proxy);
        let report = svc.tick();

        assert_eq!(report.updates.len(), 1);
        assert_eq!(report.updates[0].viewer, "alex");
        assert_eq!(report.stopped.len(), 1);
        assert_eq!(report.stopped[0].viewer, "blake");
        assert_eq!(report.stopped[0].reason, "runtime_exception");
        assert!(report.stopped[0].detail.is_some());

        assert_eq!(svc.active_viewers(), vec!["alex".to_string()]);
        assert_eq!(
            world.viewer_state("blake").unwrap().movement_mode,
            MovementMode::Survival
        );
    }

    #[test]
    fn panic_in_host_aborts_only_that_session() {
        let world = world_with(&["alex", "blake"]);
        world.panic_on_command("boom");
        let mut svc = service(&world);
        let calm = base_scene("calm").into_shared();
        let mut explosive = base_scene("explosive");
        explosive.add_command(2, command("boom", CommandExecutor::Console));
        let explosive = explosive.into_shared();
        start(&mut svc, "alex", &calm);
        start(&mut svc, "blake", &explosive);

        let mut stopped = Vec::new();
        for _ in 0..=2 {
            stopped.extend(svc.tick().stopped);
        }

        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].viewer, "blake");
        assert_eq!(stopped[0].reason, "runtime_exception");
        assert!(stopped[0].detail.as_deref().unwrap_or("").contains("boom"));
        assert!(svc.session("alex").is_some());

        let (updates, finished) = run_to_end(&mut svc, "alex");
        assert_eq!(updates.len(), 38);
        assert_eq!(finished.reason, "finished");
    }

    #[test]
    fn restarting_replaces_the_running_session() {
        let world = world_with(&["alex"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        svc.tick();
        svc.tick();

        start(&mut svc, "alex", &scene);
        let report = svc.tick();

        assert_eq!(report.stopped.len(), 1);
        assert_eq!(report.stopped[0].reason, "replaced");
        assert_eq!(report.updates[0].tick, 0);
        assert_eq!(world.entity_count(), 1);
        assert_eq!(svc.stats().sessions_started, 2);
    }

    #[test]
    fn shutdown_stops_everyone() {
        let world = world_with(&["alex", "blake"]);
        let mut svc = service(&world);
        let scene = base_scene("intro").into_shared();
        start(&mut svc, "alex", &scene);
        start(&mut svc, "blake", &scene);
        svc.tick();

        let stopped = svc.shutdown();

        assert_eq!(stopped.len(), 2);
        assert!(stopped.iter().all(|s| s.reason == "shutdown"));
        assert!(svc.active_viewers().is_empty());
        assert!(svc.is_idle());
        assert_eq!(world.entity_count(), 0);

        let stats = svc.stats();
        assert_eq!(stats.sessions_started, 2);
        assert_eq!(stats.sessions_stopped, 2);
        assert_eq!(stats.total_ticks, 1);
    }
}
