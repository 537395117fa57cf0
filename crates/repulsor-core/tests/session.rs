// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::float_cmp)]
//! Session tests share the process-wide single-instance guard, so each one
//! holds `SERIAL` for its whole body.

use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::{DMat4, DVec3};
use repulsor_app_core::diagnostics::Severity;
use repulsor_app_core::settings::Settings;
use repulsor_core::{CacheState, SceneError, Session, SessionError, StepError};
use repulsor_dry_tests::{
    mover_and_wall, trio_all_simulated, EngineOp, InMemorySceneSource, MockEngine, RecordingViz,
};
use repulsor_port::{
    Axis, CameraPose, EngineError, EngineSettings, EntityId, Exponents, SceneSourceError,
    VectorField,
};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn session_with(settings: Settings) -> (MockEngine, Session<MockEngine, RecordingViz>) {
    let engine = MockEngine::new();
    let session = Session::new(engine.clone(), RecordingViz::new(), settings).unwrap();
    (engine, session)
}

fn session() -> (MockEngine, Session<MockEngine, RecordingViz>) {
    session_with(Settings::default())
}

fn has(session: &Session<MockEngine, RecordingViz>, severity: Severity) -> bool {
    session.diagnostics().iter().any(|d| d.severity == severity)
}

#[test]
fn only_one_session_at_a_time() {
    let _serial = serial();
    let (_, first) = session();
    assert!(matches!(
        Session::new(MockEngine::new(), RecordingViz::new(), Settings::default()),
        Err(SessionError::AlreadyRunning)
    ));
    drop(first);
    assert!(Session::new(MockEngine::new(), RecordingViz::new(), Settings::default()).is_ok());
}

#[test]
fn construction_normalizes_settings() {
    let _serial = serial();
    let mut settings = Settings::default();
    settings.engine.thread_count = 0;
    settings.debug.verbosity = 7;
    let (_, session) = session_with(settings);
    assert_eq!(session.settings().engine.thread_count, 1);
    assert_eq!(session.settings().debug.verbosity, 2);
    assert_eq!(session.diagnostics().min_severity(), Severity::Info);
}

#[test]
fn loading_pushes_meshes_camera_obstacles_and_highlight() {
    let _serial = serial();
    let (_, mut session) = session();
    let camera = CameraPose {
        position: DVec3::new(4.0, 4.0, 4.0),
        target: DVec3::ZERO,
        up: Axis::PosZ,
        front: Axis::NegY,
    };
    session.load_scene(mover_and_wall().with_camera(camera)).unwrap();

    let viz = session.viz();
    assert_eq!(viz.mesh_names(), vec!["mover_0".to_owned(), "wall_1".to_owned()]);
    assert_eq!(viz.camera, Some(camera));
    assert_eq!(viz.highlight.as_deref(), Some("mover_0"));
    let obstacle = &viz.obstacles["mover_0"];
    assert!(!obstacle.visible);
    assert_eq!(obstacle.vertices[0], DVec3::new(0.0, 0.0, 2.0));
    assert!(viz.redraw_count >= 1);

    let mesh = session.registry().entity(EntityId(0)).unwrap().mesh().unwrap();
    assert!(mesh.obstacle.is_some());
}

#[test]
fn failed_load_leaves_nothing_behind() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(trio_all_simulated()).unwrap();
    engine.fail(EngineOp::ConstructMesh);

    let err = session.load_scene(mover_and_wall()).unwrap_err();

    assert!(matches!(
        err,
        SessionError::Scene(SceneError::MeshConstruction { .. })
    ));
    assert!(session.registry().is_empty());
    assert!(session.viz().meshes.is_empty());
    assert!(has(&session, Severity::Error));
}

#[test]
fn unknown_scene_id_is_reported() {
    let _serial = serial();
    let (_, mut session) = session();
    let source = InMemorySceneSource::new().with_scene("pair", mover_and_wall());

    session.load_scene_from(&source, "pair").unwrap();
    assert_eq!(session.registry().len(), 2);

    let err = session.load_scene_from(&source, "nope").unwrap_err();
    assert!(matches!(err, SessionError::Source(SceneSourceError::NotFound(ref id)) if id == "nope"));
    assert!(has(&session, Severity::Error));
    // the current scene survives a source failure
    assert_eq!(session.registry().len(), 2);
}

#[test]
fn rejected_visual_is_only_a_warning() {
    let _serial = serial();
    let viz = RecordingViz::new().failing_register("wall_1");
    let mut session = Session::new(MockEngine::new(), viz, Settings::default()).unwrap();
    session.load_scene(mover_and_wall()).unwrap();
    assert_eq!(session.registry().len(), 2);
    assert_eq!(session.viz().mesh_names(), vec!["mover_0".to_owned()]);
    assert!(has(&session, Severity::Warning));
}

#[test]
fn moving_a_source_rebuilds_dependent_obstacles() {
    let _serial = serial();
    let (_, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    let shift = DMat4::from_translation(DVec3::X * 3.0);

    assert!(matches!(
        session.update_entity_transform(EntityId(9), shift),
        Err(SessionError::UnknownEntity(EntityId(9)))
    ));
    assert!(!session.update_entity_transform(EntityId(1), DMat4::IDENTITY).unwrap());
    assert!(session.update_entity_transform(EntityId(1), shift).unwrap());

    assert_eq!(session.viz().meshes["wall_1"].transform, shift);
    let mover = session.registry().entity(EntityId(0)).unwrap().mesh().unwrap();
    let obstacle = mover.obstacle.as_ref().unwrap();
    assert_eq!(obstacle.vertices[0], DVec3::new(3.0, 0.0, 2.0));
    assert_eq!(
        session.viz().obstacles["mover_0"].vertices[0],
        DVec3::new(3.0, 0.0, 2.0)
    );
}

#[test]
fn moving_a_simulated_entity_syncs_the_engine() {
    let _serial = serial();
    let (_, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    let shift = DMat4::from_translation(DVec3::Y);

    session.update_entity_transform(EntityId(0), shift).unwrap();

    let entity = session.registry().entity(EntityId(0)).unwrap();
    assert_eq!(entity.mesh().unwrap().vertices, entity.world_vertices());
    assert_eq!(entity.mesh().unwrap().vertices[0], DVec3::Y);
}

#[test]
fn rejected_move_keeps_the_old_placement() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    session.diagnostics_mut().drain();
    engine.fail_mesh(EngineOp::UpdateVertices, 0);

    let err = session
        .update_entity_transform(EntityId(0), DMat4::from_translation(DVec3::Y * 5.0))
        .unwrap_err();

    assert!(matches!(err, SessionError::Engine(EngineError::Computation(_))));
    let entity = session.registry().entity(EntityId(0)).unwrap();
    assert_eq!(*entity.transform(), DMat4::IDENTITY);
    assert_eq!(entity.mesh().unwrap().vertices, entity.world_vertices());
    assert_eq!(session.viz().meshes["mover_0"].transform, DMat4::IDENTITY);
    assert!(has(&session, Severity::Warning));
}

#[test]
fn refused_obstacle_keeps_showing_the_installed_one() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    session.diagnostics_mut().drain();
    engine.fail(EngineOp::ConstructMesh);

    assert!(session
        .update_entity_transform(EntityId(1), DMat4::from_translation(DVec3::X * 3.0))
        .unwrap());
    assert!(has(&session, Severity::Warning));

    let installed = DVec3::new(0.0, 0.0, 2.0);
    let mover = session.registry().entity(EntityId(0)).unwrap();
    assert_eq!(mover.mesh().unwrap().obstacle.as_ref().unwrap().vertices[0], installed);
    assert_eq!(mover.installed_obstacle().unwrap().vertices[0], installed);

    session.set_show_obstacles(true);
    let shown = &session.viz().obstacles["mover_0"];
    assert!(shown.visible);
    assert_eq!(shown.vertices[0], installed);
}

#[test]
fn transform_change_clears_stale_vectors() {
    let _serial = serial();
    let (_, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    assert!(session.request_differentials());
    assert!(session.viz().field("mover_0", VectorField::Differential).is_some());

    session
        .update_entity_transform(EntityId(0), DMat4::from_translation(DVec3::Z))
        .unwrap();

    assert_eq!(session.cache().state(), CacheState::Invalid);
    assert!(session.viz().field("mover_0", VectorField::Differential).is_none());
}

#[test]
fn real_time_flags_recompute_after_changes() {
    let _serial = serial();
    let mut settings = Settings::default();
    settings.interactivity.real_time_differential = true;
    settings.interactivity.real_time_gradient = true;
    let (_, mut session) = session_with(settings);
    session.load_scene(mover_and_wall()).unwrap();

    session
        .update_entity_transform(EntityId(0), DMat4::from_translation(DVec3::Z))
        .unwrap();

    assert_eq!(session.cache().state(), CacheState::DifferentialsAndGradientsValid);
    assert!(session.viz().field("mover_0", VectorField::Gradient).is_some());
}

#[test]
fn gradients_compute_missing_differentials_first() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();

    assert!(session.request_gradients());

    assert_eq!(engine.call_count(EngineOp::ComputeDifferential), 1);
    assert_eq!(session.cache().state(), CacheState::DifferentialsAndGradientsValid);
    assert!(session.viz().field("mover_0", VectorField::Gradient).is_some());
    assert!(session.viz().field("mover_0", VectorField::Differential).is_some());
}

#[test]
fn gradients_fail_when_differentials_fail() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    engine.fail(EngineOp::ComputeDifferential);

    assert!(!session.request_gradients());

    assert_eq!(engine.call_count(EngineOp::SolveMetric), 0);
    assert!(session.cache().gradient(EntityId(0)).is_none());
    assert!(has(&session, Severity::Warning));
}

#[test]
fn stepping_runs_configured_iterations_and_invalidates() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    session.request_differentials();
    session.set_iterations_per_step(2);

    assert_eq!(session.step().unwrap(), 2);

    assert_eq!(engine.call_count(EngineOp::MaxSafeStep), 2);
    assert_eq!(session.cache().state(), CacheState::Invalid);
    let entity = session.registry().entity(EntityId(0)).unwrap();
    assert_eq!(entity.local_vertices()[0], DVec3::new(0.0, 0.0, -0.2));
}

#[test]
fn zero_iterations_touch_nothing() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    engine.clear_calls();
    let redraws = session.viz().redraw_count;

    assert_eq!(session.run_physics_step(0).unwrap(), 0);
    assert!(engine.calls().is_empty());
    assert_eq!(session.viz().redraw_count, redraws);
}

#[test]
fn failed_step_is_reported() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    engine.fail(EngineOp::SolveMetric);

    let err = session.run_physics_step(3).unwrap_err();

    assert!(matches!(err, SessionError::Step(ref f) if f.iteration == 0 && f.completed == 0));
    assert!(has(&session, Severity::Error));
}

#[test]
fn refused_obstacle_rebuild_fails_the_step_with_warnings() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(trio_all_simulated()).unwrap();
    session.diagnostics_mut().drain();
    engine.fail(EngineOp::ConstructMesh);

    let err = session.run_physics_step(2).unwrap_err();

    assert!(matches!(
        err,
        SessionError::Step(ref f)
            if f.completed == 0
                && matches!(&f.error, StepError::Reaggregation { failures } if failures.len() == 3)
    ));
    let warnings = session
        .diagnostics()
        .iter()
        .filter(|d| d.severity == Severity::Warning && d.message.contains("obstacle"))
        .count();
    assert_eq!(warnings, 3);
}

#[test]
fn energy_report_tells_zero_from_failure() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(trio_all_simulated()).unwrap();
    engine.set_energy(0, 0.0);
    engine.fail_mesh(EngineOp::ComputeEnergy, 1);

    let readings = session.energy_report();

    assert_eq!(readings.len(), 3);
    assert_eq!(readings[0].name, "body0_0");
    assert_eq!(readings[0].energy, Ok(0.0));
    assert!(matches!(readings[1].energy, Err(EngineError::Computation(_))));
    assert_eq!(readings[2].energy, Ok(3.0));
}

#[test]
fn engine_state_is_shown_in_world_space() {
    let _serial = serial();
    let (_, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    session
        .update_entity_transform(EntityId(0), DMat4::from_translation(DVec3::X))
        .unwrap();

    session.show_engine_state(EntityId(0)).unwrap();

    let debug = &session.viz().meshes["mover_0_DebugState"];
    assert_eq!(debug.transform, DMat4::IDENTITY);
    assert_eq!(debug.vertices[0], DVec3::X);
    assert!(matches!(
        session.show_engine_state(EntityId(1)),
        Err(SessionError::NoMesh(EntityId(1)))
    ));
    assert!(matches!(
        session.show_engine_state(EntityId(5)),
        Err(SessionError::UnknownEntity(EntityId(5)))
    ));
}

#[test]
fn obstacle_visibility_toggles() {
    let _serial = serial();
    let (_, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();

    session.set_show_obstacles(true);
    assert!(session.viz().obstacles["mover_0"].visible);
    assert!(session.settings().display.show_obstacles);

    session.set_show_obstacles(false);
    assert!(!session.viz().obstacles["mover_0"].visible);
}

#[test]
fn selection_follows_interactive_entities_only() {
    let _serial = serial();
    let (_, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();

    assert!(!session.set_active_entity(Some(EntityId(1))));
    assert_eq!(session.viz().highlight.as_deref(), Some("mover_0"));
    assert!(session.set_active_entity(None));
    assert_eq!(session.viz().highlight, None);
    assert!(session.set_active_entity(Some(EntityId(0))));
    assert_eq!(session.viz().highlight.as_deref(), Some("mover_0"));
}

#[test]
fn verbosity_is_clamped() {
    let _serial = serial();
    let (_, mut session) = session();
    session.set_verbosity(0);
    assert_eq!(session.diagnostics().min_severity(), Severity::Error);
    session.set_verbosity(200);
    assert_eq!(session.settings().debug.verbosity, 2);
    assert_eq!(session.diagnostics().min_severity(), Severity::Info);
}

#[test]
fn engine_settings_rebuild_energy_and_reapply_tree() {
    let _serial = serial();
    let (engine, mut session) = session();
    session.load_scene(mover_and_wall()).unwrap();
    let mut next = EngineSettings::default();
    next.exponents = Exponents { q: 4.0, p: 8.0 };
    next.tree.theta = 0.5;

    session.update_engine_settings(next).unwrap();

    assert_eq!(engine.energies_built().last(), Some(&next.exponents));
    let mesh = session.registry().entity(EntityId(0)).unwrap().mesh().unwrap();
    assert_eq!(mesh.tree.unwrap().theta, 0.5);
    assert_eq!(session.settings().engine.exponents, next.exponents);

    engine.fail(EngineOp::BuildEnergy);
    next.exponents.q = 5.0;
    assert!(matches!(
        session.update_engine_settings(next),
        Err(SessionError::Engine(EngineError::EnergyUnavailable(_)))
    ));
}
