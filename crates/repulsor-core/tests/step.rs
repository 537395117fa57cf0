// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic, clippy::cast_sign_loss)]

use approx::assert_relative_eq;
use glam::{DMat4, DQuat, DVec3};
use repulsor_app_core::settings::Settings;
use repulsor_core::{
    run_step, ApplyFailure, EngineAdapter, ObstacleError, SceneRegistry, StepError, StepFailure,
    TransformError,
};
use repulsor_dry_tests::{
    mover_and_wall, triangle, trio_all_simulated, EngineOp, MockEngine, MockMesh, RecordingViz,
};
use repulsor_port::{
    EngineError, EngineSettings, EntityBlueprint, EntityId, SceneDefinition, VisualizationPort,
};

const STEP: DVec3 = DVec3::new(0.0, 0.0, -0.1);

struct Rig {
    engine: MockEngine,
    adapter: EngineAdapter<MockEngine>,
    registry: SceneRegistry<MockMesh>,
    viz: RecordingViz,
    settings: Settings,
}

impl Rig {
    fn new(definition: SceneDefinition) -> Self {
        let engine = MockEngine::new();
        let adapter = EngineAdapter::new(engine.clone());
        let mut registry = SceneRegistry::new();
        registry
            .load(definition, &adapter, &EngineSettings::default())
            .unwrap();
        let mut viz = RecordingViz::new();
        for entity in registry.entities() {
            viz.register_mesh(
                entity.unique_name(),
                entity.local_vertices(),
                entity.simplices(),
                entity.transform(),
            )
            .unwrap();
        }
        Self {
            engine,
            adapter,
            registry,
            viz,
            settings: Settings::default(),
        }
    }

    fn step(&mut self, iterations: usize) -> Result<usize, StepFailure> {
        run_step(
            &mut self.registry,
            &self.adapter,
            &mut self.viz,
            &self.settings,
            iterations,
        )
    }

    fn world(&self, id: i32) -> Vec<DVec3> {
        self.registry.entity(EntityId(id)).unwrap().world_vertices()
    }
}

fn shifted(vertices: &[DVec3], by: DVec3) -> Vec<DVec3> {
    vertices.iter().map(|v| *v + by).collect()
}

fn assert_close(actual: &[DVec3], expected: &[DVec3]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(a.x, e.x, epsilon = 1e-12);
        assert_relative_eq!(a.y, e.y, epsilon = 1e-12);
        assert_relative_eq!(a.z, e.z, epsilon = 1e-12);
    }
}

#[test]
fn every_simulated_entity_moves_by_its_displacement() {
    let mut rig = Rig::new(trio_all_simulated());
    let before: Vec<_> = (0..3).map(|id| rig.world(id)).collect();

    assert_eq!(rig.step(2), Ok(2));

    for id in 0..3 {
        let expected = shifted(&before[id as usize], STEP * 2.0);
        assert_close(&rig.world(id), &expected);
        let mesh = rig.registry.entity(EntityId(id)).unwrap().mesh().unwrap();
        assert_close(&mesh.vertices, &expected);
    }
    assert_eq!(rig.viz.redraw_count, 2);
}

#[test]
fn displacement_is_applied_through_the_inverse_transform() {
    let transform = DMat4::from_scale_rotation_translation(
        DVec3::splat(2.0),
        DQuat::from_rotation_y(0.7),
        DVec3::new(1.0, -2.0, 0.5),
    );
    let definition = SceneDefinition::new("posed").with_entity(
        EntityBlueprint::new(4, "posed", triangle())
            .simulated()
            .with_transform(transform),
    );
    let mut rig = Rig::new(definition);
    let before = rig.world(4);

    assert_eq!(rig.step(1), Ok(1));

    let entity = rig.registry.entity(EntityId(4)).unwrap();
    assert_eq!(entity.transform(), &transform);
    assert_close(&entity.world_vertices(), &shifted(&before, STEP));
    assert_close(
        &rig.viz.meshes["posed_4"].vertices,
        entity.local_vertices(),
    );
}

#[test]
fn failed_iteration_keeps_earlier_iterations() {
    let mut rig = Rig::new(trio_all_simulated());
    let before: Vec<_> = (0..3).map(|id| rig.world(id)).collect();
    rig.engine
        .fail_after(EngineOp::ComputeDifferential, Some(1), 1);

    let failure = rig.step(3).unwrap_err();

    assert_eq!(failure.iteration, 1);
    assert_eq!(failure.completed, 1);
    match failure.error {
        StepError::EngineComputation { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, EntityId(1));
        }
        other => panic!("unexpected error {other:?}"),
    }
    // iteration 0 stays applied for everyone, iteration 1 moved nobody
    for id in 0..3 {
        assert_close(&rig.world(id), &shifted(&before[id as usize], STEP));
    }
}

#[test]
fn engine_panics_abort_the_iteration_without_moving_anything() {
    let mut rig = Rig::new(trio_all_simulated());
    let before = rig.world(0);
    rig.engine.panic_on(EngineOp::MaxSafeStep, Some(2));

    let failure = rig.step(1).unwrap_err();

    assert_eq!(failure.completed, 0);
    assert!(matches!(
        &failure.error,
        StepError::EngineComputation { failures }
            if matches!(failures[0].1, EngineError::Panicked { op: "max_safe_step", .. })
    ));
    assert_eq!(rig.world(0), before);
}

#[test]
fn singular_transform_fails_only_that_entity() {
    let definition = SceneDefinition::new("flat")
        .with_entity(EntityBlueprint::new(0, "ok", triangle()).simulated())
        .with_entity(
            EntityBlueprint::new(1, "flat", triangle())
                .simulated()
                .with_transform(DMat4::from_scale(DVec3::new(1.0, 0.0, 1.0))),
        );
    let mut rig = Rig::new(definition);
    let ok_before = rig.world(0);
    let flat_before = rig.registry.entity(EntityId(1)).unwrap().local_vertices().to_vec();
    rig.engine.clear_calls();

    let failure = rig.step(1).unwrap_err();

    assert_eq!(failure.completed, 0);
    match failure.error {
        StepError::Apply { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, EntityId(1));
            assert!(matches!(
                failures[0].1,
                ApplyFailure::Transform(TransformError::Singular { .. })
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_close(&rig.world(0), &shifted(&ok_before, STEP));
    assert_eq!(rig.registry.entity(EntityId(1)).unwrap().local_vertices(), &flat_before[..]);
    // obstacles are still refreshed and a frame requested
    assert_eq!(rig.engine.call_count(EngineOp::ReplaceObstacle), 2);
    assert_eq!(rig.viz.redraw_count, 1);
}

#[test]
fn rejected_positions_leave_the_entity_untouched() {
    let mut rig = Rig::new(trio_all_simulated());
    let before = rig.world(2);
    rig.engine.fail_mesh(EngineOp::UpdateVertices, 2);

    let failure = rig.step(1).unwrap_err();

    assert!(matches!(
        &failure.error,
        StepError::Apply { failures } if failures.len() == 1
            && matches!(failures[0].1, ApplyFailure::Engine(_))
    ));
    assert_eq!(rig.world(2), before);
    assert_eq!(rig.viz.meshes["body2_2"].vertices, before);
}

#[test]
fn nothing_to_step_is_empty_geometry() {
    let static_only = SceneDefinition::new("static")
        .with_entity(EntityBlueprint::new(0, "rock", triangle()).obstacle_source());
    let mut rig = Rig::new(static_only);
    assert_eq!(
        rig.step(1),
        Err(StepFailure {
            iteration: 0,
            completed: 0,
            error: StepError::EmptyGeometry,
        })
    );

    let mut empty = Rig::new(SceneDefinition::new("void"));
    assert_eq!(empty.step(2).unwrap_err().error, StepError::EmptyGeometry);
}

#[test]
fn zero_iterations_do_nothing() {
    let mut rig = Rig::new(mover_and_wall());
    rig.engine.clear_calls();
    assert_eq!(rig.step(0), Ok(0));
    assert!(rig.engine.calls().is_empty());
    assert_eq!(rig.viz.redraw_count, 0);
}

#[test]
fn obstacles_follow_the_moved_sources() {
    let mut rig = Rig::new(trio_all_simulated());
    rig.settings.display.show_obstacles = true;
    rig.step(1).unwrap();

    let obstacle = &rig.viz.obstacles["body0_0"];
    assert!(obstacle.visible);
    let mut expected = rig.world(1);
    expected.extend(rig.world(2));
    assert_close(&obstacle.vertices, &expected);
    assert_eq!(obstacle.simplices, vec![[0, 1, 2], [3, 4, 5]]);
}

#[test]
fn refused_obstacle_rebuild_stops_the_step() {
    let mut rig = Rig::new(trio_all_simulated());
    let before = rig.world(0);
    rig.engine.fail(EngineOp::ConstructMesh);

    let failure = rig.step(3).unwrap_err();

    assert_eq!(failure.iteration, 0);
    assert_eq!(failure.completed, 0);
    match failure.error {
        StepError::Reaggregation { failures } => {
            let targets: Vec<EntityId> = failures
                .iter()
                .map(|err| match err {
                    ObstacleError::Engine { target, .. } => *target,
                    other => panic!("unexpected refresh error {other:?}"),
                })
                .collect();
            assert_eq!(targets, vec![EntityId(0), EntityId(1), EntityId(2)]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // the iteration's moves stand; only the obstacles are stale
    assert_close(&rig.world(0), &shifted(&before, STEP));
    assert!(rig.viz.obstacles.is_empty());
    assert_eq!(rig.viz.redraw_count, 1);
}

#[test]
fn apply_failures_outrank_refresh_failures() {
    let mut rig = Rig::new(trio_all_simulated());
    rig.engine.fail_mesh(EngineOp::UpdateVertices, 1);
    rig.engine.fail(EngineOp::ConstructMesh);

    let failure = rig.step(1).unwrap_err();

    assert!(matches!(
        &failure.error,
        StepError::Apply { failures } if failures.len() == 1 && failures[0].0 == EntityId(1)
    ));
}
