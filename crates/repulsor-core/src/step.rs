// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Physics step coordinator.
//!
//! One iteration runs three phases:
//!
//! 1. **compute**: a world-space displacement for every simulated entity with
//!    a mesh. Nothing is mutated; any failure aborts the iteration.
//! 2. **apply**: each displacement is mapped into its entity's local frame and
//!    added to the local positions; the engine receives world positions and
//!    the viewer local ones. A failing entity is left untouched and the others
//!    still move.
//! 3. **reaggregate**: every obstacle is rebuilt and a redraw is requested.
//!    An obstacle the engine refuses keeps its previous geometry and fails
//!    the iteration, since later iterations would step against it.
//!
//! [`run_step`] stops at the first failing iteration. Earlier iterations are
//! not rolled back. Cache invalidation is the caller's job.

use glam::DVec3;
use repulsor_app_core::settings::Settings;
use repulsor_port::{EngineError, EntityId, PhysicsEngine, VisualizationPort};
use thiserror::Error;
use tracing::{debug, info_span, warn};

use crate::engine::EngineAdapter;
use crate::entity::{Entity, EntityError};
use crate::obstacle::{self, ObstacleError};
use crate::registry::SceneRegistry;
use crate::transform::{to_world, world_delta_to_local, TransformError};

/// Why applying a displacement to one entity failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyFailure {
    /// The entity's transform cannot be inverted.
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// The displacement has the wrong number of rows.
    #[error(transparent)]
    Entity(#[from] EntityError),
    /// The engine rejected the new positions.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Why one iteration failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    /// No simulated entity has an engine mesh.
    #[error("no simulated geometry to step")]
    EmptyGeometry,
    /// At least one displacement could not be computed; nothing moved.
    #[error("displacement failed for {} entities", .failures.len())]
    EngineComputation {
        /// Failing entities in blueprint order.
        failures: Vec<(EntityId, EngineError)>,
    },
    /// At least one entity could not be moved; the others were.
    #[error("apply failed for {} entities", .failures.len())]
    Apply {
        /// Failing entities in blueprint order.
        failures: Vec<(EntityId, ApplyFailure)>,
    },
    /// Every entity moved but some obstacles could not be rebuilt; those keep
    /// their previous geometry.
    #[error("obstacle refresh failed for {} entities", .failures.len())]
    Reaggregation {
        /// Refresh failures in blueprint order.
        failures: Vec<ObstacleError>,
    },
}

/// A multi-iteration step that stopped early.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("physics step stopped at iteration {iteration} after {completed} completed")]
pub struct StepFailure {
    /// Zero-based index of the failing iteration.
    pub iteration: usize,
    /// Iterations fully applied before it.
    pub completed: usize,
    /// What went wrong.
    #[source]
    pub error: StepError,
}

/// Runs up to `iterations` iterations, stopping at the first failure.
///
/// Returns the number of completed iterations. Zero iterations is a no-op.
pub fn run_step<E, V>(
    registry: &mut SceneRegistry<E::Mesh>,
    engine: &EngineAdapter<E>,
    viz: &mut V,
    settings: &Settings,
    iterations: usize,
) -> Result<usize, StepFailure>
where
    E: PhysicsEngine,
    V: VisualizationPort + ?Sized,
{
    for iteration in 0..iterations {
        let _span = info_span!("step", iteration).entered();
        if let Err(error) = run_iteration(registry, engine, viz, settings) {
            warn!(iteration, %error, "physics step iteration failed");
            return Err(StepFailure {
                iteration,
                completed: iteration,
                error,
            });
        }
    }
    debug!(iterations, "physics step finished");
    Ok(iterations)
}

fn run_iteration<E, V>(
    registry: &mut SceneRegistry<E::Mesh>,
    engine: &EngineAdapter<E>,
    viz: &mut V,
    settings: &Settings,
) -> Result<(), StepError>
where
    E: PhysicsEngine,
    V: VisualizationPort + ?Sized,
{
    let exponents = settings.engine.exponents;

    let mut displacements = Vec::new();
    let mut failures = Vec::new();
    for (index, entity) in registry.entities_mut().iter_mut().enumerate() {
        if !entity.is_simulated() {
            continue;
        }
        let id = entity.id();
        let Some(mesh) = entity.mesh_mut() else {
            continue;
        };
        match engine.world_displacement(mesh, exponents) {
            Ok(d) => displacements.push((index, d)),
            Err(err) => {
                warn!(entity = %id, ?err, "displacement failed");
                failures.push((id, err));
            }
        }
    }
    if displacements.is_empty() && failures.is_empty() {
        return Err(StepError::EmptyGeometry);
    }
    if !failures.is_empty() {
        return Err(StepError::EngineComputation { failures });
    }

    let mut apply_failures = Vec::new();
    let entities = registry.entities_mut();
    for (index, world_delta) in displacements {
        let entity = &mut entities[index];
        if let Err(err) = apply_displacement(entity, engine, viz, &world_delta) {
            warn!(entity = %entity.unique_name(), ?err, "apply failed");
            apply_failures.push((entity.id(), err));
        }
    }

    let refresh_failures = obstacle::refresh_all(
        registry,
        engine,
        viz,
        &settings.engine,
        settings.display.show_obstacles,
    );
    viz.request_redraw();

    if !apply_failures.is_empty() {
        return Err(StepError::Apply {
            failures: apply_failures,
        });
    }
    if !refresh_failures.is_empty() {
        return Err(StepError::Reaggregation {
            failures: refresh_failures,
        });
    }
    Ok(())
}

/// Moves one entity. On error the entity, its mesh and its visual are unchanged.
fn apply_displacement<E, V>(
    entity: &mut Entity<E::Mesh>,
    engine: &EngineAdapter<E>,
    viz: &mut V,
    world_delta: &[DVec3],
) -> Result<(), ApplyFailure>
where
    E: PhysicsEngine,
    V: VisualizationPort + ?Sized,
{
    let local_delta = world_delta_to_local(entity.transform(), world_delta)?;
    let moved = entity.displaced_local(&local_delta)?;
    let world = to_world(entity.transform(), &moved);
    if let Some(mesh) = entity.mesh_mut() {
        engine.sync_vertices(mesh, &world)?;
    }
    entity.set_local_vertices(moved)?;
    viz.update_vertex_positions(entity.unique_name(), entity.local_vertices());
    Ok(())
}
