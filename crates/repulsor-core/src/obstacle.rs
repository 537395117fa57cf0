// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Obstacle aggregation.
//!
//! An entity's obstacle is the concatenation of its sources' *current*
//! world-space geometry. Aggregation always reads the live transforms and
//! local positions; the only record kept is the geometry the engine last
//! accepted, which the viewer mirrors.

use glam::DVec3;
use repulsor_port::{
    EngineError, EngineSettings, EntityId, PhysicsEngine, Simplex, VisualizationPort,
    ALL_OTHER_SOURCES,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::EngineAdapter;
use crate::entity::Entity;
use crate::registry::SceneRegistry;

/// Decoded obstacle dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ObstacleSources {
    /// No obstacle.
    #[default]
    None,
    /// Every other obstacle-source entity (`[-1]`).
    AllOthers,
    /// Exactly these ids, when they are obstacle sources.
    Listed(Vec<EntityId>),
}

impl ObstacleSources {
    /// Decodes a blueprint list. Only the exact list `[-1]` means "all others".
    pub fn from_ids(ids: &[i32]) -> Self {
        match ids {
            [] => Self::None,
            [ALL_OTHER_SOURCES] => Self::AllOthers,
            _ => Self::Listed(ids.iter().copied().map(EntityId).collect()),
        }
    }

    /// Whether `candidate` contributes to `target`'s obstacle.
    pub fn selects<M>(&self, target: EntityId, candidate: &Entity<M>) -> bool {
        if candidate.id() == target || !candidate.is_obstacle_source() {
            return false;
        }
        match self {
            Self::None => false,
            Self::AllOthers => true,
            Self::Listed(ids) => ids.contains(&candidate.id()),
        }
    }
}

/// Combined world-space obstacle geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObstacleGeometry {
    /// Concatenated world-space vertices.
    pub vertices: Vec<DVec3>,
    /// Triangles with indices offset into `vertices`.
    pub simplices: Vec<Simplex>,
}

impl ObstacleGeometry {
    /// True when the obstacle should be cleared.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.simplices.is_empty()
    }
}

/// Aggregation or obstacle replacement failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObstacleError {
    /// The target id names no live entity.
    #[error("unknown obstacle target {0}")]
    UnknownTarget(EntityId),
    /// The target has no engine mesh to attach an obstacle to.
    #[error("entity {0} has no engine mesh")]
    NoMesh(EntityId),
    /// The combined vertex count does not fit a `u32` index.
    #[error("obstacle for {target} exceeds u32 vertex indices")]
    IndexOverflow {
        /// Target entity.
        target: EntityId,
    },
    /// Engine failure; the previous obstacle is still in place.
    #[error("obstacle engine call failed for {target}: {source}")]
    Engine {
        /// Target entity.
        target: EntityId,
        /// Engine failure.
        #[source]
        source: EngineError,
    },
}

/// Combines the current geometry of `target`'s obstacle sources.
///
/// Sources are visited in blueprint order. Each source's triangles are
/// re-indexed by the number of vertices appended before it. Sources with no
/// geometry are skipped. An empty result is a success meaning "no obstacle".
pub fn aggregate<M>(
    target: EntityId,
    entities: &[Entity<M>],
) -> Result<ObstacleGeometry, ObstacleError> {
    let owner = entities
        .iter()
        .find(|e| e.id() == target)
        .ok_or(ObstacleError::UnknownTarget(target))?;
    let sources = owner.obstacle_sources();

    let mut out = ObstacleGeometry::default();
    for source in entities.iter().filter(|e| sources.selects(target, *e)) {
        if source.is_geometry_empty() {
            warn!(target = %owner.unique_name(), source = %source.unique_name(), "skipping obstacle source without geometry");
            continue;
        }
        let offset =
            u32::try_from(out.vertices.len()).map_err(|_| ObstacleError::IndexOverflow { target })?;
        u32::try_from(out.vertices.len() + source.vertex_count())
            .map_err(|_| ObstacleError::IndexOverflow { target })?;
        out.vertices.extend(source.world_vertices());
        for simplex in source.simplices() {
            let mut shifted = [0; 3];
            for (dst, &src) in shifted.iter_mut().zip(simplex) {
                *dst = src
                    .checked_add(offset)
                    .ok_or(ObstacleError::IndexOverflow { target })?;
            }
            out.simplices.push(shifted);
        }
    }
    Ok(out)
}

/// Aggregates `target`'s obstacle and installs it in the engine.
///
/// Empty geometry clears the obstacle. If the engine cannot build the new
/// obstacle mesh, the previous one is left untouched, both in the engine and
/// in [`Entity::installed_obstacle`].
pub fn refresh_obstacle<E: PhysicsEngine>(
    registry: &mut SceneRegistry<E::Mesh>,
    engine: &EngineAdapter<E>,
    settings: &EngineSettings,
    target: EntityId,
) -> Result<ObstacleGeometry, ObstacleError> {
    let geometry = aggregate(target, registry.entities())?;
    let entity = registry
        .entity_mut(target)
        .ok_or(ObstacleError::UnknownTarget(target))?;
    let mesh = entity.mesh_mut().ok_or(ObstacleError::NoMesh(target))?;
    let engine_err = |source| ObstacleError::Engine { target, source };

    if geometry.is_empty() {
        engine.replace_obstacle(mesh, None).map_err(engine_err)?;
    } else {
        let obstacle = engine
            .construct_mesh(&geometry.vertices, &geometry.simplices, settings)
            .map_err(engine_err)?;
        engine
            .replace_obstacle(mesh, Some(obstacle))
            .map_err(engine_err)?;
    }
    entity.set_installed_obstacle((!geometry.is_empty()).then(|| geometry.clone()));
    debug!(%target, vertices = geometry.vertices.len(), "obstacle refreshed");
    Ok(geometry)
}

/// Refreshes the obstacle of every simulated entity and mirrors the result to
/// the viewer. Failures are logged and returned; they do not stop the others.
pub fn refresh_all<E, V>(
    registry: &mut SceneRegistry<E::Mesh>,
    engine: &EngineAdapter<E>,
    viz: &mut V,
    settings: &EngineSettings,
    show_obstacles: bool,
) -> Vec<ObstacleError>
where
    E: PhysicsEngine,
    V: VisualizationPort + ?Sized,
{
    let targets: Vec<(EntityId, String)> = registry
        .entities()
        .iter()
        .filter(|e| e.is_steppable())
        .map(|e| (e.id(), e.unique_name().to_owned()))
        .collect();

    let mut failures = Vec::new();
    for (id, name) in targets {
        match refresh_obstacle(registry, engine, settings, id) {
            Ok(geometry) if geometry.is_empty() => viz.remove_obstacle(&name),
            Ok(geometry) => {
                viz.update_obstacle(&name, &geometry.vertices, &geometry.simplices, show_obstacles);
            }
            Err(err) => {
                warn!(entity = %name, ?err, "obstacle refresh failed");
                failures.push(err);
            }
        }
    }
    failures
}

/// Re-pushes the obstacle each simulated entity last installed in the engine
/// to the viewer. Nothing is re-aggregated, so a refresh the engine refused
/// never shows up as a visual.
pub fn push_obstacle_visuals<M, V>(registry: &SceneRegistry<M>, viz: &mut V, visible: bool)
where
    V: VisualizationPort + ?Sized,
{
    for entity in registry.entities().iter().filter(|e| e.is_simulated()) {
        match entity.installed_obstacle() {
            Some(geometry) => viz.update_obstacle(
                entity.unique_name(),
                &geometry.vertices,
                &geometry.simplices,
                visible,
            ),
            None => viz.remove_obstacle(entity.unique_name()),
        }
    }
}
