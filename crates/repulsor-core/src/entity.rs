// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live scene entities.

use glam::{DMat4, DVec3};
use repulsor_port::{EntityBlueprint, EntityId, Simplex};
use thiserror::Error;

use crate::obstacle::{ObstacleGeometry, ObstacleSources};
use crate::transform::to_world;

/// Key shared with the engine and the viewer: `<base>_<id>`.
pub fn unique_name(base_name: &str, id: EntityId) -> String {
    format!("{base_name}_{id}")
}

/// Capability flags copied from the blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityFlags {
    /// User-selectable and movable.
    pub interactive: bool,
    /// Contributes to other entities' obstacles.
    pub obstacle_source: bool,
    /// Moved by the physics step.
    pub simulated: bool,
}

/// Vertex updates must preserve the vertex count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EntityError {
    /// A per-vertex field had the wrong length.
    #[error("vertex count mismatch: entity has {expected}, update has {actual}")]
    VertexCountMismatch {
        /// Vertices the entity has.
        expected: usize,
        /// Rows supplied.
        actual: usize,
    },
}

/// One entity of the loaded scene.
///
/// Topology is fixed at load time; the physics step perturbs local positions
/// in place. `M` is the engine mesh handle, present only for simulated
/// entities and owned exclusively by this entity.
#[derive(Debug)]
pub struct Entity<M> {
    id: EntityId,
    base_name: String,
    unique_name: String,
    flags: EntityFlags,
    simplices: Vec<Simplex>,
    local_vertices: Vec<DVec3>,
    transform: DMat4,
    obstacle_sources: ObstacleSources,
    mesh: Option<M>,
    installed_obstacle: Option<ObstacleGeometry>,
}

impl<M> Entity<M> {
    /// Builds the live entity from a blueprint. No engine mesh is attached yet.
    pub fn from_blueprint(blueprint: &EntityBlueprint) -> Self {
        Self {
            id: blueprint.id,
            base_name: blueprint.base_name.clone(),
            unique_name: unique_name(&blueprint.base_name, blueprint.id),
            flags: EntityFlags {
                interactive: blueprint.interactive,
                obstacle_source: blueprint.obstacle_source,
                simulated: blueprint.simulated,
            },
            simplices: blueprint.geometry.simplices.clone(),
            local_vertices: blueprint.geometry.vertices.clone(),
            transform: blueprint.transform,
            obstacle_sources: ObstacleSources::from_ids(&blueprint.obstacle_ids),
            mesh: None,
            installed_obstacle: None,
        }
    }

    /// Scene-stable id.
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Blueprint base name.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Cross-reference key for adapters.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// Capability flags.
    pub const fn flags(&self) -> EntityFlags {
        self.flags
    }

    /// See [`EntityFlags::interactive`].
    pub const fn is_interactive(&self) -> bool {
        self.flags.interactive
    }

    /// See [`EntityFlags::obstacle_source`].
    pub const fn is_obstacle_source(&self) -> bool {
        self.flags.obstacle_source
    }

    /// See [`EntityFlags::simulated`].
    pub const fn is_simulated(&self) -> bool {
        self.flags.simulated
    }

    /// Triangle topology.
    pub fn simplices(&self) -> &[Simplex] {
        &self.simplices
    }

    /// Current local-frame positions.
    pub fn local_vertices(&self) -> &[DVec3] {
        &self.local_vertices
    }

    /// Number of vertices; fixed for the entity's lifetime.
    pub fn vertex_count(&self) -> usize {
        self.local_vertices.len()
    }

    /// True when there is no geometry to contribute.
    pub fn is_geometry_empty(&self) -> bool {
        self.local_vertices.is_empty() || self.simplices.is_empty()
    }

    /// Current transform.
    pub const fn transform(&self) -> &DMat4 {
        &self.transform
    }

    /// Decoded obstacle dependency list.
    pub const fn obstacle_sources(&self) -> &ObstacleSources {
        &self.obstacle_sources
    }

    /// Engine mesh handle, if one was built.
    pub const fn mesh(&self) -> Option<&M> {
        self.mesh.as_ref()
    }

    pub(crate) fn mesh_mut(&mut self) -> Option<&mut M> {
        self.mesh.as_mut()
    }

    pub(crate) fn attach_mesh(&mut self, mesh: M) {
        self.mesh = Some(mesh);
    }

    /// Obstacle geometry the engine last accepted for this entity. `None`
    /// until a refresh succeeds or after one cleared the obstacle.
    pub const fn installed_obstacle(&self) -> Option<&ObstacleGeometry> {
        self.installed_obstacle.as_ref()
    }

    pub(crate) fn set_installed_obstacle(&mut self, geometry: Option<ObstacleGeometry>) {
        self.installed_obstacle = geometry;
    }

    /// True for simulated entities whose engine mesh exists.
    pub const fn is_steppable(&self) -> bool {
        self.flags.simulated && self.mesh.is_some()
    }

    /// Local positions mapped through the current transform. Always recomputed.
    pub fn world_vertices(&self) -> Vec<DVec3> {
        to_world(&self.transform, &self.local_vertices)
    }

    pub(crate) fn set_transform(&mut self, transform: DMat4) {
        self.transform = transform;
    }

    /// Local positions after adding `delta`, without modifying the entity.
    pub fn displaced_local(&self, delta: &[DVec3]) -> Result<Vec<DVec3>, EntityError> {
        if delta.len() != self.local_vertices.len() {
            return Err(EntityError::VertexCountMismatch {
                expected: self.local_vertices.len(),
                actual: delta.len(),
            });
        }
        Ok(self
            .local_vertices
            .iter()
            .zip(delta)
            .map(|(p, d)| *p + *d)
            .collect())
    }

    /// Replaces local positions; the count must not change.
    pub(crate) fn set_local_vertices(&mut self, vertices: Vec<DVec3>) -> Result<(), EntityError> {
        if vertices.len() != self.local_vertices.len() {
            return Err(EntityError::VertexCountMismatch {
                expected: self.local_vertices.len(),
                actual: vertices.len(),
            });
        }
        self.local_vertices = vertices;
        Ok(())
    }
}
