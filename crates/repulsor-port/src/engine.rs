// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Physics engine port.

use glam::DVec3;

use crate::{EngineError, Exponents, Simplex, SolveParams, TreeSettings};

/// Numerical engine driven by the coordinator.
///
/// Implementors own the heavy lifting: mesh data structures, the energy
/// functional, the metric solve, and collision-safe step sizes. The
/// coordinator owns every [`Self::Mesh`] it receives (one per simulated
/// entity, exclusively) and hands them back by reference; obstacle meshes are
/// moved into their primary mesh through [`Self::replace_obstacle`] and are
/// dropped with it.
///
/// Methods take `&self`; engines that keep bookkeeping use interior
/// mutability. Calls are synchronous and blocking from the caller's side even
/// when the engine parallelises internally.
pub trait PhysicsEngine {
    /// Opaque mesh handle.
    type Mesh;
    /// Opaque energy/metric parameter object built from [`Exponents`].
    type Energy;

    /// Builds a mesh from world-space vertices and triangles.
    fn construct_mesh(
        &self,
        vertices: &[DVec3],
        simplices: &[Simplex],
        thread_count: usize,
    ) -> Result<Self::Mesh, EngineError>;

    /// Builds the energy/metric pair for the given exponents.
    fn build_energy(&self, exponents: Exponents) -> Result<Self::Energy, EngineError>;

    /// Applies tree/separation/refinement thresholds to a mesh.
    fn apply_parameters(
        &self,
        mesh: &mut Self::Mesh,
        settings: &TreeSettings,
    ) -> Result<(), EngineError>;

    /// Replaces the mesh's obstacle wholesale, or clears it with `None`.
    fn replace_obstacle(
        &self,
        mesh: &mut Self::Mesh,
        obstacle: Option<Self::Mesh>,
    ) -> Result<(), EngineError>;

    /// Overwrites the mesh's vertex coordinates (world space) in place.
    fn update_vertex_coordinates(
        &self,
        mesh: &mut Self::Mesh,
        world: &[DVec3],
    ) -> Result<(), EngineError>;

    /// Number of vertices in the mesh.
    fn vertex_count(&self, mesh: &Self::Mesh) -> usize;

    /// Current vertex coordinates as the engine sees them.
    fn vertex_coordinates(&self, mesh: &Self::Mesh) -> Result<Vec<DVec3>, EngineError>;

    /// Energy value of the mesh (including its obstacle).
    fn compute_energy(
        &self,
        energy: &Self::Energy,
        mesh: &mut Self::Mesh,
    ) -> Result<f64, EngineError>;

    /// Per-vertex differential of the energy.
    fn compute_differential(
        &self,
        energy: &Self::Energy,
        mesh: &mut Self::Mesh,
    ) -> Result<Vec<DVec3>, EngineError>;

    /// Solves the metric system for the given right-hand side.
    fn solve_metric(
        &self,
        energy: &Self::Energy,
        mesh: &mut Self::Mesh,
        rhs: &[DVec3],
        params: SolveParams,
    ) -> Result<Vec<DVec3>, EngineError>;

    /// Largest multiplier `t <= upper_bound` such that moving every vertex by
    /// `t * direction` avoids intersections.
    fn max_safe_step(
        &self,
        mesh: &mut Self::Mesh,
        direction: &[DVec3],
        upper_bound: f64,
    ) -> Result<f64, EngineError>;
}
