// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Visualization port trait defining the viewer contract.

use glam::{DMat4, DVec3};

use crate::{CameraPose, Simplex, VectorField, VisualizationError};

/// Viewer port.
///
/// Implementors display what they are told and nothing more. Structures are
/// keyed by an entity's unique name (`base_id`); obstacle visuals are keyed by
/// the name of the entity that owns the obstacle.
///
/// # Design
///
/// This trait is a hexagonal port. The coordinator pushes state; adapters
/// (a desktop viewer, a headless recorder) implement it. Only registration
/// can fail, everything else is best-effort on the adapter side.
pub trait VisualizationPort {
    /// Register (or re-register) a surface mesh in local coordinates.
    fn register_mesh(
        &mut self,
        name: &str,
        vertices: &[DVec3],
        simplices: &[Simplex],
        transform: &DMat4,
    ) -> Result<(), VisualizationError>;

    /// Remove a mesh together with its obstacle visual.
    fn remove_mesh(&mut self, name: &str);

    /// Remove every structure.
    fn remove_all(&mut self);

    /// Replace a mesh's local vertex positions.
    fn update_vertex_positions(&mut self, name: &str, vertices: &[DVec3]);

    /// Replace a mesh's transform.
    fn update_transform(&mut self, name: &str, transform: &DMat4);

    /// Attach or replace a per-vertex vector field.
    fn update_vector_field(&mut self, name: &str, field: VectorField, vectors: &[DVec3]);

    /// Detach a per-vertex vector field. Removing an absent field is a no-op.
    fn remove_vector_field(&mut self, name: &str, field: VectorField);

    /// Show (or refresh) the combined obstacle of `owner` in world space.
    fn update_obstacle(
        &mut self,
        owner: &str,
        vertices: &[DVec3],
        simplices: &[Simplex],
        visible: bool,
    );

    /// Drop the obstacle visual of `owner`, if any.
    fn remove_obstacle(&mut self, owner: &str);

    /// Toggle visibility of every obstacle visual.
    fn set_obstacles_visible(&mut self, visible: bool);

    /// Move the manipulation highlight (gizmo) from `old` to `new`.
    fn set_active_highlight(&mut self, old: Option<&str>, new: Option<&str>);

    /// Place the camera.
    fn set_camera(&mut self, camera: &CameraPose);

    /// Ask for a frame to be drawn.
    fn request_redraw(&mut self);
}
