// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording visualization port for headless tests.
//!
//! [`RecordingViz`] keeps the viewer's state in maps so tests can assert what
//! would be on screen without any rendering.

use std::collections::{BTreeMap, BTreeSet};

use repulsor_port::{
    CameraPose, DMat4, DVec3, Simplex, VectorField, VisualizationError, VisualizationPort,
};

/// Registered surface mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct VizMesh {
    /// Local vertex positions.
    pub vertices: Vec<DVec3>,
    /// Triangles.
    pub simplices: Vec<Simplex>,
    /// Current transform.
    pub transform: DMat4,
}

/// Obstacle visual attached to an owner mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct VizObstacle {
    /// World-space vertices.
    pub vertices: Vec<DVec3>,
    /// Triangles.
    pub simplices: Vec<Simplex>,
    /// Visibility flag.
    pub visible: bool,
}

/// Visualization port that records state instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingViz {
    /// Registered meshes by unique name.
    pub meshes: BTreeMap<String, VizMesh>,
    /// Attached vector fields.
    pub vector_fields: BTreeMap<(String, VectorField), Vec<DVec3>>,
    /// Obstacle visuals by owner name.
    pub obstacles: BTreeMap<String, VizObstacle>,
    /// Structure currently carrying the gizmo.
    pub highlight: Option<String>,
    /// Every highlight transition received.
    pub highlight_log: Vec<(Option<String>, Option<String>)>,
    /// Every vector field removal received.
    pub field_removals: Vec<(String, VectorField)>,
    /// Last camera pose.
    pub camera: Option<CameraPose>,
    /// Number of redraw requests.
    pub redraw_count: u32,
    /// Number of `remove_all` calls.
    pub clear_count: u32,
    /// Names whose registration fails.
    pub fail_register: BTreeSet<String>,
}

impl RecordingViz {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make registration of `name` fail.
    #[must_use]
    pub fn failing_register(mut self, name: &str) -> Self {
        self.fail_register.insert(name.to_owned());
        self
    }

    /// Vector field attached to `name`, if any.
    pub fn field(&self, name: &str, field: VectorField) -> Option<&Vec<DVec3>> {
        self.vector_fields.get(&(name.to_owned(), field))
    }

    /// Number of attached fields of kind `field`.
    pub fn field_count(&self, field: VectorField) -> usize {
        self.vector_fields.keys().filter(|(_, f)| *f == field).count()
    }

    /// Registered mesh names in sorted order.
    pub fn mesh_names(&self) -> Vec<String> {
        self.meshes.keys().cloned().collect()
    }
}

impl VisualizationPort for RecordingViz {
    fn register_mesh(
        &mut self,
        name: &str,
        vertices: &[DVec3],
        simplices: &[Simplex],
        transform: &DMat4,
    ) -> Result<(), VisualizationError> {
        if self.fail_register.contains(name) {
            return Err(VisualizationError::Registration {
                name: name.to_owned(),
                reason: "scripted failure".into(),
            });
        }
        self.meshes.insert(
            name.to_owned(),
            VizMesh {
                vertices: vertices.to_vec(),
                simplices: simplices.to_vec(),
                transform: *transform,
            },
        );
        Ok(())
    }

    fn remove_mesh(&mut self, name: &str) {
        self.meshes.remove(name);
        self.obstacles.remove(name);
        self.vector_fields.retain(|(owner, _), _| owner != name);
    }

    fn remove_all(&mut self) {
        self.clear_count += 1;
        self.meshes.clear();
        self.vector_fields.clear();
        self.obstacles.clear();
        self.highlight = None;
    }

    fn update_vertex_positions(&mut self, name: &str, vertices: &[DVec3]) {
        if let Some(mesh) = self.meshes.get_mut(name) {
            mesh.vertices = vertices.to_vec();
        }
    }

    fn update_transform(&mut self, name: &str, transform: &DMat4) {
        if let Some(mesh) = self.meshes.get_mut(name) {
            mesh.transform = *transform;
        }
    }

    fn update_vector_field(&mut self, name: &str, field: VectorField, vectors: &[DVec3]) {
        self.vector_fields
            .insert((name.to_owned(), field), vectors.to_vec());
    }

    fn remove_vector_field(&mut self, name: &str, field: VectorField) {
        self.field_removals.push((name.to_owned(), field));
        self.vector_fields.remove(&(name.to_owned(), field));
    }

    fn update_obstacle(
        &mut self,
        owner: &str,
        vertices: &[DVec3],
        simplices: &[Simplex],
        visible: bool,
    ) {
        self.obstacles.insert(
            owner.to_owned(),
            VizObstacle {
                vertices: vertices.to_vec(),
                simplices: simplices.to_vec(),
                visible,
            },
        );
    }

    fn remove_obstacle(&mut self, owner: &str) {
        self.obstacles.remove(owner);
    }

    fn set_obstacles_visible(&mut self, visible: bool) {
        for obstacle in self.obstacles.values_mut() {
            obstacle.visible = visible;
        }
    }

    fn set_active_highlight(&mut self, old: Option<&str>, new: Option<&str>) {
        self.highlight_log
            .push((old.map(str::to_owned), new.map(str::to_owned)));
        self.highlight = new.map(str::to_owned);
    }

    fn set_camera(&mut self, camera: &CameraPose) {
        self.camera = Some(*camera);
    }

    fn request_redraw(&mut self) {
        self.redraw_count += 1;
    }
}
