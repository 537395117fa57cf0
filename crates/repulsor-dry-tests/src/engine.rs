// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scriptable physics engine double.
//!
//! [`MockEngine`] does trivial maths so tests can predict every number:
//!
//! - differential: a uniform vector per vertex (or a per-mesh override field);
//! - metric solve: `rhs * metric_scale`;
//! - safe step: `min(safe_step, upper_bound)`;
//! - energy: the vertex count (or a per-mesh override).
//!
//! Mesh ids are assigned from the construct-call counter, failed calls
//! included, so the n-th `construct_mesh` call always targets id `n`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use repulsor_port::{
    DVec3, EngineError, Exponents, PhysicsEngine, Simplex, SolveParams, TreeSettings,
};

/// Engine operations that can be logged and scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// `construct_mesh`
    ConstructMesh,
    /// `build_energy`
    BuildEnergy,
    /// `apply_parameters`
    ApplyParameters,
    /// `replace_obstacle`
    ReplaceObstacle,
    /// `update_vertex_coordinates`
    UpdateVertices,
    /// `vertex_coordinates`
    VertexCoordinates,
    /// `compute_energy`
    ComputeEnergy,
    /// `compute_differential`
    ComputeDifferential,
    /// `solve_metric`
    SolveMetric,
    /// `max_safe_step`
    MaxSafeStep,
}

impl fmt::Display for EngineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a scripted failure manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Return an `EngineError`.
    Error,
    /// Panic inside the engine call.
    Panic,
}

/// Mesh handle produced by [`MockEngine`]. Fields are public for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct MockMesh {
    /// Construct-call index.
    pub id: u64,
    /// Vertex coordinates as last pushed (world space).
    pub vertices: Vec<DVec3>,
    /// Triangles.
    pub simplices: Vec<Simplex>,
    /// Current obstacle, owned by this mesh.
    pub obstacle: Option<Box<MockMesh>>,
    /// Last tree settings applied.
    pub tree: Option<TreeSettings>,
    /// Thread count passed at construction.
    pub thread_count: usize,
}

/// Energy object produced by [`MockEngine::build_energy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockEnergy {
    /// Exponents it was built from.
    pub exponents: Exponents,
}

#[derive(Debug, Clone)]
struct FailRule {
    op: EngineOp,
    mesh: Option<u64>,
    after: usize,
    seen: usize,
    mode: FailMode,
}

#[derive(Debug)]
struct Inner {
    next_mesh: u64,
    calls: Vec<(EngineOp, Option<u64>)>,
    rules: Vec<FailRule>,
    differential: DVec3,
    differential_fields: HashMap<u64, Vec<DVec3>>,
    energies: HashMap<u64, f64>,
    metric_scale: f64,
    safe_step: f64,
    energies_built: Vec<Exponents>,
    last_solve: Option<SolveParams>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            next_mesh: 0,
            calls: Vec::new(),
            rules: Vec::new(),
            differential: DVec3::new(0.0, 0.0, 0.1),
            differential_fields: HashMap::new(),
            energies: HashMap::new(),
            metric_scale: 1.0,
            safe_step: 1.0,
            energies_built: Vec::new(),
            last_solve: None,
        }
    }
}

/// Scriptable [`PhysicsEngine`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<Inner>>,
}

impl MockEngine {
    /// Engine with default maths and no scripted failures.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail every call to `op`.
    pub fn fail(&self, op: EngineOp) {
        self.fail_after(op, None, 0);
    }

    /// Fail every call to `op` on mesh `mesh`.
    pub fn fail_mesh(&self, op: EngineOp, mesh: u64) {
        self.fail_after(op, Some(mesh), 0);
    }

    /// Let `after` matching calls succeed, then fail every later one.
    pub fn fail_after(&self, op: EngineOp, mesh: Option<u64>, after: usize) {
        self.push_rule(op, mesh, after, FailMode::Error);
    }

    /// Panic on every call to `op` on `mesh` (or any mesh).
    pub fn panic_on(&self, op: EngineOp, mesh: Option<u64>) {
        self.push_rule(op, mesh, 0, FailMode::Panic);
    }

    fn push_rule(&self, op: EngineOp, mesh: Option<u64>, after: usize, mode: FailMode) {
        self.lock().rules.push(FailRule {
            op,
            mesh,
            after,
            seen: 0,
            mode,
        });
    }

    /// Drop every scripted failure.
    pub fn clear_failures(&self) {
        self.lock().rules.clear();
    }

    /// Uniform per-vertex differential.
    pub fn set_differential(&self, v: DVec3) {
        self.lock().differential = v;
    }

    /// Exact differential field for one mesh (row count is not checked).
    pub fn set_differential_field(&self, mesh: u64, field: Vec<DVec3>) {
        self.lock().differential_fields.insert(mesh, field);
    }

    /// Energy value reported for one mesh.
    pub fn set_energy(&self, mesh: u64, value: f64) {
        self.lock().energies.insert(mesh, value);
    }

    /// Factor applied by the metric solve.
    pub fn set_metric_scale(&self, scale: f64) {
        self.lock().metric_scale = scale;
    }

    /// Step size returned by `max_safe_step` before clamping.
    pub fn set_safe_step(&self, step: f64) {
        self.lock().safe_step = step;
    }

    /// Every call made so far, with the mesh id it targeted.
    pub fn calls(&self) -> Vec<(EngineOp, Option<u64>)> {
        self.lock().calls.clone()
    }

    /// Number of calls to `op`.
    pub fn call_count(&self, op: EngineOp) -> usize {
        self.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    /// Number of calls to `op` targeting `mesh`.
    pub fn mesh_call_count(&self, op: EngineOp, mesh: u64) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(o, m)| *o == op && *m == Some(mesh))
            .count()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Exponents of every energy object built so far.
    pub fn energies_built(&self) -> Vec<Exponents> {
        self.lock().energies_built.clone()
    }

    /// Parameters of the most recent metric solve.
    pub fn last_solve(&self) -> Option<SolveParams> {
        self.lock().last_solve
    }

    /// Ids handed out so far.
    pub fn meshes_constructed(&self) -> u64 {
        self.lock().next_mesh
    }

    /// Records the call and applies scripted failures.
    #[allow(clippy::panic)]
    fn enter(&self, op: EngineOp, mesh: Option<u64>) -> Result<(), EngineError> {
        let mode = {
            let mut inner = self.lock();
            inner.calls.push((op, mesh));
            inner
                .rules
                .iter_mut()
                .filter(|r| r.op == op && (r.mesh.is_none() || r.mesh == mesh))
                .find_map(|r| {
                    if r.seen >= r.after {
                        Some(r.mode)
                    } else {
                        r.seen += 1;
                        None
                    }
                })
        };
        match mode {
            None => Ok(()),
            Some(FailMode::Error) => Err(match op {
                EngineOp::ConstructMesh => {
                    EngineError::MeshConstruction(format!("injected failure for mesh {mesh:?}"))
                }
                EngineOp::BuildEnergy => EngineError::EnergyUnavailable("injected failure".into()),
                _ => EngineError::Computation(format!("injected {op} failure on mesh {mesh:?}")),
            }),
            Some(FailMode::Panic) => panic!("injected {op} panic on mesh {mesh:?}"),
        }
    }

    fn differential_for(&self, mesh: &MockMesh) -> Vec<DVec3> {
        let inner = self.lock();
        inner
            .differential_fields
            .get(&mesh.id)
            .cloned()
            .unwrap_or_else(|| vec![inner.differential; mesh.vertices.len()])
    }
}

impl PhysicsEngine for MockEngine {
    type Mesh = MockMesh;
    type Energy = MockEnergy;

    fn construct_mesh(
        &self,
        vertices: &[DVec3],
        simplices: &[Simplex],
        thread_count: usize,
    ) -> Result<MockMesh, EngineError> {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_mesh;
            inner.next_mesh += 1;
            id
        };
        self.enter(EngineOp::ConstructMesh, Some(id))?;
        if vertices.is_empty() || simplices.is_empty() {
            return Err(EngineError::EmptyGeometry);
        }
        if simplices
            .iter()
            .flatten()
            .any(|&i| i as usize >= vertices.len())
        {
            return Err(EngineError::MeshConstruction("index out of range".into()));
        }
        Ok(MockMesh {
            id,
            vertices: vertices.to_vec(),
            simplices: simplices.to_vec(),
            obstacle: None,
            tree: None,
            thread_count,
        })
    }

    fn build_energy(&self, exponents: Exponents) -> Result<MockEnergy, EngineError> {
        self.enter(EngineOp::BuildEnergy, None)?;
        self.lock().energies_built.push(exponents);
        Ok(MockEnergy { exponents })
    }

    fn apply_parameters(
        &self,
        mesh: &mut MockMesh,
        settings: &TreeSettings,
    ) -> Result<(), EngineError> {
        self.enter(EngineOp::ApplyParameters, Some(mesh.id))?;
        mesh.tree = Some(*settings);
        Ok(())
    }

    fn replace_obstacle(
        &self,
        mesh: &mut MockMesh,
        obstacle: Option<MockMesh>,
    ) -> Result<(), EngineError> {
        self.enter(EngineOp::ReplaceObstacle, Some(mesh.id))?;
        mesh.obstacle = obstacle.map(Box::new);
        Ok(())
    }

    fn update_vertex_coordinates(
        &self,
        mesh: &mut MockMesh,
        world: &[DVec3],
    ) -> Result<(), EngineError> {
        self.enter(EngineOp::UpdateVertices, Some(mesh.id))?;
        if world.len() != mesh.vertices.len() {
            return Err(EngineError::ShapeMismatch {
                expected: mesh.vertices.len(),
                actual: world.len(),
            });
        }
        mesh.vertices.copy_from_slice(world);
        Ok(())
    }

    fn vertex_count(&self, mesh: &MockMesh) -> usize {
        mesh.vertices.len()
    }

    fn vertex_coordinates(&self, mesh: &MockMesh) -> Result<Vec<DVec3>, EngineError> {
        self.enter(EngineOp::VertexCoordinates, Some(mesh.id))?;
        Ok(mesh.vertices.clone())
    }

    fn compute_energy(&self, _energy: &MockEnergy, mesh: &mut MockMesh) -> Result<f64, EngineError> {
        self.enter(EngineOp::ComputeEnergy, Some(mesh.id))?;
        #[allow(clippy::cast_precision_loss)]
        let fallback = mesh.vertices.len() as f64;
        Ok(self.lock().energies.get(&mesh.id).copied().unwrap_or(fallback))
    }

    fn compute_differential(
        &self,
        _energy: &MockEnergy,
        mesh: &mut MockMesh,
    ) -> Result<Vec<DVec3>, EngineError> {
        self.enter(EngineOp::ComputeDifferential, Some(mesh.id))?;
        Ok(self.differential_for(mesh))
    }

    fn solve_metric(
        &self,
        _energy: &MockEnergy,
        mesh: &mut MockMesh,
        rhs: &[DVec3],
        params: SolveParams,
    ) -> Result<Vec<DVec3>, EngineError> {
        self.enter(EngineOp::SolveMetric, Some(mesh.id))?;
        let scale = {
            let mut inner = self.lock();
            inner.last_solve = Some(params);
            inner.metric_scale
        };
        Ok(rhs.iter().map(|v| *v * scale).collect())
    }

    fn max_safe_step(
        &self,
        mesh: &mut MockMesh,
        _direction: &[DVec3],
        upper_bound: f64,
    ) -> Result<f64, EngineError> {
        self.enter(EngineOp::MaxSafeStep, Some(mesh.id))?;
        Ok(self.lock().safe_step.min(upper_bound))
    }
}
