// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Guarded access to the physics engine.
//!
//! Every engine call goes through [`EngineAdapter`], which turns panics into
//! [`EngineError::Panicked`], checks the shape of per-vertex results, and keeps
//! the energy/metric object for the current exponents behind a mutex.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use glam::DVec3;
use repulsor_port::{
    EngineError, EngineSettings, Exponents, PhysicsEngine, Simplex, SolveParams, TreeSettings,
};
use tracing::debug;

type EnergySlot<T> = Option<(Exponents, Arc<T>)>;

/// Wraps a [`PhysicsEngine`] with panic isolation and lazy energy construction.
pub struct EngineAdapter<E: PhysicsEngine> {
    engine: E,
    energy: Mutex<EnergySlot<E::Energy>>,
}

impl<E: PhysicsEngine> EngineAdapter<E> {
    /// Wrap `engine`. No energy object is built until first needed.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            energy: Mutex::new(None),
        }
    }

    /// The wrapped engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Energy object for `exponents`, rebuilt when they differ from the cached one.
    pub fn energy(&self, exponents: Exponents) -> Result<Arc<E::Energy>, EngineError> {
        let mut slot = self.energy.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, energy)) = slot.as_ref() {
            if *cached == exponents {
                return Ok(Arc::clone(energy));
            }
        }
        debug!(q = exponents.q, p = exponents.p, "building energy object");
        *slot = None;
        let energy = Arc::new(guarded("build_energy", || {
            self.engine.build_energy(exponents)
        })?);
        *slot = Some((exponents, Arc::clone(&energy)));
        Ok(energy)
    }

    /// Exponents of the currently cached energy object.
    pub fn cached_exponents(&self) -> Option<Exponents> {
        self.energy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(e, _)| *e)
    }

    /// Builds a mesh and applies the tree settings. Empty geometry is rejected
    /// before the engine sees it.
    pub fn construct_mesh(
        &self,
        vertices: &[DVec3],
        simplices: &[Simplex],
        settings: &EngineSettings,
    ) -> Result<E::Mesh, EngineError> {
        if vertices.is_empty() || simplices.is_empty() {
            return Err(EngineError::EmptyGeometry);
        }
        let threads = settings.effective_thread_count();
        let mut mesh = guarded("construct_mesh", || {
            self.engine.construct_mesh(vertices, simplices, threads)
        })?;
        self.apply_parameters(&mut mesh, &settings.tree)?;
        Ok(mesh)
    }

    /// Re-applies tree settings to an existing mesh.
    pub fn apply_parameters(
        &self,
        mesh: &mut E::Mesh,
        tree: &TreeSettings,
    ) -> Result<(), EngineError> {
        guarded("apply_parameters", || {
            self.engine.apply_parameters(mesh, tree)
        })
    }

    /// Replaces or clears the mesh's obstacle.
    pub fn replace_obstacle(
        &self,
        mesh: &mut E::Mesh,
        obstacle: Option<E::Mesh>,
    ) -> Result<(), EngineError> {
        guarded("replace_obstacle", || {
            self.engine.replace_obstacle(mesh, obstacle)
        })
    }

    /// Pushes world-space positions into the mesh.
    pub fn sync_vertices(&self, mesh: &mut E::Mesh, world: &[DVec3]) -> Result<(), EngineError> {
        let expected = self.engine.vertex_count(mesh);
        if world.len() != expected {
            return Err(EngineError::ShapeMismatch {
                expected,
                actual: world.len(),
            });
        }
        guarded("update_vertex_coordinates", || {
            self.engine.update_vertex_coordinates(mesh, world)
        })
    }

    /// Positions as the engine currently holds them.
    pub fn vertex_coordinates(&self, mesh: &E::Mesh) -> Result<Vec<DVec3>, EngineError> {
        guarded("vertex_coordinates", || self.engine.vertex_coordinates(mesh))
    }

    /// Energy of the mesh.
    pub fn energy_value(&self, mesh: &mut E::Mesh, exponents: Exponents) -> Result<f64, EngineError> {
        let energy = self.energy(exponents)?;
        guarded("compute_energy", || self.engine.compute_energy(&energy, mesh))
    }

    /// Per-vertex differential.
    pub fn differential(
        &self,
        mesh: &mut E::Mesh,
        exponents: Exponents,
    ) -> Result<Vec<DVec3>, EngineError> {
        let energy = self.energy(exponents)?;
        let field = guarded("compute_differential", || {
            self.engine.compute_differential(&energy, mesh)
        })?;
        self.check_rows(mesh, field)
    }

    /// Metric solve of `differential`: the gradient that matches it.
    pub fn gradient(
        &self,
        mesh: &mut E::Mesh,
        exponents: Exponents,
        differential: &[DVec3],
    ) -> Result<Vec<DVec3>, EngineError> {
        let energy = self.energy(exponents)?;
        let field = guarded("solve_metric", || {
            self.engine
                .solve_metric(&energy, mesh, differential, SolveParams::default())
        })?;
        self.check_rows(mesh, field)
    }

    /// World-space displacement for one step: the negated gradient scaled by
    /// the largest collision-free multiplier in `[0, 1]`.
    pub fn world_displacement(
        &self,
        mesh: &mut E::Mesh,
        exponents: Exponents,
    ) -> Result<Vec<DVec3>, EngineError> {
        let differential = self.differential(mesh, exponents)?;
        let gradient = self.gradient(mesh, exponents, &differential)?;
        let direction: Vec<DVec3> = gradient.into_iter().map(|g| -g).collect();
        let step = guarded("max_safe_step", || {
            self.engine.max_safe_step(mesh, &direction, 1.0)
        })?;
        if !step.is_finite() || step < 0.0 {
            return Err(EngineError::Computation(format!(
                "invalid safe step size {step}"
            )));
        }
        Ok(direction.into_iter().map(|d| d * step).collect())
    }

    fn check_rows(&self, mesh: &E::Mesh, field: Vec<DVec3>) -> Result<Vec<DVec3>, EngineError> {
        let expected = self.engine.vertex_count(mesh);
        if field.len() == expected {
            Ok(field)
        } else {
            Err(EngineError::ShapeMismatch {
                expected,
                actual: field.len(),
            })
        }
    }
}

/// Runs an engine call, converting a panic into [`EngineError::Panicked`].
fn guarded<T>(
    op: &'static str,
    call: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(EngineError::Panicked {
            op,
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
