// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session: the single owner of scene state and its collaborators.
//!
//! Only one session may be alive per process; constructing a second one fails
//! with [`SessionError::AlreadyRunning`] until the first is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use glam::DMat4;
use repulsor_app_core::diagnostics::{Diagnostics, Severity};
use repulsor_app_core::settings::{DisplaySettings, InteractivitySettings, Settings, MAX_VERBOSITY};
use repulsor_port::{
    EngineError, EngineSettings, EntityId, PhysicsEngine, SceneDefinition, SceneSource,
    SceneSourceError, VisualizationError, VisualizationPort,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cache::DerivedCache;
use crate::engine::EngineAdapter;
use crate::obstacle;
use crate::registry::{Activation, SceneError, SceneRegistry};
use crate::step::{run_step, StepError, StepFailure};
use crate::transform::{matrices_close, to_world, TRANSFORM_EPSILON};

static SESSION_ALIVE: AtomicBool = AtomicBool::new(false);

/// Suffix of the debug mesh registered by [`Session::show_engine_state`].
pub const DEBUG_STATE_SUFFIX: &str = "_DebugState";

/// Session-level failure.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another session is alive in this process.
    #[error("a session is already running")]
    AlreadyRunning,
    /// The scene could not be loaded.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// The scene source failed.
    #[error(transparent)]
    Source(#[from] SceneSourceError),
    /// An engine call failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// A physics step stopped early.
    #[error(transparent)]
    Step(#[from] StepFailure),
    /// The viewer rejected a registration.
    #[error(transparent)]
    Visualization(#[from] VisualizationError),
    /// No entity has this id.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    /// The entity has no engine mesh.
    #[error("entity {0} has no engine mesh")]
    NoMesh(EntityId),
}

/// Energy of one simulated entity; zero and failure are distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyReading {
    /// Entity id.
    pub id: EntityId,
    /// Unique name.
    pub name: String,
    /// Engine result.
    pub energy: Result<f64, EngineError>,
}

#[derive(Debug)]
struct InstanceGuard;

impl InstanceGuard {
    fn acquire() -> Result<Self, SessionError> {
        SESSION_ALIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| SessionError::AlreadyRunning)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        SESSION_ALIVE.store(false, Ordering::Release);
    }
}

/// Owns the engine adapter, viewer, registry, cache, settings and diagnostics.
///
/// Every operation runs to completion on the calling thread.
pub struct Session<E: PhysicsEngine, V: VisualizationPort> {
    engine: EngineAdapter<E>,
    viz: V,
    registry: SceneRegistry<E::Mesh>,
    cache: DerivedCache,
    settings: Settings,
    diagnostics: Diagnostics,
    _guard: InstanceGuard,
}

impl<E: PhysicsEngine, V: VisualizationPort> Session<E, V> {
    /// Starts the session. Settings are normalized.
    pub fn new(engine: E, viz: V, settings: Settings) -> Result<Self, SessionError> {
        let guard = InstanceGuard::acquire()?;
        let settings = settings.normalized();
        let mut diagnostics = Diagnostics::default();
        diagnostics.set_verbosity(settings.debug.verbosity);
        info!(threads = settings.engine.thread_count, "session started");
        Ok(Self {
            engine: EngineAdapter::new(engine),
            viz,
            registry: SceneRegistry::new(),
            cache: DerivedCache::new(),
            settings,
            diagnostics,
            _guard: guard,
        })
    }

    /// Wrapped engine.
    pub const fn engine(&self) -> &E {
        self.engine.engine()
    }

    /// Viewer port.
    pub const fn viz(&self) -> &V {
        &self.viz
    }

    /// Mutable viewer port.
    pub fn viz_mut(&mut self) -> &mut V {
        &mut self.viz
    }

    /// Scene registry.
    pub const fn registry(&self) -> &SceneRegistry<E::Mesh> {
        &self.registry
    }

    /// Derived-quantity cache.
    pub const fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    /// Current settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// User-facing diagnostics.
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Mutable diagnostics (for draining).
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => info!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
        self.diagnostics.push(severity, message, Instant::now());
    }

    /// Loads `definition`, replacing the current scene.
    ///
    /// On failure the registry is empty and the viewer holds nothing.
    pub fn load_scene(&mut self, definition: SceneDefinition) -> Result<(), SessionError> {
        self.viz.remove_all();
        self.cache.invalidate();
        self.viz.set_camera(&definition.camera);
        let name = definition.name.clone();

        let activation = match self
            .registry
            .load(definition, &self.engine, &self.settings.engine)
        {
            Ok(activation) => activation,
            Err(err) => {
                self.report(Severity::Error, format!("failed to load scene '{name}': {err}"));
                self.viz.request_redraw();
                return Err(err.into());
            }
        };

        let mut rejected = Vec::new();
        for entity in self.registry.entities() {
            if let Err(err) = self.viz.register_mesh(
                entity.unique_name(),
                entity.local_vertices(),
                entity.simplices(),
                entity.transform(),
            ) {
                rejected.push(err);
            }
        }
        for err in rejected {
            self.report(Severity::Warning, err.to_string());
        }

        self.refresh_obstacles();
        if let Some(change) = activation {
            self.viz
                .set_active_highlight(change.old.as_deref(), change.new.as_deref());
        }
        let count = self.registry.len();
        self.report(Severity::Info, format!("loaded scene '{name}' ({count} entities)"));
        self.viz.request_redraw();
        Ok(())
    }

    /// Fetches `scene_id` from `source` and loads it.
    pub fn load_scene_from<S>(&mut self, source: &S, scene_id: &str) -> Result<(), SessionError>
    where
        S: SceneSource + ?Sized,
    {
        let definition = source.load_scene(scene_id).map_err(|err| {
            self.report(Severity::Error, format!("cannot read scene '{scene_id}': {err}"));
            err
        })?;
        self.load_scene(definition)
    }

    /// Drops the scene, its visuals and every cached quantity.
    pub fn unload_scene(&mut self) {
        self.viz.remove_all();
        self.cache.invalidate();
        self.registry.unload();
        self.viz.request_redraw();
    }

    /// Moves the selection. Returns `false` for unknown or non-interactive ids.
    pub fn set_active_entity(&mut self, id: Option<EntityId>) -> bool {
        match self.registry.set_active_entity(id) {
            Activation::Rejected => false,
            Activation::Unchanged => true,
            Activation::Changed(change) => {
                self.viz
                    .set_active_highlight(change.old.as_deref(), change.new.as_deref());
                self.viz.request_redraw();
                true
            }
        }
    }

    /// Moves an entity. Returns `Ok(false)` when the transform is unchanged.
    ///
    /// The engine receives the new world positions before the transform is
    /// stored; if it rejects them, the entity, its mesh and its visual keep the
    /// old placement and the engine error is returned.
    pub fn update_entity_transform(
        &mut self,
        id: EntityId,
        transform: DMat4,
    ) -> Result<bool, SessionError> {
        let Some(entity) = self.registry.entity_mut(id) else {
            return Err(SessionError::UnknownEntity(id));
        };
        if matrices_close(entity.transform(), &transform, TRANSFORM_EPSILON) {
            return Ok(false);
        }
        let name = entity.unique_name().to_owned();
        let world = to_world(&transform, entity.local_vertices());
        let synced = entity
            .mesh_mut()
            .map_or(Ok(()), |mesh| self.engine.sync_vertices(mesh, &world));
        if let Err(err) = synced {
            self.report(
                Severity::Warning,
                format!("engine rejected new positions of {name}: {err}"),
            );
            return Err(err.into());
        }

        self.registry.update_transform(id, transform);
        self.viz.update_transform(&name, &transform);
        self.cache.invalidate();
        self.refresh_obstacles();
        self.refresh_derived();
        self.viz.request_redraw();
        Ok(true)
    }

    /// Computes differentials for every simulated entity and shows them.
    pub fn request_differentials(&mut self) -> bool {
        let ok = self.cache.compute_differentials(
            &mut self.registry,
            &self.engine,
            self.settings.engine.exponents,
        );
        if !ok {
            self.report(Severity::Warning, "some differentials could not be computed");
        }
        self.refresh_vector_visuals();
        ok
    }

    /// Computes gradients (and differentials first, if needed) and shows them.
    pub fn request_gradients(&mut self) -> bool {
        let exponents = self.settings.engine.exponents;
        if !self.cache.differentials_valid()
            && !self
                .cache
                .compute_differentials(&mut self.registry, &self.engine, exponents)
        {
            self.report(
                Severity::Warning,
                "gradients unavailable: differentials could not be computed",
            );
            self.refresh_vector_visuals();
            return false;
        }
        let ok = self
            .cache
            .compute_gradients(&mut self.registry, &self.engine, exponents);
        if !ok {
            self.report(Severity::Warning, "some gradients could not be computed");
        }
        self.refresh_vector_visuals();
        ok
    }

    /// Re-projects the cache onto the viewer.
    pub fn refresh_vector_visuals(&mut self) {
        self.cache
            .project(&self.registry, &mut self.viz, &self.settings.display);
        self.viz.request_redraw();
    }

    /// Runs a step of `iterations_per_step` iterations.
    pub fn step(&mut self) -> Result<usize, SessionError> {
        let iterations =
            usize::try_from(self.settings.stepping.iterations_per_step).unwrap_or(usize::MAX);
        self.run_physics_step(iterations)
    }

    /// Runs up to `iterations` physics iterations.
    ///
    /// The cache is invalidated before and after; completed iterations persist
    /// even when a later one fails.
    pub fn run_physics_step(&mut self, iterations: usize) -> Result<usize, SessionError> {
        if iterations == 0 {
            return Ok(0);
        }
        self.cache.invalidate();
        let result = run_step(
            &mut self.registry,
            &self.engine,
            &mut self.viz,
            &self.settings,
            iterations,
        );
        self.cache.invalidate();
        self.refresh_derived();
        self.viz.request_redraw();
        result.map_err(|failure| {
            if let StepError::Reaggregation { failures } = &failure.error {
                for err in failures {
                    self.report(Severity::Warning, err.to_string());
                }
            }
            self.report(Severity::Error, failure.to_string());
            failure.into()
        })
    }

    /// Applies new engine settings to every mesh.
    ///
    /// Exponent changes rebuild the energy object immediately.
    pub fn update_engine_settings(&mut self, engine: EngineSettings) -> Result<(), SessionError> {
        self.cache.invalidate();
        let exponents_changed = engine.exponents != self.settings.engine.exponents;
        self.settings.engine = EngineSettings {
            thread_count: engine.effective_thread_count(),
            ..engine
        };

        let mut energy_error = None;
        if exponents_changed {
            if let Err(err) = self.engine.energy(engine.exponents) {
                self.report(Severity::Error, format!("energy rebuild failed: {err}"));
                energy_error = Some(err);
            }
        }

        let tree = self.settings.engine.tree;
        let mut rejected = Vec::new();
        for entity in self.registry.entities_mut() {
            let name = entity.unique_name().to_owned();
            if let Some(mesh) = entity.mesh_mut() {
                if let Err(err) = self.engine.apply_parameters(mesh, &tree) {
                    rejected.push(format!("parameters rejected by {name}: {err}"));
                }
            }
        }
        for message in rejected {
            self.report(Severity::Warning, message);
        }

        self.refresh_derived();
        self.viz.request_redraw();
        energy_error.map_or(Ok(()), |err| Err(err.into()))
    }

    /// Stores display settings and re-projects vectors.
    pub fn update_display_settings(&mut self, display: DisplaySettings) {
        let show_changed = display.show_obstacles != self.settings.display.show_obstacles;
        self.settings.display = display;
        if show_changed {
            self.set_show_obstacles(display.show_obstacles);
        }
        self.refresh_vector_visuals();
    }

    /// Stores real-time recomputation flags and applies them.
    pub fn update_interactivity(&mut self, interactivity: InteractivitySettings) {
        self.settings.interactivity = interactivity;
        self.refresh_derived();
        self.viz.request_redraw();
    }

    /// Sets how many iterations [`Self::step`] runs.
    pub fn set_iterations_per_step(&mut self, iterations: u32) {
        self.settings.stepping.iterations_per_step = iterations;
    }

    /// Shows or hides obstacle visuals; showing re-pushes the installed geometry.
    pub fn set_show_obstacles(&mut self, show: bool) {
        self.settings.display.show_obstacles = show;
        if show {
            obstacle::push_obstacle_visuals(&self.registry, &mut self.viz, true);
        }
        self.viz.set_obstacles_visible(show);
        self.viz.request_redraw();
    }

    /// Sets diagnostics verbosity, clamped to `0..=2`.
    pub fn set_verbosity(&mut self, verbosity: u8) {
        let verbosity = verbosity.min(MAX_VERBOSITY);
        self.settings.debug.verbosity = verbosity;
        self.diagnostics.set_verbosity(verbosity);
    }

    /// Energy of every simulated entity.
    pub fn energy_report(&mut self) -> Vec<EnergyReading> {
        let exponents = self.settings.engine.exponents;
        let mut readings = Vec::new();
        for entity in self.registry.entities_mut() {
            let id = entity.id();
            let name = entity.unique_name().to_owned();
            if let Some(mesh) = entity.mesh_mut() {
                let energy = self.engine.energy_value(mesh, exponents);
                readings.push(EnergyReading { id, name, energy });
            }
        }
        for reading in &readings {
            match &reading.energy {
                Ok(value) => self.report(Severity::Info, format!("{}: energy {value}", reading.name)),
                Err(err) => self.report(
                    Severity::Warning,
                    format!("{}: energy unavailable: {err}", reading.name),
                ),
            }
        }
        readings
    }

    /// Registers `<name>_DebugState` showing the engine's copy of the mesh.
    pub fn show_engine_state(&mut self, id: EntityId) -> Result<(), SessionError> {
        let entity = self
            .registry
            .entity(id)
            .ok_or(SessionError::UnknownEntity(id))?;
        let mesh = entity.mesh().ok_or(SessionError::NoMesh(id))?;
        let coordinates = self.engine.vertex_coordinates(mesh)?;
        self.viz.register_mesh(
            &format!("{}{DEBUG_STATE_SUFFIX}", entity.unique_name()),
            &coordinates,
            entity.simplices(),
            &DMat4::IDENTITY,
        )?;
        self.viz.request_redraw();
        Ok(())
    }

    fn refresh_obstacles(&mut self) {
        let failures = obstacle::refresh_all(
            &mut self.registry,
            &self.engine,
            &mut self.viz,
            &self.settings.engine,
            self.settings.display.show_obstacles,
        );
        for err in failures {
            self.report(Severity::Warning, err.to_string());
        }
    }

    /// Recomputes quantities flagged for real-time updates, then re-projects
    /// so invalidated vectors disappear from the viewer.
    fn refresh_derived(&mut self) {
        if self.settings.interactivity.real_time_differential {
            let exponents = self.settings.engine.exponents;
            let ok = self
                .cache
                .compute_differentials(&mut self.registry, &self.engine, exponents);
            if ok && self.settings.real_time_gradient() {
                self.cache
                    .compute_gradients(&mut self.registry, &self.engine, exponents);
            }
        }
        self.cache
            .project(&self.registry, &mut self.viz, &self.settings.display);
    }
}
