// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Derived-quantity cache.
//!
//! Differentials and gradients are valid only for the exact scene state they
//! were computed from, so every mutation clears the whole cache. An absent
//! entry means "not attempted"; an entry is inserted once the outcome of a
//! computation (success or failure) is known.
//!
//! For every entity `e`: gradient-valid(e) implies differential-valid(e) and
//! the global differentials-valid flag.

use std::collections::BTreeMap;

use glam::DVec3;
use repulsor_app_core::settings::DisplaySettings;
use repulsor_port::{EngineError, EntityId, Exponents, PhysicsEngine, VectorField, VisualizationPort};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::EngineAdapter;
use crate::registry::SceneRegistry;
use crate::scaling::scale_for_display;

/// Why a per-entity quantity is unavailable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    /// The engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The gradient was skipped because the differential is missing or failed.
    #[error("differential unavailable")]
    MissingDifferential,
}

/// Result of one per-entity computation.
pub type Outcome = Result<Vec<DVec3>, QuantityError>;

/// Cached outcomes for one entity. `None` means "not attempted".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Differential outcome.
    pub differential: Option<Outcome>,
    /// Gradient outcome.
    pub gradient: Option<Outcome>,
}

impl CacheEntry {
    /// The differential, if it was computed successfully.
    pub fn valid_differential(&self) -> Option<&[DVec3]> {
        match &self.differential {
            Some(Ok(v)) => Some(v),
            _ => None,
        }
    }

    /// The gradient, if it was computed successfully.
    pub fn valid_gradient(&self) -> Option<&[DVec3]> {
        match &self.gradient {
            Some(Ok(v)) => Some(v),
            _ => None,
        }
    }

    fn valid(&self, field: VectorField) -> Option<&[DVec3]> {
        match field {
            VectorField::Differential => self.valid_differential(),
            VectorField::Gradient => self.valid_gradient(),
        }
    }
}

/// Coarse cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing usable.
    Invalid,
    /// Every attempted differential succeeded.
    DifferentialsValid,
    /// Every attempted differential and gradient succeeded.
    DifferentialsAndGradientsValid,
}

/// Per-entity and global validity of derived quantities.
#[derive(Debug, Default)]
pub struct DerivedCache {
    entries: BTreeMap<EntityId, CacheEntry>,
    differentials_valid: bool,
    gradients_valid: bool,
}

impl DerivedCache {
    /// Empty, invalid cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry and both global flags. Idempotent.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.differentials_valid = false;
        self.gradients_valid = false;
    }

    /// Coarse state.
    pub const fn state(&self) -> CacheState {
        match (self.differentials_valid, self.gradients_valid) {
            (true, true) => CacheState::DifferentialsAndGradientsValid,
            (true, false) => CacheState::DifferentialsValid,
            _ => CacheState::Invalid,
        }
    }

    /// Global differential flag.
    pub const fn differentials_valid(&self) -> bool {
        self.differentials_valid
    }

    /// Global gradient flag.
    pub const fn gradients_valid(&self) -> bool {
        self.gradients_valid
    }

    /// Entry for `id`; `None` when nothing was attempted.
    pub fn entry(&self, id: EntityId) -> Option<&CacheEntry> {
        self.entries.get(&id)
    }

    /// All entries.
    pub fn entries(&self) -> impl Iterator<Item = (EntityId, &CacheEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Valid differential of `id`.
    pub fn differential(&self, id: EntityId) -> Option<&[DVec3]> {
        self.entries.get(&id).and_then(CacheEntry::valid_differential)
    }

    /// Valid gradient of `id`.
    pub fn gradient(&self, id: EntityId) -> Option<&[DVec3]> {
        self.entries.get(&id).and_then(CacheEntry::valid_gradient)
    }

    /// Recomputes differentials for every simulated entity with a mesh.
    ///
    /// Starts from a full invalidation. Failures are isolated per entity; the
    /// global flag is the AND over attempted entities.
    pub fn compute_differentials<E: PhysicsEngine>(
        &mut self,
        registry: &mut SceneRegistry<E::Mesh>,
        engine: &EngineAdapter<E>,
        exponents: Exponents,
    ) -> bool {
        self.invalidate();
        let mut all_ok = true;
        for entity in registry.entities_mut() {
            if !entity.is_simulated() {
                continue;
            }
            let id = entity.id();
            let name = entity.unique_name().to_owned();
            let Some(mesh) = entity.mesh_mut() else {
                continue;
            };
            let outcome = engine.differential(mesh, exponents).map_err(QuantityError::from);
            if let Err(err) = &outcome {
                warn!(entity = %name, ?err, "differential failed");
                all_ok = false;
            }
            self.entries.insert(
                id,
                CacheEntry {
                    differential: Some(outcome),
                    gradient: None,
                },
            );
        }
        self.differentials_valid = all_ok;
        debug!(valid = all_ok, entries = self.entries.len(), "differentials computed");
        all_ok
    }

    /// Computes gradients from the cached differentials.
    ///
    /// Does nothing and returns `false` unless differentials are globally
    /// valid. Entities without a valid differential are marked failed without
    /// calling the engine.
    pub fn compute_gradients<E: PhysicsEngine>(
        &mut self,
        registry: &mut SceneRegistry<E::Mesh>,
        engine: &EngineAdapter<E>,
        exponents: Exponents,
    ) -> bool {
        if !self.differentials_valid {
            debug!("gradients requested without valid differentials");
            self.gradients_valid = false;
            return false;
        }
        let mut all_ok = true;
        for entity in registry.entities_mut() {
            if !entity.is_simulated() {
                continue;
            }
            let id = entity.id();
            let name = entity.unique_name().to_owned();
            let Some(mesh) = entity.mesh_mut() else {
                continue;
            };
            let outcome = match self.entries.get(&id).and_then(CacheEntry::valid_differential) {
                Some(differential) => engine
                    .gradient(mesh, exponents, differential)
                    .map_err(QuantityError::from),
                None => Err(QuantityError::MissingDifferential),
            };
            if let Err(err) = &outcome {
                warn!(entity = %name, ?err, "gradient failed");
                all_ok = false;
            }
            self.entries.entry(id).or_default().gradient = Some(outcome);
        }
        self.gradients_valid = all_ok;
        debug!(valid = all_ok, "gradients computed");
        all_ok
    }

    /// Pushes valid quantities to the viewer and removes the rest.
    pub fn project<M, V>(
        &self,
        registry: &SceneRegistry<M>,
        viz: &mut V,
        display: &DisplaySettings,
    ) where
        V: VisualizationPort + ?Sized,
    {
        for entity in registry.entities() {
            let entry = self.entries.get(&entity.id());
            for field in [VectorField::Differential, VectorField::Gradient] {
                match entry.and_then(|e| e.valid(field)) {
                    Some(vectors) => viz.update_vector_field(
                        entity.unique_name(),
                        field,
                        &scale_for_display(vectors, display),
                    ),
                    None => viz.remove_vector_field(entity.unique_name(), field),
                }
            }
        }
    }
}
