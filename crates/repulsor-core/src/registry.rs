// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene registry: the set of live entities and the active selection.
//!
//! Loads are atomic. Entities are built into a scratch list and only committed
//! once every simulated entity has its engine mesh, so a failed load leaves
//! the registry empty rather than half-populated.

use std::collections::BTreeSet;

use glam::DMat4;
use repulsor_port::{EngineError, EngineSettings, EntityId, PhysicsEngine, SceneDefinition, Simplex};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::EngineAdapter;
use crate::entity::Entity;
use crate::transform::{matrices_close, TRANSFORM_EPSILON};

/// Why a scene could not be loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// Two blueprints share an id.
    #[error("duplicate entity id {0}")]
    DuplicateId(EntityId),
    /// Blueprint ids must be non-negative.
    #[error("negative entity id {0}")]
    NegativeId(EntityId),
    /// A triangle references a vertex the entity does not have.
    #[error("entity {id}: simplex #{index} {simplex:?} references a missing vertex")]
    SimplexOutOfRange {
        /// Offending entity.
        id: EntityId,
        /// Position of the simplex in the entity's list.
        index: usize,
        /// The simplex itself.
        simplex: Simplex,
    },
    /// The engine could not build a simulated entity's mesh.
    #[error("mesh construction failed for '{name}': {source}")]
    MeshConstruction {
        /// Unique name of the entity.
        name: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },
}

/// Highlight transition to forward to the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveChange {
    /// Unique name that loses the highlight.
    pub old: Option<String>,
    /// Unique name that gains it.
    pub new: Option<String>,
}

/// Outcome of an activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Unknown or non-interactive id; the selection is unchanged.
    Rejected,
    /// Accepted, but the selection already matched.
    Unchanged,
    /// Accepted and the selection moved.
    Changed(ActiveChange),
}

impl Activation {
    /// Whether the request was accepted.
    pub const fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Owner of every live entity.
#[derive(Debug)]
pub struct SceneRegistry<M> {
    definition: Option<SceneDefinition>,
    entities: Vec<Entity<M>>,
    active: Option<EntityId>,
}

impl<M> Default for SceneRegistry<M> {
    fn default() -> Self {
        Self {
            definition: None,
            entities: Vec::new(),
            active: None,
        }
    }
}

impl<M> SceneRegistry<M> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural checks run before anything is built.
    pub fn validate(definition: &SceneDefinition) -> Result<(), SceneError> {
        let mut seen = BTreeSet::new();
        for blueprint in &definition.entities {
            if blueprint.id.0 < 0 {
                return Err(SceneError::NegativeId(blueprint.id));
            }
            if !seen.insert(blueprint.id) {
                return Err(SceneError::DuplicateId(blueprint.id));
            }
            if let Some((index, simplex)) = blueprint.geometry.first_out_of_range() {
                return Err(SceneError::SimplexOutOfRange {
                    id: blueprint.id,
                    index,
                    simplex,
                });
            }
        }
        Ok(())
    }

    /// Replaces the current scene with `definition`.
    ///
    /// `build_mesh` is called for every simulated entity in blueprint order;
    /// the first failure aborts the load and leaves the registry empty. On
    /// success the first interactive entity becomes active and the
    /// corresponding highlight change is returned.
    pub fn load_with<F>(
        &mut self,
        definition: SceneDefinition,
        mut build_mesh: F,
    ) -> Result<Option<ActiveChange>, SceneError>
    where
        F: FnMut(&Entity<M>) -> Result<M, EngineError>,
    {
        self.unload();
        Self::validate(&definition)?;

        let mut built = Vec::with_capacity(definition.entities.len());
        for blueprint in &definition.entities {
            let mut entity = Entity::from_blueprint(blueprint);
            if entity.is_simulated() {
                let mesh = build_mesh(&entity).map_err(|source| {
                    warn!(entity = %entity.unique_name(), ?source, "mesh construction failed; load aborted");
                    SceneError::MeshConstruction {
                        name: entity.unique_name().to_owned(),
                        source,
                    }
                })?;
                entity.attach_mesh(mesh);
            }
            built.push(entity);
        }

        info!(scene = %definition.name, entities = built.len(), "scene loaded");
        self.entities = built;
        self.definition = Some(definition);

        let first_interactive = self
            .entities
            .iter()
            .find(|e| e.is_interactive())
            .map(|e| (e.id(), e.unique_name().to_owned()));
        Ok(first_interactive.map(|(id, name)| {
            self.active = Some(id);
            ActiveChange {
                old: None,
                new: Some(name),
            }
        }))
    }

    /// [`Self::load_with`] using the engine to build simulated meshes from
    /// their world-space geometry.
    pub fn load<E>(
        &mut self,
        definition: SceneDefinition,
        engine: &EngineAdapter<E>,
        settings: &EngineSettings,
    ) -> Result<Option<ActiveChange>, SceneError>
    where
        E: PhysicsEngine<Mesh = M>,
    {
        self.load_with(definition, |entity| {
            engine.construct_mesh(&entity.world_vertices(), entity.simplices(), settings)
        })
    }

    /// Drops every entity (and with them their engine meshes) and the selection.
    pub fn unload(&mut self) {
        if self.definition.is_some() {
            debug!(entities = self.entities.len(), "scene unloaded");
        }
        self.entities.clear();
        self.definition = None;
        self.active = None;
    }

    /// Moves the selection to `id`, or clears it with `None`.
    pub fn set_active_entity(&mut self, id: Option<EntityId>) -> Activation {
        let old = self.active_entity().map(|e| e.unique_name().to_owned());
        match id {
            None if self.active.is_none() => Activation::Unchanged,
            None => {
                self.active = None;
                Activation::Changed(ActiveChange { old, new: None })
            }
            Some(id) if self.active == Some(id) => Activation::Unchanged,
            Some(id) => match self.entity(id) {
                Some(entity) if entity.is_interactive() => {
                    let new = Some(entity.unique_name().to_owned());
                    self.active = Some(id);
                    Activation::Changed(ActiveChange { old, new })
                }
                _ => {
                    debug!(%id, "activation rejected");
                    Activation::Rejected
                }
            },
        }
    }

    /// Stores a new transform. Returns `false` for unknown ids and for
    /// transforms within tolerance of the current one.
    pub fn update_transform(&mut self, id: EntityId, transform: DMat4) -> bool {
        let Some(entity) = self.entity_mut(id) else {
            return false;
        };
        if matrices_close(entity.transform(), &transform, TRANSFORM_EPSILON) {
            return false;
        }
        entity.set_transform(transform);
        true
    }

    /// Entity with `id`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity<M>> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity<M>> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    /// All entities in blueprint order.
    pub fn entities(&self) -> &[Entity<M>] {
        &self.entities
    }

    pub(crate) fn entities_mut(&mut self) -> &mut [Entity<M>] {
        &mut self.entities
    }

    /// Id of the active entity.
    pub const fn active_id(&self) -> Option<EntityId> {
        self.active
    }

    /// The active entity.
    pub fn active_entity(&self) -> Option<&Entity<M>> {
        self.active.and_then(|id| self.entity(id))
    }

    /// Blueprint of the loaded scene.
    pub const fn definition(&self) -> Option<&SceneDefinition> {
        self.definition.as_ref()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no scene is loaded.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
