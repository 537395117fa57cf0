// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable scene blueprints.

use glam::DMat4;

use crate::{CameraPose, EntityId, MeshGeometry};

/// Obstacle dependency sentinel meaning "every other obstacle source".
pub const ALL_OTHER_SOURCES: i32 = -1;

/// Blueprint for one entity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EntityBlueprint {
    /// Scene-stable identifier.
    pub id: EntityId,
    /// Human-readable base name; the unique name is derived from it.
    pub base_name: String,
    /// Local-frame geometry.
    pub geometry: MeshGeometry,
    /// Whether the user may select and move this entity.
    pub interactive: bool,
    /// Whether this entity contributes geometry to other entities' obstacles.
    pub obstacle_source: bool,
    /// Whether the physics step moves this entity.
    pub simulated: bool,
    /// Obstacle dependency list: empty, `[-1]`, or explicit ids.
    pub obstacle_ids: Vec<i32>,
    /// Initial transform.
    pub transform: DMat4,
}

impl Default for EntityBlueprint {
    fn default() -> Self {
        Self {
            id: EntityId(0),
            base_name: String::new(),
            geometry: MeshGeometry::default(),
            interactive: false,
            obstacle_source: false,
            simulated: false,
            obstacle_ids: Vec::new(),
            transform: DMat4::IDENTITY,
        }
    }
}

impl EntityBlueprint {
    /// A static, non-interactive entity with the given geometry.
    pub fn new(id: i32, base_name: impl Into<String>, geometry: MeshGeometry) -> Self {
        Self {
            id: EntityId(id),
            base_name: base_name.into(),
            geometry,
            ..Self::default()
        }
    }

    /// Marks the entity as user-selectable.
    #[must_use]
    pub const fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Marks the entity as an obstacle source.
    #[must_use]
    pub const fn obstacle_source(mut self) -> Self {
        self.obstacle_source = true;
        self
    }

    /// Marks the entity as simulated.
    #[must_use]
    pub const fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    /// Sets the obstacle dependency list.
    #[must_use]
    pub fn with_obstacles(mut self, ids: impl Into<Vec<i32>>) -> Self {
        self.obstacle_ids = ids.into();
        self
    }

    /// Sets the initial transform.
    #[must_use]
    pub const fn with_transform(mut self, transform: DMat4) -> Self {
        self.transform = transform;
        self
    }
}

/// Blueprint for a whole scene: ordered entities plus the initial camera.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SceneDefinition {
    /// Display name.
    pub name: String,
    /// Entities in blueprint order.
    pub entities: Vec<EntityBlueprint>,
    /// Initial camera pose.
    pub camera: CameraPose,
}

impl SceneDefinition {
    /// Empty scene with the given name and default camera.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends an entity blueprint.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityBlueprint) -> Self {
        self.entities.push(entity);
        self
    }

    /// Replaces the camera pose.
    #[must_use]
    pub const fn with_camera(mut self, camera: CameraPose) -> Self {
        self.camera = camera;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_flags_without_touching_others() {
        let e = EntityBlueprint::new(3, "ring", MeshGeometry::default())
            .simulated()
            .with_obstacles([ALL_OTHER_SOURCES]);
        assert_eq!(e.id, EntityId(3));
        assert!(e.simulated);
        assert!(!e.interactive);
        assert!(!e.obstacle_source);
        assert_eq!(e.obstacle_ids, vec![-1]);
        assert_eq!(e.transform, DMat4::IDENTITY);
    }

    #[test]
    fn scene_keeps_blueprint_order() {
        let scene = SceneDefinition::new("pair")
            .with_entity(EntityBlueprint::new(7, "b", MeshGeometry::default()))
            .with_entity(EntityBlueprint::new(2, "a", MeshGeometry::default()));
        let ids: Vec<_> = scene.entities.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![7, 2]);
    }
}
