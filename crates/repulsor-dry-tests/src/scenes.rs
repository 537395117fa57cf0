// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory scene source.

use std::collections::BTreeMap;

use repulsor_port::{SceneDefinition, SceneSource, SceneSourceError};

/// [`SceneSource`] serving blueprints from a map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySceneSource {
    scenes: BTreeMap<String, SceneDefinition>,
}

impl InMemorySceneSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a scene under `id`.
    #[must_use]
    pub fn with_scene(mut self, id: &str, scene: SceneDefinition) -> Self {
        self.scenes.insert(id.to_owned(), scene);
        self
    }
}

impl SceneSource for InMemorySceneSource {
    fn load_scene(&self, scene_id: &str) -> Result<SceneDefinition, SceneSourceError> {
        self.scenes
            .get(scene_id)
            .cloned()
            .ok_or_else(|| SceneSourceError::NotFound(scene_id.to_owned()))
    }

    fn available_scenes(&self) -> Result<Vec<String>, SceneSourceError> {
        Ok(self.scenes.keys().cloned().collect())
    }
}
