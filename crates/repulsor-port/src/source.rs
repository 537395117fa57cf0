// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene blueprint provider port.

use crate::{SceneDefinition, SceneSourceError};

/// Pure provider of immutable scene blueprints.
pub trait SceneSource {
    /// Produce the blueprint for `scene_id`.
    fn load_scene(&self, scene_id: &str) -> Result<SceneDefinition, SceneSourceError>;

    /// Identifiers this source can currently serve, sorted.
    fn available_scenes(&self) -> Result<Vec<String>, SceneSourceError>;
}
