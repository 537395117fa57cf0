// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON scene files on disk.

use repulsor_port::{SceneDefinition, SceneSource, SceneSourceError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Serves `<dir>/<id>.json` scene blueprints.
pub struct FsSceneSource {
    dir: PathBuf,
}

impl FsSceneSource {
    /// Source reading from `dir`. The directory is not required to exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory scenes are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode a single scene file outside the source directory.
    pub fn read_file(path: &Path) -> Result<SceneDefinition, SceneSourceError> {
        let id = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => SceneSourceError::NotFound(id.clone()),
            _ => SceneSourceError::Io(err.to_string()),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| SceneSourceError::Malformed {
            id,
            reason: err.to_string(),
        })
    }

    fn path_for(&self, scene_id: &str) -> Result<PathBuf, SceneSourceError> {
        let valid = !scene_id.is_empty()
            && scene_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !scene_id.starts_with('.');
        if !valid {
            return Err(SceneSourceError::NotFound(scene_id.to_owned()));
        }
        Ok(self.dir.join(format!("{scene_id}.json")))
    }
}

impl SceneSource for FsSceneSource {
    fn load_scene(&self, scene_id: &str) -> Result<SceneDefinition, SceneSourceError> {
        Self::read_file(&self.path_for(scene_id)?)
    }

    fn available_scenes(&self) -> Result<Vec<String>, SceneSourceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SceneSourceError::Io(err.to_string())),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| SceneSourceError::Io(err.to_string()))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
