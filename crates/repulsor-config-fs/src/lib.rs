// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem adapters for Repulsor tools.
//!
//! - [`FsConfigStore`]: `ConfigStore` writing `<key>.json` under the platform config dir.
//! - [`FsSceneSource`]: `SceneSource` reading `<id>.json` scene blueprints from a directory.

mod scenes;

pub use scenes::FsSceneSource;

use directories::ProjectDirs;
use repulsor_app_core::config::{ConfigError, ConfigKey, ConfigStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each config key as `<base>/<key>.json`.
///
/// Saves go through a `<key>.json.tmp` sibling that is renamed over the
/// target, so an interrupted save never leaves a truncated settings file.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at the user config directory (e.g., `~/.config/repulsor`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Repulsor")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::with_base(proj.config_dir())
    }

    /// Store rooted at `base`, creating the directory if needed.
    pub fn with_base(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the config files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &ConfigKey) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &ConfigKey) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ConfigError::NotFound(key.to_string()))
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &ConfigKey, data: &[u8]) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.base)?;
        let target = self.path_for(key);
        let staging = self.base.join(format!("{key}.json.tmp"));
        fs::write(&staging, data)?;
        if let Err(err) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(ConfigError::Io(err));
        }
        debug!(path = %target.display(), bytes = data.len(), "config saved");
        Ok(())
    }
}
