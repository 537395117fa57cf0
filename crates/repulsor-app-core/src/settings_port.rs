// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings port shared by Repulsor front-ends.

use crate::config::{ConfigError, ConfigService, ConfigStore};
use crate::settings::Settings;

/// Key under which [`Settings`] are persisted.
pub const SETTINGS_KEY: &str = "settings";

/// Load/save access to the user's [`Settings`].
pub trait SettingsPort {
    /// Load settings; `Ok(None)` when nothing was saved yet.
    fn load_settings(&self) -> Result<Option<Settings>, ConfigError>;
    /// Persist settings.
    fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError>;

    /// Load settings, falling back to defaults when missing. Loaded values are normalized.
    fn load_settings_or_default(&self) -> Result<Settings, ConfigError> {
        Ok(self
            .load_settings()?
            .map(Settings::normalized)
            .unwrap_or_default())
    }
}

impl<S: ConfigStore> SettingsPort for ConfigService<S> {
    fn load_settings(&self) -> Result<Option<Settings>, ConfigError> {
        self.load(SETTINGS_KEY)
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError> {
        self.save(SETTINGS_KEY, settings)
    }
}
