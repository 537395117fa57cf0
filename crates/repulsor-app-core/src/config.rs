// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed persistence of Repulsor settings over a raw blob store.
//!
//! Values are stored as pretty-printed JSON under short keys such as
//! [`SETTINGS_KEY`](crate::settings_port::SETTINGS_KEY). Filesystem stores use
//! the key as a file stem, so keys are limited to ASCII letters, digits, `-`
//! and `_`; [`ConfigKey`] enforces this before any store sees the key.

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// A validated store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Validates `key`. Empty keys and keys with any other character fail
    /// with [`ConfigError::InvalidKey`].
    pub fn new(key: &str) -> Result<Self, ConfigError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        if valid {
            Ok(Self(key.to_owned()))
        } else {
            Err(ConfigError::InvalidKey(key.to_owned()))
        }
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage port for raw config blobs.
pub trait ConfigStore {
    /// Load a raw blob. Returns [`ConfigError::NotFound`] when missing.
    fn load_raw(&self, key: &ConfigKey) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw blob, replacing any previous value. A failed save must
    /// leave the previous value readable.
    fn save_raw(&self, key: &ConfigKey, data: &[u8]) -> Result<(), ConfigError>;
}

/// Config persistence failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The key is empty or has characters outside `[A-Za-z0-9_-]`.
    #[error("invalid config key '{0}'")]
    InvalidKey(String),
    /// Nothing is stored under the key.
    #[error("no config stored under '{0}'")]
    NotFound(String),
    /// Reading or writing the backing storage failed.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored blob is not valid JSON for the requested type.
    #[error("config '{key}' could not be decoded: {source}")]
    Decode {
        /// Key that was read.
        key: String,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The value could not be encoded.
    #[error("config '{key}' could not be encoded: {source}")]
    Encode {
        /// Key that was written.
        key: String,
        /// Encoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// Store-specific failure.
    #[error("config store failure: {0}")]
    Other(String),
}

/// Encodes typed values as pretty JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a service over `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the inner store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and decode the value stored under `key`.
    ///
    /// A missing key or a whitespace-only blob yields `Ok(None)`, so an
    /// emptied settings file behaves like a fresh install.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        let key = ConfigKey::new(key)?;
        let bytes = match self.store.load_raw(&key) {
            Ok(bytes) => bytes,
            Err(ConfigError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigError::Decode {
                key: key.0,
                source,
            })
    }

    /// Encode and persist `value` under `key`. The blob ends with a newline.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let key = ConfigKey::new(key)?;
        let mut data = serde_json::to_vec_pretty(value).map_err(|source| ConfigError::Encode {
            key: key.0.clone(),
            source,
        })?;
        data.push(b'\n');
        self.store.save_raw(&key, &data)
    }
}
