// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Repulsor tools (settings, config, diagnostics).
//! Keeps the session and its adapters thin and framework-agnostic.

pub mod config;
pub mod diagnostics;
pub mod settings;
pub mod settings_port;
