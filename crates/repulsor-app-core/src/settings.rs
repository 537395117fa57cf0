// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! User-facing settings for a Repulsor session.
//!
//! Every field has a default so partially written JSON files still load.

use repulsor_port::EngineSettings;
use serde::{Deserialize, Serialize};

/// Highest supported diagnostics verbosity.
pub const MAX_VERBOSITY: u8 = 2;

/// When derived quantities are recomputed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractivitySettings {
    /// Recompute differentials after every transform change or step.
    pub real_time_differential: bool,
    /// Also recompute gradients; ignored unless `real_time_differential` is set.
    pub real_time_gradient: bool,
}

/// How vector fields and obstacles are shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Map magnitudes through a log scale instead of a constant factor.
    pub use_log_scale: bool,
    /// Factor applied in linear mode.
    pub linear_scale: f64,
    /// Length of the longest vector in log mode.
    pub target_max_log_length: f64,
    /// Whether obstacle visuals are visible.
    pub show_obstacles: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            use_log_scale: false,
            linear_scale: 1.0,
            target_max_log_length: 1.0,
            show_obstacles: false,
        }
    }
}

/// Physics step controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteppingSettings {
    /// Iterations performed by one step request.
    pub iterations_per_step: u32,
}

impl Default for SteppingSettings {
    fn default() -> Self {
        Self {
            iterations_per_step: 1,
        }
    }
}

/// Diagnostics controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// 0 = errors only, 1 = warnings, 2 = everything.
    pub verbosity: u8,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self { verbosity: 1 }
    }
}

/// Complete settings record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Automatic recomputation.
    pub interactivity: InteractivitySettings,
    /// Vector and obstacle display.
    pub display: DisplaySettings,
    /// Engine exponents, tree thresholds and thread count.
    pub engine: EngineSettings,
    /// Physics stepping.
    pub stepping: SteppingSettings,
    /// Diagnostics.
    pub debug: DebugSettings,
}

impl Settings {
    /// Clamp out-of-range values: verbosity to `0..=2`, thread count to at least one.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.debug.verbosity = self.debug.verbosity.min(MAX_VERBOSITY);
        self.engine.thread_count = self.engine.effective_thread_count();
        self
    }

    /// Whether gradients should follow every change automatically.
    pub const fn real_time_gradient(&self) -> bool {
        self.interactivity.real_time_differential && self.interactivity.real_time_gradient
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert!(!s.interactivity.real_time_differential);
        assert!(!s.display.use_log_scale);
        assert_eq!(s.display.linear_scale, 1.0);
        assert_eq!(s.stepping.iterations_per_step, 1);
        assert_eq!(s.debug.verbosity, 1);
        assert_eq!(s.engine.exponents.q, 6.0);
        assert_eq!(s.engine.tree.max_refinement, 30);
    }

    #[test]
    fn normalized_clamps_verbosity_and_threads() {
        let mut s = Settings::default();
        s.debug.verbosity = 9;
        s.engine.thread_count = 0;
        let s = s.normalized();
        assert_eq!(s.debug.verbosity, 2);
        assert_eq!(s.engine.thread_count, 1);
    }

    #[test]
    fn real_time_gradient_requires_real_time_differential() {
        let mut s = Settings::default();
        s.interactivity.real_time_gradient = true;
        assert!(!s.real_time_gradient());
        s.interactivity.real_time_differential = true;
        assert!(s.real_time_gradient());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{ "display": { "use_log_scale": true } }"#).unwrap();
        assert!(s.display.use_log_scale);
        assert_eq!(s.display.target_max_log_length, 1.0);
        assert_eq!(s.engine.tree.cluster_split_threshold, 2);
    }
}
