// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine parameter types.
//!
//! The coordinator never interprets these values; it forwards them to the
//! engine on construction and whenever the user changes them.

/// Exponents selecting the energy/metric pair.
///
/// Changing either value requires rebuilding the engine's energy object.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exponents {
    /// Tangent-point exponent `q`.
    pub q: f64,
    /// Tangent-point exponent `p`.
    pub p: f64,
}

impl Default for Exponents {
    fn default() -> Self {
        Self { q: 6.0, p: 12.0 }
    }
}

/// Cluster tree, separation and refinement thresholds applied per mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TreeSettings {
    /// Adaptivity threshold.
    pub theta: f64,
    /// Adaptivity threshold for intersecting clusters.
    pub intersection_theta: f64,
    /// Far-field admissibility parameter.
    pub far_field_separation: f64,
    /// Near-field admissibility parameter.
    pub near_field_separation: f64,
    /// Near-field intersection parameter.
    pub near_field_intersection: f64,
    /// Maximum refinement depth.
    pub max_refinement: u32,
    /// Cluster split threshold.
    pub cluster_split_threshold: u32,
    /// Depth up to which tree percolation runs in parallel.
    pub parallel_percolation_depth: u32,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            theta: 10.0,
            intersection_theta: 1.0e10,
            far_field_separation: 0.25,
            near_field_separation: 10.0,
            near_field_intersection: 1.0e10,
            max_refinement: 30,
            cluster_split_threshold: 2,
            parallel_percolation_depth: 5,
        }
    }
}

/// Everything the engine needs to know about the user's parameter choices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EngineSettings {
    /// Energy/metric exponents.
    pub exponents: Exponents,
    /// Per-mesh tree settings.
    pub tree: TreeSettings,
    /// Worker threads the engine may use for its kernels.
    pub thread_count: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            exponents: Exponents::default(),
            tree: TreeSettings::default(),
            thread_count: 1,
        }
    }
}

impl EngineSettings {
    /// Thread count handed to the engine; never zero.
    pub fn effective_thread_count(&self) -> usize {
        self.thread_count.max(1)
    }
}

/// Limits for the iterative metric solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveParams {
    /// Iteration cap.
    pub max_iterations: u32,
    /// Relative residual tolerance.
    pub relative_tolerance: f64,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            relative_tolerance: 1e-5,
        }
    }
}
