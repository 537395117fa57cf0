// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Display scaling for per-vertex vector fields.

use glam::DVec3;
use repulsor_app_core::settings::DisplaySettings;

/// Magnitudes at or below this are drawn as zero in log mode.
const ZERO_MAGNITUDE: f64 = 1e-12;

/// Log ranges narrower than this fall back to linear scaling.
const MIN_LOG_RANGE: f64 = 1e-6;

/// Scales `vectors` for display.
///
/// Linear mode multiplies by `linear_scale`. Log mode maps each magnitude
/// onto `[0, target_max_log_length]` by its position between the smallest and
/// largest non-zero magnitudes on a log axis; degenerate ranges use linear
/// mode instead.
pub fn scale_for_display(vectors: &[DVec3], display: &DisplaySettings) -> Vec<DVec3> {
    let linear = || -> Vec<DVec3> { vectors.iter().map(|v| *v * display.linear_scale).collect() };
    if !display.use_log_scale {
        return linear();
    }

    let (min, max) = vectors
        .iter()
        .map(|v| v.length())
        .filter(|m| *m > ZERO_MAGNITUDE)
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), m| (lo.min(m), hi.max(m)));
    if !min.is_finite() || max <= min {
        return linear();
    }
    let log_min = min.ln();
    let range = max.ln() - log_min;
    if range < MIN_LOG_RANGE {
        return linear();
    }

    vectors
        .iter()
        .map(|v| {
            let magnitude = v.length();
            if magnitude <= ZERO_MAGNITUDE {
                DVec3::ZERO
            } else {
                *v / magnitude * ((magnitude.ln() - log_min) / range) * display.target_max_log_length
            }
        })
        .collect()
}
