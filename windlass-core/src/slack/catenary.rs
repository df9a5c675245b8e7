//! Catenary model
//!
//! A chain between the bow roller and the anchor hangs in a catenary, so its
//! horizontal reach is shorter than the straight-line figure. How much
//! shorter depends on the horizontal tension, which we estimate from wind
//! drag plus a constant baseline for current and hull resistance.
//!
//! With `H` the horizontal force, `w` the chain weight per metre and `d` the
//! vertical drop, the catenary parameter is `a = H / w` and the suspended
//! part of the chain (bow to touchdown) has length `s = sqrt(d² + 2·d·a)`.
//! If the chain is longer than `s` the rest lies on the bottom:
//!
//! ```text
//! reach = a·asinh(s / a) + (C − s)
//! ```
//!
//! Otherwise the whole chain is in the air and the shallow-sag
//! approximation `straight − w·C² / (8·H)` is used.

use libm::{asinhf, sqrtf};

use crate::config::CatenaryConfig;

/// Standard gravity (m/s²)
pub const GRAVITY: f32 = 9.81;

/// Horizontal force on the boat for a wind speed (N)
///
/// `½·ρ·Cd·A·v²` plus the baseline, clamped to `[baseline, max]`.
pub fn horizontal_force(wind_m_s: f32, config: &CatenaryConfig) -> f32 {
    let drag = 0.5
        * config.air_density
        * config.drag_coefficient
        * config.windage_area_m2
        * wind_m_s
        * wind_m_s;

    (drag + config.baseline_force_n).clamp(config.baseline_force_n, config.max_force_n)
}

/// Ratio of catenary reach to straight-line reach
///
/// `chain_m` must exceed `drop_m`. The result is clamped to the configured
/// factor bounds; with a fixed factor configured that value is returned.
pub fn factor(chain_m: f32, drop_m: f32, force_n: f32, config: &CatenaryConfig) -> f32 {
    if let Some(fixed) = config.fixed_factor {
        return fixed.clamp(config.min_factor, config.max_factor);
    }

    let straight = sqrtf(chain_m * chain_m - drop_m * drop_m);
    if !(straight > 0.0) {
        return config.min_factor;
    }

    let w = config.chain_weight_kg_per_m * GRAVITY;
    let a = force_n / w;
    let suspended = sqrtf(drop_m * drop_m + 2.0 * drop_m * a);

    let reach = if suspended < chain_m {
        a * asinhf(suspended / a) + (chain_m - suspended)
    } else {
        straight - w * chain_m * chain_m / (8.0 * force_n)
    };

    (reach / straight).clamp(config.min_factor, config.max_factor)
}
