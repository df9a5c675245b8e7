//! Slack estimator
//!
//! Pure computation: the same input always yields the same sample, and the
//! estimator holds nothing but its configuration.
//!
//! 1. `effective_depth = max(0, depth − bow_height)`
//! 2. `C ≤ effective_depth` → reach 0, sample flagged degenerate
//! 3. `reach = sqrt(C² − effective_depth²) × factor`
//! 4. `slack = reach − distance`
//!
//! Negative slack is a valid result and is never clamped.

use libm::sqrtf;

use super::catenary;
use crate::config::CatenaryConfig;

/// Which input made a sample impossible to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorInvalid {
    /// Chain length not finite
    ChainLength,
    /// Depth missing, not finite or negative
    Depth,
    /// Distance-to-anchor missing, not finite or negative
    Distance,
    /// Wind speed not finite or negative
    WindSpeed,
}

/// Inputs for one slack computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlackInput {
    /// Deployed chain (m)
    pub chain_length_m: f32,
    /// Water depth below the transducer (m)
    pub depth_m: f32,
    /// Horizontal distance from bow to anchor (m)
    pub distance_m: f32,
    /// Wind speed (m/s); `None` until a reading has arrived
    pub wind_m_s: Option<f32>,
    /// Time of computation (ms)
    pub timestamp_ms: u32,
}

/// Result of one slack computation
///
/// Immutable once computed; a new one replaces it on the next slow tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlackSample {
    /// Deployed chain (m)
    pub chain_length_m: f32,
    /// Water depth (m)
    pub depth_m: f32,
    /// Distance to anchor (m)
    pub distance_m: f32,
    /// Wind speed used, after defaulting (m/s)
    pub wind_m_s: f32,
    /// Depth below the bow roller's drop (m)
    pub effective_depth_m: f32,
    /// Horizontal reach of the chain (m)
    pub reach_m: f32,
    /// Catenary factor applied (0 for degenerate samples)
    pub catenary_factor: f32,
    /// Horizontal slack (m)
    pub slack_m: f32,
    /// Chain no longer than the vertical drop
    pub degenerate: bool,
    /// Time of computation (ms)
    pub timestamp_ms: u32,
}

/// Catenary-based slack estimator
#[derive(Debug, Clone)]
pub struct SlackEstimator {
    config: CatenaryConfig,
}

impl SlackEstimator {
    /// Create an estimator
    pub fn new(config: CatenaryConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &CatenaryConfig {
        &self.config
    }

    /// Compute a slack sample
    pub fn estimate(&self, input: &SlackInput) -> Result<SlackSample, SensorInvalid> {
        if !input.distance_m.is_finite() || input.distance_m < 0.0 {
            return Err(SensorInvalid::Distance);
        }

        let parts = self.reach_parts(input.chain_length_m, input.depth_m, input.wind_m_s)?;

        Ok(SlackSample {
            chain_length_m: input.chain_length_m,
            depth_m: input.depth_m,
            distance_m: input.distance_m,
            wind_m_s: parts.wind_m_s,
            effective_depth_m: parts.effective_depth_m,
            reach_m: parts.reach_m,
            catenary_factor: parts.factor,
            slack_m: parts.reach_m - input.distance_m,
            degenerate: parts.degenerate,
            timestamp_ms: input.timestamp_ms,
        })
    }

    /// Horizontal reach of `chain_m` at `depth_m` (m)
    ///
    /// Zero when the chain does not reach past the vertical drop.
    pub fn reach(
        &self,
        chain_m: f32,
        depth_m: f32,
        wind_m_s: Option<f32>,
    ) -> Result<f32, SensorInvalid> {
        self.reach_parts(chain_m, depth_m, wind_m_s)
            .map(|parts| parts.reach_m)
    }

    /// Effective depth below the bow drop (m)
    pub fn effective_depth(&self, depth_m: f32) -> f32 {
        (depth_m - self.config.bow_height_m).max(0.0)
    }

    fn reach_parts(
        &self,
        chain_m: f32,
        depth_m: f32,
        wind_m_s: Option<f32>,
    ) -> Result<ReachParts, SensorInvalid> {
        if !chain_m.is_finite() {
            return Err(SensorInvalid::ChainLength);
        }
        if !depth_m.is_finite() || depth_m < 0.0 {
            return Err(SensorInvalid::Depth);
        }
        let wind = match wind_m_s {
            Some(w) if !w.is_finite() || w < 0.0 => return Err(SensorInvalid::WindSpeed),
            Some(w) => w,
            None => self.config.default_wind_m_s,
        };

        let effective_depth = self.effective_depth(depth_m);
        if chain_m <= effective_depth {
            return Ok(ReachParts {
                reach_m: 0.0,
                factor: 0.0,
                effective_depth_m: effective_depth,
                wind_m_s: wind,
                degenerate: true,
            });
        }

        let straight = sqrtf(chain_m * chain_m - effective_depth * effective_depth);
        let force = catenary::horizontal_force(wind, &self.config);
        let factor = catenary::factor(chain_m, effective_depth, force, &self.config);

        Ok(ReachParts {
            reach_m: straight * factor,
            factor,
            effective_depth_m: effective_depth,
            wind_m_s: wind,
            degenerate: false,
        })
    }
}

struct ReachParts {
    reach_m: f32,
    factor: f32,
    effective_depth_m: f32,
    wind_m_s: f32,
    degenerate: bool,
}
