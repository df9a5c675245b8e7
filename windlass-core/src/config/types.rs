//! Configuration type definitions
//!
//! Every tunable of the controller lives here. `Default` for each section is
//! the stock tuning for a 10 mm chain on a small cruising yacht; a TOML
//! document only needs to name the keys it changes.

use serde::{Deserialize, Serialize};

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Document could not be parsed
    Parse,
    /// Chain bounds empty or inverted
    ChainBounds,
    /// Metres per pulse not positive
    PulseDistance,
    /// Speed bounds or default speed inconsistent
    SpeedBounds,
    /// Timeout factor below 1 or smoothing outside (0, 1]
    Timing,
    /// Pause threshold not below resume threshold
    SlackHysteresis,
    /// Scope ratios not increasing or below 1
    ScopeRatios,
    /// Auto-deployment depth window empty
    DepthWindow,
    /// Catenary parameters non-physical
    Catenary,
    /// Tick cadence zero or fast slower than slow
    Cadence,
    /// Deploy steps or minimum raise not positive
    StepSizes,
}

/// Chain geometry and soft limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct ChainConfig {
    /// Shortest representable chain length (m)
    pub min_length_m: f32,
    /// Total chain in the locker (m)
    pub max_length_m: f32,
    /// Lowering never targets beyond this (m)
    pub stop_before_max_m: f32,
    /// Gypsy circumference, chain moved per counter pulse (m)
    pub metres_per_pulse: f32,
    /// Pulses this long after the relays release still count in the last
    /// driven direction (ms)
    pub coast_ms: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            min_length_m: 0.0,
            max_length_m: 100.0,
            stop_before_max_m: 100.0,
            metres_per_pulse: 0.25,
            coast_ms: 2000,
        }
    }
}

impl ChainConfig {
    /// Upper bound for movement targets
    pub fn upper_limit(&self) -> f32 {
        self.stop_before_max_m.min(self.max_length_m)
    }

    /// Clamp a length into `[min, max]`
    pub fn clamp(&self, length_m: f32) -> f32 {
        length_m.clamp(self.min_length_m, self.max_length_m)
    }
}

/// Relay timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct RelayConfig {
    /// Minimum time between a stop and the next engage (ms)
    pub settle_ms: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { settle_ms: 200 }
    }
}

/// Movement timeout and speed estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct MotionConfig {
    /// Multiplier applied to the expected travel time
    pub timeout_factor: f32,
    /// Fixed margin added to every timeout (ms)
    pub timeout_margin_ms: u32,
    /// Target counts as reached within this distance (m)
    pub arrival_tolerance_m: f32,
    /// Speed assumed before any calibration (m/s)
    pub default_speed_m_s: f32,
    /// Weight of a new measurement in the speed average
    pub speed_smoothing: f32,
    /// Lowest plausible measured speed (m/s)
    pub min_speed_m_s: f32,
    /// Highest plausible measured speed (m/s)
    pub max_speed_m_s: f32,
    /// Shortest movement used for recalibration (m)
    pub min_calibration_distance_m: f32,
    /// Shortest movement duration used for recalibration (ms)
    pub min_calibration_ms: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            timeout_factor: 1.5,
            timeout_margin_ms: 5000,
            arrival_tolerance_m: 0.05,
            default_speed_m_s: 1.0,
            speed_smoothing: 0.2,
            min_speed_m_s: 0.01,
            max_speed_m_s: 5.0,
            min_calibration_distance_m: 0.01,
            min_calibration_ms: 100,
        }
    }
}

/// How `autoRetrieve` hauls the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetrievalStrategy {
    /// One raise to the remainder, paused and resumed on slack
    #[default]
    Continuous,
    /// Raises sized to the measured slack, with a final pull near the anchor
    Staged,
}

/// Slack-gated raising
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct RetrievalConfig {
    /// Raising pauses when slack drops below this (m)
    pub pause_slack_m: f32,
    /// Paused raising resumes once slack reaches this (m)
    pub resume_slack_m: f32,
    /// Minimum time between pause and resume transitions (ms)
    pub cooldown_ms: u32,
    /// Slack gating is suppressed within `depth + bow + this` (m)
    pub final_pull_threshold_m: f32,
    /// autoRetrieve stops with this much chain still out (m)
    pub remainder_m: f32,
    /// How autoRetrieve runs
    pub strategy: RetrievalStrategy,
    /// Staged: smallest raise worth issuing (m)
    pub min_raise_m: f32,
    /// Staged: wait after each raise before the next one (ms)
    pub raise_cooldown_ms: u32,
    /// Staged: a raise in progress stops when slack drops below this (m)
    pub stop_slack_m: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            pause_slack_m: 0.2,
            resume_slack_m: 1.0,
            cooldown_ms: 3000,
            final_pull_threshold_m: 10.0,
            remainder_m: 2.0,
            strategy: RetrievalStrategy::Continuous,
            min_raise_m: 1.0,
            raise_cooldown_ms: 3000,
            stop_slack_m: 0.0,
        }
    }
}

/// How Deploy stages pay out chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeployStrategy {
    /// One movement to the stage target, held on the slack ratio
    #[default]
    Continuous,
    /// Short steps whenever slack falls behind the chain paid out
    Incremental,
}

/// Staged deployment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct DeploymentConfig {
    /// Drop stage pays out depth plus this (m)
    pub drop_offset_m: f32,
    /// Scope ratio of the first deploy stage
    pub first_scope: f32,
    /// Scope ratio of the second deploy stage
    pub second_scope: f32,
    /// Scope ratio of the full deploy stage
    pub full_scope: f32,
    /// Full deploy never targets less than this (m)
    pub min_full_chain_m: f32,
    /// Deploy stages hold while slack / depth exceeds this
    pub max_slack_ratio: f32,
    /// Shallowest depth accepted for auto deployment (m)
    pub min_depth_m: f32,
    /// Deepest depth accepted for auto deployment (m)
    pub max_depth_m: f32,
    /// WaitTight stage timeout (ms)
    pub wait_tight_ms: u32,
    /// WaitFirst stage timeout (ms)
    pub wait_first_ms: u32,
    /// WaitSecond stage timeout (ms)
    pub wait_second_ms: u32,
    /// HoldDrop settle delay (ms)
    pub hold_drop_ms: u32,
    /// HoldFirst settle delay (ms)
    pub hold_first_ms: u32,
    /// HoldSecond settle delay (ms)
    pub hold_second_ms: u32,
    /// Times a timed-out deploy movement is re-issued before aborting
    pub max_retries: u8,
    /// How Deploy stages run
    pub strategy: DeployStrategy,
    /// Incremental: slack aimed for, as a fraction of deployed chain
    pub target_slack_ratio: f32,
    /// Incremental: shortfall against the aimed slack that calls for a step (m)
    pub min_slack_deficit_m: f32,
    /// Incremental: normal step (m)
    pub step_m: f32,
    /// Incremental: step while slack is falling fast (m)
    pub fast_step_m: f32,
    /// Incremental: slack falling faster than this uses the fast step (m/s)
    pub fast_slack_fall_m_s: f32,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            drop_offset_m: 4.0,
            first_scope: 3.0,
            second_scope: 5.0,
            full_scope: 7.0,
            min_full_chain_m: 10.0,
            max_slack_ratio: 0.5,
            min_depth_m: 3.0,
            max_depth_m: 45.0,
            wait_tight_ms: 30_000,
            wait_first_ms: 60_000,
            wait_second_ms: 90_000,
            hold_drop_ms: 2_000,
            hold_first_ms: 30_000,
            hold_second_ms: 75_000,
            max_retries: 2,
            strategy: DeployStrategy::Continuous,
            target_slack_ratio: 0.10,
            min_slack_deficit_m: 0.2,
            step_m: 0.5,
            fast_step_m: 1.0,
            fast_slack_fall_m_s: 0.05,
        }
    }
}

/// Catenary and wind-load model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct CatenaryConfig {
    /// Height of the bow roller above the water (m)
    pub bow_height_m: f32,
    /// Chain mass per metre (kg/m)
    pub chain_weight_kg_per_m: f32,
    /// Air density (kg/m³)
    pub air_density: f32,
    /// Hull and rig drag coefficient
    pub drag_coefficient: f32,
    /// Windage area (m²)
    pub windage_area_m2: f32,
    /// Constant force from current and hull resistance (N)
    pub baseline_force_n: f32,
    /// Upper clamp on the horizontal force (N)
    pub max_force_n: f32,
    /// Wind assumed before any reading arrives (m/s, 10 kn)
    pub default_wind_m_s: f32,
    /// Lower clamp on the catenary factor
    pub min_factor: f32,
    /// Upper clamp on the catenary factor
    pub max_factor: f32,
    /// Use this factor instead of the physical model
    pub fixed_factor: Option<f32>,
}

impl Default for CatenaryConfig {
    fn default() -> Self {
        Self {
            bow_height_m: 2.0,
            chain_weight_kg_per_m: 2.2,
            air_density: 1.225,
            drag_coefficient: 1.2,
            windage_area_m2: 15.0,
            baseline_force_n: 30.0,
            max_force_n: 2000.0,
            default_wind_m_s: 5.14,
            min_factor: 0.80,
            max_factor: 0.99,
            fixed_factor: None,
        }
    }
}

/// Position persistence policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct PersistenceConfig {
    /// Minimum change since the last save (m)
    pub min_distance_m: f32,
    /// Minimum time since the last save (ms)
    pub min_interval_ms: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 0.5,
            min_interval_ms: 5000,
        }
    }
}

/// Tick cadence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct CadenceConfig {
    /// Controller tick period (ms)
    pub fast_tick_ms: u32,
    /// Slack and deployment tick period (ms)
    pub slow_tick_ms: u32,
    /// Full telemetry republish period (ms)
    pub telemetry_period_ms: u32,
    /// Smallest published change in length or slack (m)
    pub telemetry_threshold_m: f32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            fast_tick_ms: 100,
            slow_tick_ms: 500,
            telemetry_period_ms: 1000,
            telemetry_threshold_m: 0.01,
        }
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct WindlassConfig {
    pub chain: ChainConfig,
    pub relay: RelayConfig,
    pub motion: MotionConfig,
    pub retrieval: RetrievalConfig,
    pub deployment: DeploymentConfig,
    pub catenary: CatenaryConfig,
    pub persistence: PersistenceConfig,
    pub cadence: CadenceConfig,
}

impl WindlassConfig {
    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chain = &self.chain;
        if !(chain.min_length_m >= 0.0 && chain.min_length_m < chain.max_length_m)
            || !(chain.stop_before_max_m > chain.min_length_m)
        {
            return Err(ConfigError::ChainBounds);
        }
        if !(chain.metres_per_pulse > 0.0) {
            return Err(ConfigError::PulseDistance);
        }

        let motion = &self.motion;
        if !(motion.min_speed_m_s > 0.0 && motion.min_speed_m_s < motion.max_speed_m_s)
            || !(motion.default_speed_m_s >= motion.min_speed_m_s
                && motion.default_speed_m_s <= motion.max_speed_m_s)
        {
            return Err(ConfigError::SpeedBounds);
        }
        if !(motion.timeout_factor >= 1.0)
            || !(motion.speed_smoothing > 0.0 && motion.speed_smoothing <= 1.0)
            || !(motion.arrival_tolerance_m >= 0.0)
        {
            return Err(ConfigError::Timing);
        }

        if !(self.retrieval.pause_slack_m < self.retrieval.resume_slack_m) {
            return Err(ConfigError::SlackHysteresis);
        }

        let deploy = &self.deployment;
        if !(deploy.first_scope >= 1.0
            && deploy.first_scope < deploy.second_scope
            && deploy.second_scope < deploy.full_scope)
            || !(deploy.max_slack_ratio > 0.0)
        {
            return Err(ConfigError::ScopeRatios);
        }
        if !(deploy.min_depth_m >= 0.0 && deploy.min_depth_m < deploy.max_depth_m) {
            return Err(ConfigError::DepthWindow);
        }
        if !(deploy.step_m > 0.0 && deploy.fast_step_m >= deploy.step_m)
            || !(deploy.target_slack_ratio > 0.0)
            || !(self.retrieval.min_raise_m > 0.0)
        {
            return Err(ConfigError::StepSizes);
        }

        let cat = &self.catenary;
        let factor_ok = cat
            .fixed_factor
            .map_or(true, |f| f >= cat.min_factor && f <= cat.max_factor);
        if !(cat.bow_height_m >= 0.0)
            || !(cat.chain_weight_kg_per_m > 0.0)
            || !(cat.baseline_force_n > 0.0 && cat.baseline_force_n <= cat.max_force_n)
            || !(cat.min_factor > 0.0 && cat.min_factor <= cat.max_factor && cat.max_factor <= 1.0)
            || !factor_ok
        {
            return Err(ConfigError::Catenary);
        }

        let cadence = &self.cadence;
        if cadence.fast_tick_ms == 0 || cadence.fast_tick_ms > cadence.slow_tick_ms {
            return Err(ConfigError::Cadence);
        }

        Ok(())
    }
}
