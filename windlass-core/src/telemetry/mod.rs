//! Telemetry publishing
//!
//! Decides which outbound values are due on each slow tick:
//!
//! - Chain length and slack when they moved by more than the change
//!   threshold since they were last published
//! - Direction and stage whenever they change
//! - Everything known, every telemetry period
//!
//! Slack is only ever published from a valid sample. An unknown slack is
//! left out rather than reported as zero.

use heapless::Vec;
use windlass_protocol::{ChainDirection, Telemetry};

use crate::config::CadenceConfig;
use crate::deployment::DeploymentStage;
use crate::traits::Direction;

/// Values published per tick at most
pub const MAX_VALUES_PER_TICK: usize = 4;

/// Published direction for a relay direction
pub fn chain_direction(direction: Direction) -> ChainDirection {
    match direction {
        Direction::Lowering => ChainDirection::Down,
        Direction::Raising => ChainDirection::Up,
        Direction::Stopped => ChainDirection::FreeFall,
    }
}

/// Current values to publish
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    /// Chain deployed (m)
    pub rode_m: f32,
    /// Last valid slack (m)
    pub slack_m: Option<f32>,
    /// Relay direction
    pub direction: Direction,
    /// Deployment stage
    pub stage: DeploymentStage,
}

/// Change-filtered, periodic telemetry publisher
#[derive(Debug, Clone)]
pub struct TelemetryPublisher {
    threshold_m: f32,
    period_ms: u32,
    rode_m: Option<f32>,
    slack_m: Option<f32>,
    direction: Option<ChainDirection>,
    stage: Option<DeploymentStage>,
    /// Last full publish; `None` until the first one
    last_full_ms: Option<u32>,
}

impl TelemetryPublisher {
    /// Create a publisher that has published nothing yet
    pub fn new(cadence: &CadenceConfig) -> Self {
        Self {
            threshold_m: cadence.telemetry_threshold_m,
            period_ms: cadence.telemetry_period_ms,
            rode_m: None,
            slack_m: None,
            direction: None,
            stage: None,
            last_full_ms: None,
        }
    }

    /// Check if the periodic full publish is due
    pub fn full_due(&self, now_ms: u32) -> bool {
        self.last_full_ms
            .map_or(true, |last| now_ms.wrapping_sub(last) >= self.period_ms)
    }

    /// Collect the values due at `now_ms`
    pub fn publish(
        &mut self,
        now_ms: u32,
        snapshot: &TelemetrySnapshot,
    ) -> Vec<Telemetry, MAX_VALUES_PER_TICK> {
        let full = self.full_due(now_ms);
        if full {
            self.last_full_ms = Some(now_ms);
        }

        let mut out = Vec::new();

        if full || moved(self.rode_m, snapshot.rode_m, self.threshold_m) {
            self.rode_m = Some(snapshot.rode_m);
            let _ = out.push(Telemetry::RodeDeployed(snapshot.rode_m));
        }

        if let Some(slack) = snapshot.slack_m {
            if full || moved(self.slack_m, slack, self.threshold_m) {
                self.slack_m = Some(slack);
                let _ = out.push(Telemetry::ChainSlack(slack));
            }
        }

        let direction = chain_direction(snapshot.direction);
        if full || self.direction != Some(direction) {
            self.direction = Some(direction);
            let _ = out.push(Telemetry::Direction(direction));
        }

        if full || self.stage != Some(snapshot.stage) {
            self.stage = Some(snapshot.stage);
            let _ = out.push(Telemetry::Stage(snapshot.stage.name()));
        }

        out
    }
}

fn moved(last: Option<f32>, value: f32, threshold: f32) -> bool {
    last.map_or(true, |last| (value - last).abs() > threshold)
}
