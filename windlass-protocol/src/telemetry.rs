//! Outbound telemetry values
//!
//! The core publishes these on value change or periodically. Each value has
//! a fixed Signal K path so the bus adapter can forward it without knowing
//! anything about the controller.

/// Path for the amount of chain deployed (metres)
pub const PATH_RODE_DEPLOYED: &str = "navigation.anchor.rodeDeployed";

/// Path for the catenary-adjusted horizontal slack (metres)
pub const PATH_CHAIN_SLACK: &str = "navigation.anchor.chainSlack";

/// Path for the current motion direction
pub const PATH_CHAIN_DIRECTION: &str = "navigation.anchor.chainDirection";

/// Path for the deployment stage name
pub const PATH_DEPLOYMENT_STAGE: &str = "navigation.anchor.deploymentStage";

/// Path for command and movement status codes
pub const PATH_WINDLASS_STATUS: &str = "navigation.anchor.windlassStatus";

/// Published motion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainDirection {
    /// Motor not driven (chain may still run out under its own weight)
    FreeFall,
    /// Deploying chain
    Down,
    /// Retrieving chain
    Up,
}

impl ChainDirection {
    /// Wire name of the direction
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainDirection::FreeFall => "free fall",
            ChainDirection::Down => "down",
            ChainDirection::Up => "up",
        }
    }
}

/// Explicit status signal for commands and movements
///
/// Every rejected command and every timeout produces one of these, so that
/// failures are distinguishable from successful completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusCode {
    /// Command accepted and started
    Accepted,
    /// Command rejected at the boundary (busy, invalid, out of range)
    Rejected,
    /// Movement reached its target
    Completed,
    /// Movement stopped by STOP or an abort
    Stopped,
    /// Movement exceeded its estimated duration
    TimedOut,
    /// Sensor reading invalid; previous value retained
    SensorInvalid,
    /// Fatal actuator fault; all motion stopped
    Fault,
}

impl StatusCode {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Accepted => "accepted",
            StatusCode::Rejected => "rejected",
            StatusCode::Completed => "completed",
            StatusCode::Stopped => "stopped",
            StatusCode::TimedOut => "timeout",
            StatusCode::SensorInvalid => "sensor invalid",
            StatusCode::Fault => "fault",
        }
    }

    /// Check if this status reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StatusCode::Rejected | StatusCode::TimedOut | StatusCode::SensorInvalid | StatusCode::Fault
        )
    }
}

/// A single published value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Telemetry {
    /// Chain deployed in metres
    RodeDeployed(f32),
    /// Horizontal slack in metres (may be negative)
    ChainSlack(f32),
    /// Current motion direction
    Direction(ChainDirection),
    /// Current deployment stage name
    Stage(&'static str),
    /// Command or movement status
    Status(StatusCode),
}

impl Telemetry {
    /// Signal K path this value is published on
    pub fn path(&self) -> &'static str {
        match self {
            Telemetry::RodeDeployed(_) => PATH_RODE_DEPLOYED,
            Telemetry::ChainSlack(_) => PATH_CHAIN_SLACK,
            Telemetry::Direction(_) => PATH_CHAIN_DIRECTION,
            Telemetry::Stage(_) => PATH_DEPLOYMENT_STAGE,
            Telemetry::Status(_) => PATH_WINDLASS_STATUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_names() {
        assert_eq!(ChainDirection::FreeFall.as_str(), "free fall");
        assert_eq!(ChainDirection::Down.as_str(), "down");
        assert_eq!(ChainDirection::Up.as_str(), "up");
    }

    #[test]
    fn test_paths() {
        assert_eq!(Telemetry::RodeDeployed(1.0).path(), PATH_RODE_DEPLOYED);
        assert_eq!(Telemetry::ChainSlack(-0.5).path(), PATH_CHAIN_SLACK);
        assert_eq!(
            Telemetry::Direction(ChainDirection::Up).path(),
            PATH_CHAIN_DIRECTION
        );
        assert_eq!(Telemetry::Stage("Idle").path(), PATH_DEPLOYMENT_STAGE);
        assert_eq!(
            Telemetry::Status(StatusCode::TimedOut).path(),
            PATH_WINDLASS_STATUS
        );
    }

    #[test]
    fn test_failures_are_distinguishable() {
        assert!(StatusCode::Rejected.is_failure());
        assert!(StatusCode::TimedOut.is_failure());
        assert!(StatusCode::Fault.is_failure());
        assert!(!StatusCode::Completed.is_failure());
        assert!(!StatusCode::Accepted.is_failure());
        assert_ne!(StatusCode::TimedOut.as_str(), StatusCode::Completed.as_str());
    }
}
