//! Automatic anchor deployment
//!
//! [`DeploymentStage`] is the pure stage machine; [`DeploymentManager`]
//! runs it against the chain controller and the sensor environment.

pub mod manager;
pub mod stage;

pub use manager::{AbortReason, DeploymentEvent, DeploymentManager, DeploymentPlan};
pub use stage::{DeploymentStage, StageEvent, StageKind, TransitionError};
