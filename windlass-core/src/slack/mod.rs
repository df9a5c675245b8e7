//! Slack estimation
//!
//! Turns chain length, depth, distance-to-anchor and wind into a horizontal
//! slack figure: how much further the boat could drift back before the
//! chain comes tight. Negative slack means the boat is further away than
//! the chain can reach (the anchor has dragged or the distance is stale).

pub mod catenary;
pub mod estimator;

pub use estimator::{SensorInvalid, SlackEstimator, SlackInput, SlackSample};
