//! Sensor inputs
//!
//! Sensor callbacks (bus subscriptions, interrupt handlers) only ever write
//! a single value into a [`SensorSlot`]. The tick loop takes whatever arrived
//! since the last tick and folds it into an [`Environment`] that keeps the
//! last valid value of each input. An invalid write is reported on the one
//! refresh that takes it.

pub mod slots;

pub use slots::{Reading, SensorSlot, SensorSlots, SensorSnapshot};

use crate::slack::SlackSample;

/// Last valid value of every input, owned by the tick loop
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Environment {
    /// Water depth (m)
    pub depth_m: Option<f32>,
    /// Distance from bow to anchor (m)
    pub distance_m: Option<f32>,
    /// Wind speed (m/s)
    pub wind_m_s: Option<f32>,
    /// Current tide height (m)
    pub tide_now_m: Option<f32>,
    /// Tide height at high water (m)
    pub tide_high_m: Option<f32>,
    /// Last valid slack sample
    pub slack: Option<SlackSample>,
}

/// Inputs that came in invalid on the last refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidInputs {
    pub depth: bool,
    pub distance: bool,
    pub wind: bool,
    pub tide: bool,
}

impl InvalidInputs {
    /// Check if any input needed by the slack estimate was invalid
    pub fn blocks_slack(&self) -> bool {
        self.depth || self.distance || self.wind
    }

    /// Check if anything was invalid
    pub fn any(&self) -> bool {
        self.blocks_slack() || self.tide
    }
}

impl Environment {
    /// Fold a snapshot in, keeping previous values where a reading is
    /// missing or invalid
    pub fn refresh(&mut self, snapshot: &SensorSnapshot) -> InvalidInputs {
        let invalid = InvalidInputs {
            depth: fold(&mut self.depth_m, snapshot.depth, is_length),
            distance: fold(&mut self.distance_m, snapshot.distance, is_length),
            wind: fold(&mut self.wind_m_s, snapshot.wind, is_length),
            tide: fold(&mut self.tide_now_m, snapshot.tide_now, is_level)
                | fold(&mut self.tide_high_m, snapshot.tide_high, is_level),
        };

        if invalid.any() {
            log_warn!("Sensors: invalid readings {:?}, previous values kept", invalid);
        }
        invalid
    }

    /// Depth corrected to high water (m)
    ///
    /// `max(0, depth − tide_now + tide_high)` when both tide values are
    /// known, plain depth otherwise.
    pub fn tide_adjusted_depth(&self) -> Option<f32> {
        let depth = self.depth_m?;
        match (self.tide_now_m, self.tide_high_m) {
            (Some(now), Some(high)) => Some((depth - now + high).max(0.0)),
            _ => Some(depth),
        }
    }

    /// Slack of the last valid sample (m)
    pub fn slack_m(&self) -> Option<f32> {
        self.slack.map(|s| s.slack_m)
    }
}

fn is_length(value: &f32) -> bool {
    value.is_finite() && *value >= 0.0
}

fn is_level(value: &f32) -> bool {
    value.is_finite()
}

/// Returns true if the reading was invalid
fn fold(slot: &mut Option<f32>, reading: Reading, valid: fn(&f32) -> bool) -> bool {
    match reading {
        Reading::Missing => false,
        Reading::Value(v) if valid(&v) => {
            *slot = Some(v);
            false
        }
        Reading::Value(_) | Reading::Invalid => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reading_keeps_previous() {
        let slots = SensorSlots::new();
        let mut env = Environment::default();

        slots.depth.write(7.5);
        assert!(!env.refresh(&slots.take()).any());
        assert_eq!(env.depth_m, Some(7.5));

        slots.depth.write(f32::NAN);
        let invalid = env.refresh(&slots.take());
        assert!(invalid.depth);
        assert!(invalid.blocks_slack());
        assert_eq!(env.depth_m, Some(7.5));

        // Reported once; the kept value carries on
        assert!(!env.refresh(&slots.take()).any());
        assert_eq!(env.depth_m, Some(7.5));
    }

    #[test]
    fn test_missing_is_not_invalid() {
        let slots = SensorSlots::new();
        let mut env = Environment::default();
        assert!(!env.refresh(&slots.take()).any());
        assert_eq!(env.depth_m, None);
        assert_eq!(env.tide_adjusted_depth(), None);
    }

    #[test]
    fn test_negative_distance_invalid() {
        let slots = SensorSlots::new();
        let mut env = Environment::default();
        slots.distance.write(-1.0);
        assert!(env.refresh(&slots.take()).distance);
        assert_eq!(env.distance_m, None);
    }

    #[test]
    fn test_tide_adjustment() {
        let mut env = Environment {
            depth_m: Some(6.0),
            ..Environment::default()
        };
        assert_eq!(env.tide_adjusted_depth(), Some(6.0));

        env.tide_now_m = Some(1.0);
        env.tide_high_m = Some(3.5);
        assert_eq!(env.tide_adjusted_depth(), Some(8.5));

        env.tide_now_m = Some(10.0);
        assert_eq!(env.tide_adjusted_depth(), Some(0.0));
    }
}
