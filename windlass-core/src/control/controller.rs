//! Chain controller
//!
//! Drives the actuator toward a target chain length.
//!
//! Each fast tick, in order:
//!
//! 1. Target within tolerance: stop, recalibrate speed, `Reached`
//! 2. Paused: check resume conditions, nothing else
//! 3. Active time past the timeout: stop, replace speed estimate, `TimedOut`
//! 4. Raising outside the final-pull zone: pause when slack drops below the
//!    pause threshold
//! 5. Relay not yet engaged (settle delay after a stop): retry engage
//!
//! Paused raising resumes once slack reaches the resume threshold and the
//! cooldown since the last pause/resume transition has elapsed. Inside the
//! final-pull zone (`position ≤ depth + bow + threshold`) the slack gate is
//! lifted: the anchor is about to break out and the chain is nearly vertical.

use crate::config::{
    ChainConfig, MotionConfig, RetrievalConfig, SpeedCalibration, WindlassConfig,
};
use crate::persist;
use crate::position::PositionTracker;
use crate::traits::{ActuatorError, Direction, PersistentStore, RelayOutputs, WindlassActuator};

use super::intent::{MovementIntent, PauseReason};
use super::CommandError;

/// Controller state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// No movement
    #[default]
    Idle,
    /// Lowering (possibly held)
    Lowering,
    /// Raising (possibly paused for slack)
    Raising,
}

/// Environment the controller needs each tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInputs {
    /// Latest valid slack (m); `None` when unknown
    pub slack_m: Option<f32>,
    /// Latest valid depth (m); `None` when unknown
    pub depth_m: Option<f32>,
}

/// Events produced by [`ChainController::tick`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerEvent {
    /// Target reached
    Reached {
        direction: Direction,
        position_m: f32,
    },
    /// Movement exceeded its time budget
    TimedOut {
        direction: Direction,
        position_m: f32,
        covered_m: f32,
    },
    /// Relays released, intent kept
    Paused(PauseReason),
    /// Relays re-engaged after a pause
    Resumed(PauseReason),
    /// Actuator refused in a way that must never happen; all motion stopped
    Fault(ActuatorError),
}

/// Target-seeking chain controller
pub struct ChainController<S: PersistentStore, A: WindlassActuator> {
    motion: MotionConfig,
    retrieval: RetrievalConfig,
    bow_height_m: f32,
    actuator: A,
    tracker: PositionTracker,
    speeds: SpeedCalibration,
    store: S,
    intent: Option<MovementIntent>,
    last_tick_ms: Option<u32>,
}

impl<S: PersistentStore, A: WindlassActuator> ChainController<S, A> {
    /// Create a controller, restoring position and speeds from `store`
    ///
    /// Missing or corrupt records fall back to 0 m and the default speed.
    pub fn new(config: &WindlassConfig, actuator: A, mut store: S, now_ms: u32) -> Self {
        let initial = match persist::load_position(&mut store) {
            Ok(length) => {
                log_info!("Controller: restored chain length {} m", length);
                length
            }
            Err(e) => {
                log_warn!("Controller: no chain length restored ({:?}), using 0 m", e);
                config.chain.min_length_m
            }
        };

        let speeds = match persist::load_speeds(&mut store) {
            Ok(speeds) if speeds.is_plausible(&config.motion) => speeds,
            Ok(_) => {
                log_warn!("Controller: stored speeds implausible, using default");
                SpeedCalibration::uniform(config.motion.default_speed_m_s)
            }
            Err(e) => {
                log_warn!("Controller: no speed calibration ({:?}), using default", e);
                SpeedCalibration::uniform(config.motion.default_speed_m_s)
            }
        };

        Self {
            motion: config.motion,
            retrieval: config.retrieval,
            bow_height_m: config.catenary.bow_height_m,
            actuator,
            tracker: PositionTracker::new(config.chain, config.persistence, initial, now_ms),
            speeds,
            store,
            intent: None,
            last_tick_ms: None,
        }
    }

    /// Current chain length (m)
    pub fn position(&self) -> f32 {
        self.tracker.get()
    }

    /// Chain geometry
    pub fn chain(&self) -> &ChainConfig {
        self.tracker.chain()
    }

    /// Distance within which a target counts as reached (m)
    pub fn arrival_tolerance(&self) -> f32 {
        self.motion.arrival_tolerance_m
    }

    /// Current state
    pub fn state(&self) -> ControllerState {
        match self.intent.map(|i| i.direction) {
            Some(Direction::Lowering) => ControllerState::Lowering,
            Some(Direction::Raising) => ControllerState::Raising,
            _ => ControllerState::Idle,
        }
    }

    /// Check if a movement is in progress (including paused)
    pub fn is_active(&self) -> bool {
        self.intent.is_some()
    }

    /// Current movement, if any
    pub fn intent(&self) -> Option<&MovementIntent> {
        self.intent.as_ref()
    }

    /// Direction the relays are actually driving
    pub fn direction(&self) -> Direction {
        self.actuator.direction()
    }

    /// Relay outputs to apply to the pins
    pub fn outputs(&self) -> RelayOutputs {
        self.actuator.outputs()
    }

    /// Speed estimates
    pub fn speeds(&self) -> &SpeedCalibration {
        &self.speeds
    }

    /// Get the actuator
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Get the persistent store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lower by `amount_m`
    pub fn lower(&mut self, amount_m: f32, now_ms: u32) -> Result<(), CommandError> {
        self.start_relative(Direction::Lowering, amount_m, now_ms)
    }

    /// Raise by `amount_m`
    pub fn raise(&mut self, amount_m: f32, now_ms: u32) -> Result<(), CommandError> {
        self.start_relative(Direction::Raising, amount_m, now_ms)
    }

    /// Move to an absolute chain length
    pub fn move_to(&mut self, target_m: f32, now_ms: u32) -> Result<(), CommandError> {
        if self.intent.is_some() {
            return Err(CommandError::AlreadyActive);
        }
        if !target_m.is_finite() {
            return Err(CommandError::InvalidAmount);
        }
        let current = self.tracker.get();
        if (target_m - current).abs() <= self.motion.arrival_tolerance_m {
            return Err(CommandError::AtLimit);
        }
        if target_m > current {
            self.start_relative(Direction::Lowering, target_m - current, now_ms)
        } else {
            self.start_relative(Direction::Raising, current - target_m, now_ms)
        }
    }

    fn start_relative(
        &mut self,
        direction: Direction,
        amount_m: f32,
        now_ms: u32,
    ) -> Result<(), CommandError> {
        if self.intent.is_some() {
            log_warn!("Controller: {:?} rejected, movement already active", direction);
            return Err(CommandError::AlreadyActive);
        }
        if !amount_m.is_finite() || amount_m <= 0.0 {
            return Err(CommandError::InvalidAmount);
        }

        let chain = *self.tracker.chain();
        let current = self.tracker.get();
        let target = match direction {
            Direction::Lowering => (current + amount_m).min(chain.upper_limit()),
            Direction::Raising => (current - amount_m).max(chain.min_length_m),
            Direction::Stopped => return Err(CommandError::InvalidAmount),
        };

        let distance = (target - current).abs();
        if distance <= self.motion.arrival_tolerance_m {
            log_warn!("Controller: {:?} rejected, chain at limit ({} m)", direction, current);
            return Err(CommandError::AtLimit);
        }

        let timeout_ms = self.estimate_timeout(direction, distance);
        self.intent = Some(MovementIntent::new(
            direction, current, target, now_ms, timeout_ms,
        ));
        log_info!(
            "Controller: {:?} {} m -> {} m, timeout {} ms",
            direction,
            current,
            target,
            timeout_ms
        );

        match self.actuator.engage(direction) {
            Ok(()) => Ok(()),
            Err(ActuatorError::Settling) => {
                log_debug!("Controller: relay settling, engage deferred");
                Ok(())
            }
            Err(e @ ActuatorError::InterlockViolation) => {
                self.fault(e, now_ms);
                Err(CommandError::Fault)
            }
        }
    }

    /// Expected travel time times the safety factor, plus the fixed margin (ms)
    pub fn estimate_timeout(&self, direction: Direction, distance_m: f32) -> u32 {
        let speed = self
            .speeds
            .get(direction)
            .max(self.motion.min_speed_m_s);
        let travel_ms = distance_m / speed * self.motion.timeout_factor * 1000.0;
        (travel_ms as u32).saturating_add(self.motion.timeout_margin_ms)
    }

    /// Stop all motion
    ///
    /// Always succeeds and releases the relays before returning. Force-saves
    /// the position when a movement was active. Returns whether a movement
    /// was stopped; further calls have no effect.
    pub fn stop(&mut self, now_ms: u32) -> bool {
        self.release_relays(now_ms);

        match self.intent.take() {
            Some(intent) => {
                log_info!(
                    "Controller: stopped {:?} at {} m",
                    intent.direction,
                    self.tracker.get()
                );
                self.save_position(now_ms);
                true
            }
            None => false,
        }
    }

    /// Hold the current movement for the deployment sequencer
    ///
    /// Returns whether the hold was newly applied.
    pub fn hold(&mut self, now_ms: u32) -> bool {
        let Some(intent) = self.intent.as_mut() else {
            return false;
        };
        if !intent.pause(PauseReason::DeploymentHold, now_ms) {
            return false;
        }
        self.release_relays(now_ms);
        log_info!("Controller: held for deployment at {} m", self.tracker.get());
        true
    }

    /// Release a deployment hold
    ///
    /// Returns whether a hold was released. The relay re-engages on this
    /// call or, during the settle delay, on a following tick. An actuator
    /// fault stops all motion and is returned.
    pub fn release(&mut self, now_ms: u32) -> Result<bool, ActuatorError> {
        let Some(intent) = self.intent.as_mut() else {
            return Ok(false);
        };
        if !intent.resume(PauseReason::DeploymentHold, now_ms) {
            return Ok(false);
        }
        log_info!("Controller: deployment hold released");
        if !intent.is_paused() {
            self.try_engage(now_ms)?;
        }
        Ok(true)
    }

    /// Check if the movement is held for deployment
    pub fn is_held(&self) -> bool {
        self.intent.map_or(false, |i| i.held)
    }

    /// Recalibrate the chain length
    pub fn reset_position(&mut self, length_m: f32, now_ms: u32) -> Result<(), CommandError> {
        if self.intent.is_some() {
            return Err(CommandError::AlreadyActive);
        }
        if !length_m.is_finite() {
            return Err(CommandError::InvalidAmount);
        }
        self.tracker.set(length_m);
        self.save_position(now_ms);
        Ok(())
    }

    /// Account for one gypsy pulse
    pub fn on_pulse(&mut self, now_ms: u32) -> f32 {
        let direction = self
            .tracker
            .pulse_direction(self.actuator.direction(), now_ms);
        let length = self.tracker.on_pulse(direction);
        if let Err(e) = self.tracker.maybe_save(now_ms, &mut self.store) {
            log_warn!("Controller: periodic position save failed: {:?}", e);
        }
        length
    }

    /// Check if slack gating is lifted at the current position
    pub fn in_final_pull_zone(&self, inputs: &ControlInputs) -> bool {
        inputs.depth_m.map_or(false, |depth| {
            self.tracker.get() <= depth + self.bow_height_m + self.retrieval.final_pull_threshold_m
        })
    }

    /// Advance the controller
    pub fn tick(&mut self, now_ms: u32, inputs: &ControlInputs) -> Option<ControllerEvent> {
        let delta = self.last_tick_ms.map_or(0, |last| now_ms.wrapping_sub(last));
        self.last_tick_ms = Some(now_ms);
        self.actuator.update(delta);

        let intent = self.intent?;
        let position = self.tracker.get();
        let chain = self.tracker.chain();

        let at_bound = match intent.direction {
            Direction::Lowering => position >= chain.upper_limit() - self.motion.arrival_tolerance_m,
            Direction::Raising => position <= chain.min_length_m + self.motion.arrival_tolerance_m,
            Direction::Stopped => true,
        };
        if intent.has_arrived(position, self.motion.arrival_tolerance_m) || at_bound {
            return Some(self.finish_reached(now_ms));
        }

        if intent.is_paused() {
            return self.evaluate_resume(now_ms, inputs);
        }

        if intent.active_elapsed(now_ms) > intent.timeout_ms {
            return Some(self.finish_timed_out(now_ms));
        }

        if intent.direction == Direction::Raising && !self.in_final_pull_zone(inputs) {
            if let Some(slack) = inputs.slack_m {
                if slack < self.retrieval.pause_slack_m {
                    return self.pause_for_slack(now_ms, slack);
                }
            }
        }

        if self.actuator.direction() != intent.direction {
            if let Err(e) = self.try_engage(now_ms) {
                return Some(ControllerEvent::Fault(e));
            }
        }

        None
    }

    fn pause_for_slack(&mut self, now_ms: u32, slack_m: f32) -> Option<ControllerEvent> {
        let intent = self.intent.as_mut()?;
        if !intent.pause(PauseReason::Slack, now_ms) {
            return None;
        }
        self.release_relays(now_ms);
        log_info!(
            "Controller: raising paused, slack {} m below {} m",
            slack_m,
            self.retrieval.pause_slack_m
        );
        Some(ControllerEvent::Paused(PauseReason::Slack))
    }

    fn evaluate_resume(&mut self, now_ms: u32, inputs: &ControlInputs) -> Option<ControllerEvent> {
        let final_pull = self.in_final_pull_zone(inputs);
        let intent = self.intent.as_mut()?;

        if !intent.paused_for_slack {
            return None;
        }

        let cooled = intent.since_pause_resume(now_ms) >= self.retrieval.cooldown_ms;
        let slack_ok = inputs
            .slack_m
            .map_or(false, |slack| slack >= self.retrieval.resume_slack_m);
        if !(cooled && (slack_ok || final_pull)) {
            return None;
        }

        intent.resume(PauseReason::Slack, now_ms);
        let still_held = intent.is_paused();
        log_info!("Controller: raising resumed at {} m", self.tracker.get());

        if !still_held {
            if let Err(e) = self.try_engage(now_ms) {
                return Some(ControllerEvent::Fault(e));
            }
        }
        Some(ControllerEvent::Resumed(PauseReason::Slack))
    }

    /// Engage the intent's direction; a settling relay is retried next tick
    fn try_engage(&mut self, now_ms: u32) -> Result<(), ActuatorError> {
        let Some(intent) = self.intent else {
            return Ok(());
        };
        match self.actuator.engage(intent.direction) {
            Ok(()) | Err(ActuatorError::Settling) => Ok(()),
            Err(e) => {
                self.fault(e, now_ms);
                Err(e)
            }
        }
    }

    fn fault(&mut self, error: ActuatorError, now_ms: u32) {
        log_error!("Controller: actuator fault {:?}, stopping all motion", error);
        self.release_relays(now_ms);
        self.intent = None;
        self.save_position(now_ms);
    }

    fn finish_reached(&mut self, now_ms: u32) -> ControllerEvent {
        self.release_relays(now_ms);
        let position = self.tracker.get();
        let Some(intent) = self.intent.take() else {
            return ControllerEvent::Reached {
                direction: Direction::Stopped,
                position_m: position,
            };
        };

        let covered = intent.covered(position);
        let active_ms = intent.active_elapsed(now_ms);
        if covered >= self.motion.min_calibration_distance_m
            && active_ms >= self.motion.min_calibration_ms
        {
            let measured = covered / (active_ms as f32 / 1000.0);
            self.speeds.smooth(intent.direction, measured, &self.motion);
            self.save_speeds();
        }

        self.save_position(now_ms);
        log_info!(
            "Controller: {:?} reached {} m (target {} m)",
            intent.direction,
            position,
            intent.target_m
        );

        ControllerEvent::Reached {
            direction: intent.direction,
            position_m: position,
        }
    }

    fn finish_timed_out(&mut self, now_ms: u32) -> ControllerEvent {
        self.release_relays(now_ms);
        let position = self.tracker.get();
        let Some(intent) = self.intent.take() else {
            return ControllerEvent::TimedOut {
                direction: Direction::Stopped,
                position_m: position,
                covered_m: 0.0,
            };
        };

        let covered = intent.covered(position);
        let active_ms = intent.active_elapsed(now_ms).max(1);
        if covered >= self.motion.min_calibration_distance_m {
            let measured = covered / (active_ms as f32 / 1000.0);
            self.speeds.replace(intent.direction, measured, &self.motion);
            self.save_speeds();
        } else {
            log_warn!("Controller: no chain movement detected, speed estimate kept");
        }

        self.save_position(now_ms);
        log_warn!(
            "Controller: {:?} timed out after {} ms at {} m (covered {} m)",
            intent.direction,
            active_ms,
            position,
            covered
        );

        ControllerEvent::TimedOut {
            direction: intent.direction,
            position_m: position,
            covered_m: covered,
        }
    }

    fn release_relays(&mut self, now_ms: u32) {
        self.tracker.released(self.actuator.direction(), now_ms);
        self.actuator.stop();
    }

    fn save_position(&mut self, now_ms: u32) {
        if let Err(e) = self.tracker.force_save(now_ms, &mut self.store) {
            log_error!("Controller: position save failed: {:?}", e);
        }
    }

    fn save_speeds(&mut self) {
        match persist::save_speeds(&mut self.store, &self.speeds) {
            Ok(()) => log_debug!(
                "Controller: speeds saved (down {} m/s, up {} m/s)",
                self.speeds.lowering_m_s,
                self.speeds.raising_m_s
            ),
            Err(e) => log_error!("Controller: speed save failed: {:?}", e),
        }
    }
}
