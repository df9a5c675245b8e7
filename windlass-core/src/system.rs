//! Owned windlass context
//!
//! [`Windlass`] ties the controller, deployment and retrieval sequencers,
//! slack estimator and telemetry publisher together. The platform owns one instance and
//! drives it:
//!
//! - [`Windlass::handle_input`] / [`Windlass::handle_command`] for the
//!   command channel
//! - [`Windlass::on_pulse`] for every debounced gypsy pulse
//! - [`Windlass::poll`] (or the two tick functions directly) from the main
//!   loop
//! - [`Windlass::outputs`] after every call, applied to the relay pins
//! - [`Windlass::pop_telemetry`] to drain outbound values
//!
//! Every command answers with a status: `Accepted` or `Rejected`, and later
//! `Completed`, `TimedOut`, `Stopped` or `Fault` for the movement it
//! started.

use heapless::Deque;
use windlass_protocol::{Command, StatusCode, Telemetry};

use crate::config::{ConfigError, RetrievalStrategy, WindlassConfig};
use crate::control::{ChainController, CommandError, ControlInputs, ControllerEvent};
use crate::deployment::{AbortReason, DeploymentEvent, DeploymentManager};
use crate::retrieval::{RetrievalEvent, RetrievalManager};
use crate::sensors::{Environment, SensorSlots};
use crate::slack::{SlackEstimator, SlackInput};
use crate::telemetry::{TelemetryPublisher, TelemetrySnapshot};
use crate::traits::{PersistentStore, RelayOutputs, WindlassActuator};

/// Outbound values buffered between drains
pub const OUTBOX_LEN: usize = 32;

/// What the windlass is doing on behalf of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Nothing running
    #[default]
    Idle,
    /// `raiseN` / `lowerN`
    Manual,
    /// Single deploy to depth plus offset
    Drop,
    /// Staged deployment
    AutoDeploy,
    /// Slack-gated or staged retrieval
    AutoRetrieve,
}

/// Windlass controller context
pub struct Windlass<S: PersistentStore, A: WindlassActuator> {
    config: WindlassConfig,
    controller: ChainController<S, A>,
    deployment: DeploymentManager,
    retrieval: RetrievalManager,
    estimator: SlackEstimator,
    env: Environment,
    publisher: TelemetryPublisher,
    outbox: Deque<Telemetry, OUTBOX_LEN>,
    mode: Mode,
    /// Actuator fault seen; only STOP clears it
    faulted: bool,
    last_fast_ms: Option<u32>,
    last_slow_ms: Option<u32>,
}

impl<S: PersistentStore, A: WindlassActuator> Windlass<S, A> {
    /// Create the context, restoring persisted state from `store`
    pub fn new(
        config: WindlassConfig,
        actuator: A,
        store: S,
        now_ms: u32,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let controller = ChainController::new(&config, actuator, store, now_ms);
        log_info!("Windlass: ready, chain at {} m", controller.position());

        Ok(Self {
            controller,
            deployment: DeploymentManager::new(config.deployment),
            retrieval: RetrievalManager::new(config.retrieval),
            estimator: SlackEstimator::new(config.catenary),
            env: Environment::default(),
            publisher: TelemetryPublisher::new(&config.cadence),
            outbox: Deque::new(),
            mode: Mode::Idle,
            faulted: false,
            last_fast_ms: None,
            last_slow_ms: None,
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &WindlassConfig {
        &self.config
    }

    /// Get the chain controller
    pub fn controller(&self) -> &ChainController<S, A> {
        &self.controller
    }

    /// Get the deployment sequencer
    pub fn deployment(&self) -> &DeploymentManager {
        &self.deployment
    }

    /// Get the staged retrieval sequencer
    pub fn retrieval(&self) -> &RetrievalManager {
        &self.retrieval
    }

    /// Get the last valid sensor values
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Check if an actuator fault is latched
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Check if a movement or sequence is running
    pub fn is_busy(&self) -> bool {
        self.controller.is_active() || self.sequence_running()
    }

    /// Check if a sequencer owns the controller's movements
    fn sequence_running(&self) -> bool {
        self.deployment.is_active() || self.retrieval.is_active()
    }

    /// Current chain length (m)
    pub fn position(&self) -> f32 {
        self.controller.position()
    }

    /// Relay outputs to apply to the pins
    pub fn outputs(&self) -> RelayOutputs {
        self.controller.outputs()
    }

    /// Take the oldest buffered outbound value
    pub fn pop_telemetry(&mut self) -> Option<Telemetry> {
        self.outbox.pop_front()
    }

    /// Parse and run a command string
    pub fn handle_input(&mut self, input: &str, now_ms: u32) -> Result<(), CommandError> {
        match Command::parse(input) {
            Ok(command) => self.handle_command(command, now_ms),
            Err(e) => {
                log_warn!("Windlass: unrecognised command ({:?})", e);
                self.push_status(StatusCode::Rejected);
                Err(e.into())
            }
        }
    }

    /// Run a command
    ///
    /// STOP is always accepted. Anything else is rejected while a movement
    /// or sequence is running, or while a fault is latched.
    pub fn handle_command(&mut self, command: Command, now_ms: u32) -> Result<(), CommandError> {
        if command.is_stop() {
            self.stop(now_ms);
            return Ok(());
        }

        let result = if self.faulted {
            Err(CommandError::Fault)
        } else if self.is_busy() {
            Err(CommandError::AlreadyActive)
        } else {
            self.start(command, now_ms)
        };

        match result {
            Ok(mode) => {
                log_info!("Windlass: {} accepted", command.name());
                self.mode = mode;
                self.push_status(StatusCode::Accepted);
                Ok(())
            }
            Err(e) => {
                log_warn!("Windlass: {} rejected ({:?})", command.name(), e);
                if e == CommandError::Fault {
                    self.latch_fault();
                }
                self.push_status(StatusCode::Rejected);
                Err(e)
            }
        }
    }

    fn start(&mut self, command: Command, now_ms: u32) -> Result<Mode, CommandError> {
        match command {
            Command::AutoDrop => {
                self.deployment
                    .start(now_ms, &self.env, &self.estimator, &mut self.controller)?;
                Ok(Mode::AutoDeploy)
            }
            Command::AutoRetrieve => {
                let remainder = self.config.retrieval.remainder_m;
                match self.config.retrieval.strategy {
                    RetrievalStrategy::Continuous => {
                        if self.controller.position()
                            <= remainder + self.controller.arrival_tolerance()
                        {
                            return Err(CommandError::AtLimit);
                        }
                        self.controller.move_to(remainder, now_ms)?;
                    }
                    RetrievalStrategy::Staged => self.retrieval.start(&self.controller)?,
                }
                Ok(Mode::AutoRetrieve)
            }
            Command::Drop => {
                let depth = self
                    .env
                    .tide_adjusted_depth()
                    .ok_or(CommandError::InvalidDepth)?;
                let target = (depth + self.config.deployment.drop_offset_m)
                    .min(self.controller.chain().upper_limit());
                if target <= self.controller.position() + self.controller.arrival_tolerance() {
                    return Err(CommandError::AtLimit);
                }
                self.controller.move_to(target, now_ms)?;
                Ok(Mode::Drop)
            }
            Command::Raise(amount) => {
                self.controller.raise(amount, now_ms)?;
                Ok(Mode::Manual)
            }
            Command::Lower(amount) => {
                self.controller.lower(amount, now_ms)?;
                Ok(Mode::Manual)
            }
            Command::ResetCounter => {
                self.controller.reset_position(0.0, now_ms)?;
                Ok(Mode::Idle)
            }
            // Handled before dispatch
            Command::Stop => Ok(Mode::Idle),
        }
    }

    /// Stop everything
    ///
    /// Releases the relays before returning, aborts any sequence and clears
    /// a latched fault. Returns whether anything was running.
    pub fn stop(&mut self, now_ms: u32) -> bool {
        let deploying = self.deployment.stop(now_ms, &mut self.controller);
        let retrieving = self.retrieval.stop(now_ms, &mut self.controller);
        let moving = self.controller.stop(now_ms);
        if self.faulted {
            log_info!("Windlass: fault cleared by STOP");
            self.faulted = false;
        }
        self.mode = Mode::Idle;
        self.push_status(StatusCode::Stopped);
        deploying || retrieving || moving
    }

    /// Account for one gypsy pulse
    pub fn on_pulse(&mut self, now_ms: u32) -> f32 {
        self.controller.on_pulse(now_ms)
    }

    /// Run whichever ticks are due
    pub fn poll(&mut self, now_ms: u32, slots: &SensorSlots) {
        let cadence = self.config.cadence;
        if due(self.last_fast_ms, now_ms, cadence.fast_tick_ms) {
            self.fast_tick(now_ms);
        }
        if due(self.last_slow_ms, now_ms, cadence.slow_tick_ms) {
            self.slow_tick(now_ms, slots);
        }
    }

    /// Controller tick: arrival, timeout, slack pause/resume, relay engage
    pub fn fast_tick(&mut self, now_ms: u32) -> Option<ControllerEvent> {
        self.last_fast_ms = Some(now_ms);

        let inputs = ControlInputs {
            slack_m: self.env.slack_m(),
            depth_m: self.env.depth_m,
        };
        let event = self.controller.tick(now_ms, &inputs)?;

        match event {
            ControllerEvent::Reached { .. } => {
                // Sequence movements are reported by the sequence as a whole
                if !self.sequence_running() {
                    self.mode = Mode::Idle;
                    self.push_status(StatusCode::Completed);
                }
            }
            ControllerEvent::TimedOut { .. } => {
                if !self.sequence_running() {
                    self.mode = Mode::Idle;
                }
                self.push_status(StatusCode::TimedOut);
            }
            ControllerEvent::Paused(_) | ControllerEvent::Resumed(_) => {}
            ControllerEvent::Fault(_) => {
                self.deployment.abort(AbortReason::Fault, now_ms);
                self.retrieval.abort(AbortReason::Fault);
                self.latch_fault();
            }
        }

        Some(event)
    }

    /// Slow tick: sensors, slack, deployment sequence, telemetry
    pub fn slow_tick(&mut self, now_ms: u32, slots: &SensorSlots) {
        self.last_slow_ms = Some(now_ms);

        let invalid = self.env.refresh(&slots.take());
        if invalid.blocks_slack() {
            // Keep the previous sample for this cycle
            self.push_status(StatusCode::SensorInvalid);
        } else {
            self.update_slack(now_ms);
        }

        if let Some(event) = self.deployment.tick(now_ms, &self.env, &mut self.controller) {
            self.on_deployment_event(event);
        }
        if let Some(event) = self.retrieval.tick(now_ms, &self.env, &mut self.controller) {
            self.on_retrieval_event(event);
        }

        let snapshot = TelemetrySnapshot {
            rode_m: self.controller.position(),
            slack_m: self.env.slack_m(),
            direction: self.controller.direction(),
            stage: self.deployment.stage(),
        };
        for value in self.publisher.publish(now_ms, &snapshot) {
            self.push(value);
        }
    }

    fn update_slack(&mut self, now_ms: u32) {
        let (Some(depth_m), Some(distance_m)) = (self.env.depth_m, self.env.distance_m) else {
            return;
        };

        let input = SlackInput {
            chain_length_m: self.controller.position(),
            depth_m,
            distance_m,
            wind_m_s: self.env.wind_m_s,
            timestamp_ms: now_ms,
        };
        match self.estimator.estimate(&input) {
            Ok(sample) => {
                if sample.degenerate {
                    log_debug!("Windlass: chain hangs vertically, slack {} m", sample.slack_m);
                }
                self.env.slack = Some(sample);
            }
            Err(e) => {
                log_warn!("Windlass: slack not computed ({:?}), previous kept", e);
                self.push_status(StatusCode::SensorInvalid);
            }
        }
    }

    fn on_deployment_event(&mut self, event: DeploymentEvent) {
        match event {
            DeploymentEvent::StageChanged { .. } => {}
            DeploymentEvent::Completed => {
                self.mode = Mode::Idle;
                self.push_status(StatusCode::Completed);
            }
            DeploymentEvent::Aborted(reason) => self.on_abort(reason),
        }
    }

    fn on_retrieval_event(&mut self, event: RetrievalEvent) {
        match event {
            RetrievalEvent::Completed => {
                self.mode = Mode::Idle;
                self.push_status(StatusCode::Completed);
            }
            RetrievalEvent::Aborted(reason) => self.on_abort(reason),
        }
    }

    fn on_abort(&mut self, reason: AbortReason) {
        self.mode = Mode::Idle;
        match reason {
            AbortReason::Stopped => self.push_status(StatusCode::Stopped),
            AbortReason::MovementFailed => self.push_status(StatusCode::TimedOut),
            AbortReason::Fault => self.latch_fault(),
        }
    }

    fn latch_fault(&mut self) {
        if !self.faulted {
            log_error!("Windlass: fault latched, STOP required");
        }
        self.faulted = true;
        self.mode = Mode::Idle;
        self.push_status(StatusCode::Fault);
    }

    fn push_status(&mut self, status: StatusCode) {
        self.push(Telemetry::Status(status));
    }

    fn push(&mut self, value: Telemetry) {
        if self.outbox.is_full() {
            // Oldest value is the least useful
            self.outbox.pop_front();
        }
        let _ = self.outbox.push_back(value);
    }
}

fn due(last_ms: Option<u32>, now_ms: u32, period_ms: u32) -> bool {
    last_ms.map_or(true, |last| now_ms.wrapping_sub(last) >= period_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RelayActuator;
    use crate::deployment::DeploymentStage;
    use crate::persist;
    use crate::storage::MemoryStore;
    use crate::traits::{ActuatorError, Direction};
    use heapless::Vec;

    type System = Windlass<MemoryStore, RelayActuator>;

    fn windlass_at(position: f32) -> System {
        let config = WindlassConfig::default();
        let mut store = MemoryStore::new();
        persist::save_position(&mut store, position).unwrap();
        Windlass::new(config, RelayActuator::new(config.relay), store, 0).unwrap()
    }

    fn statuses<S: PersistentStore, A: WindlassActuator>(
        windlass: &mut Windlass<S, A>,
    ) -> Vec<StatusCode, OUTBOX_LEN> {
        let mut out = Vec::new();
        while let Some(value) = windlass.pop_telemetry() {
            if let Telemetry::Status(status) = value {
                out.push(status).unwrap();
            }
        }
        out
    }

    fn pulses<S: PersistentStore, A: WindlassActuator>(
        windlass: &mut Windlass<S, A>,
        count: usize,
        now: u32,
    ) {
        for _ in 0..count {
            windlass.on_pulse(now);
        }
    }

    /// Refuses every engage as if the opposite relay were stuck on
    struct StuckActuator;

    impl WindlassActuator for StuckActuator {
        fn engage(&mut self, direction: Direction) -> Result<(), ActuatorError> {
            match direction {
                Direction::Stopped => Ok(()),
                _ => Err(ActuatorError::InterlockViolation),
            }
        }

        fn stop(&mut self) {}

        fn direction(&self) -> Direction {
            Direction::Stopped
        }

        fn update(&mut self, _delta_ms: u32) {}

        fn can_engage(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = WindlassConfig::default();
        config.chain.max_length_m = -1.0;
        let result = Windlass::new(config, RelayActuator::new(config.relay), MemoryStore::new(), 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_commands_rejected_while_active() {
        let mut windlass = windlass_at(20.0);
        windlass.handle_input("lower5", 0).unwrap();
        assert_eq!(windlass.mode(), Mode::Manual);
        assert!(windlass.outputs().down());

        assert_eq!(
            windlass.handle_input("raise3", 10),
            Err(CommandError::AlreadyActive)
        );
        assert_eq!(
            windlass.handle_command(Command::AutoRetrieve, 20),
            Err(CommandError::AlreadyActive)
        );
        // Rejection changes nothing
        assert!(windlass.outputs().down());
        assert_eq!(windlass.controller().intent().unwrap().target_m, 25.0);

        assert_eq!(
            statuses(&mut windlass).as_slice(),
            &[StatusCode::Accepted, StatusCode::Rejected, StatusCode::Rejected]
        );
    }

    #[test]
    fn test_unparseable_input_rejected() {
        let mut windlass = windlass_at(20.0);
        assert!(matches!(
            windlass.handle_input("hoist", 0),
            Err(CommandError::Parse(_))
        ));
        assert_eq!(statuses(&mut windlass).as_slice(), &[StatusCode::Rejected]);
        assert!(!windlass.is_busy());
    }

    #[test]
    fn test_stop_always_accepted() {
        let mut windlass = windlass_at(20.0);
        windlass.handle_input("raise5", 0).unwrap();
        assert!(windlass.outputs().up());

        windlass.handle_input("STOP", 100).unwrap();
        assert!(!windlass.outputs().any());
        assert!(!windlass.is_busy());

        windlass.handle_input("stop", 200).unwrap();
        assert_eq!(
            statuses(&mut windlass).as_slice(),
            &[StatusCode::Accepted, StatusCode::Stopped, StatusCode::Stopped]
        );
    }

    #[test]
    fn test_manual_completion_reported() {
        let mut windlass = windlass_at(10.0);
        windlass.handle_input("lower1", 0).unwrap();
        windlass.fast_tick(0);
        pulses(&mut windlass, 4, 500);
        assert!(matches!(
            windlass.fast_tick(1000),
            Some(ControllerEvent::Reached { .. })
        ));
        assert_eq!(windlass.mode(), Mode::Idle);
        assert_eq!(
            statuses(&mut windlass).as_slice(),
            &[StatusCode::Accepted, StatusCode::Completed]
        );
    }

    #[test]
    fn test_timeout_reported() {
        let mut windlass = windlass_at(10.0);
        windlass.handle_input("lower10", 0).unwrap();
        let timeout = windlass.controller().intent().unwrap().timeout_ms;

        windlass.fast_tick(0);
        assert_eq!(windlass.fast_tick(timeout), None);
        assert!(matches!(
            windlass.fast_tick(timeout + 100),
            Some(ControllerEvent::TimedOut { .. })
        ));
        assert!(!windlass.outputs().any());
        assert_eq!(
            statuses(&mut windlass).as_slice(),
            &[StatusCode::Accepted, StatusCode::TimedOut]
        );
    }

    #[test]
    fn test_auto_retrieve_targets_remainder() {
        let mut windlass = windlass_at(30.0);
        windlass.handle_command(Command::AutoRetrieve, 0).unwrap();
        let intent = windlass.controller().intent().unwrap();
        assert_eq!(intent.direction, Direction::Raising);
        assert_eq!(intent.target_m, 2.0);
        assert_eq!(windlass.mode(), Mode::AutoRetrieve);

        let mut short = windlass_at(1.5);
        assert_eq!(
            short.handle_command(Command::AutoRetrieve, 0),
            Err(CommandError::AtLimit)
        );
    }

    #[test]
    fn test_auto_retrieve_pauses_on_slack() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);
        slots.distance.write(45.0);

        let mut windlass = windlass_at(40.0);
        windlass.slow_tick(0, &slots);
        // Boat well past the chain's reach: no slack to haul
        assert!(windlass.environment().slack_m().unwrap() < 0.2);

        windlass.handle_command(Command::AutoRetrieve, 0).unwrap();
        assert!(windlass.outputs().up());
        assert!(matches!(
            windlass.fast_tick(100),
            Some(ControllerEvent::Paused(_))
        ));
        assert!(!windlass.outputs().any());
        assert!(windlass.is_busy());
    }

    fn staged_at(position: f32) -> System {
        let mut config = WindlassConfig::default();
        config.retrieval.strategy = RetrievalStrategy::Staged;
        let mut store = MemoryStore::new();
        persist::save_position(&mut store, position).unwrap();
        Windlass::new(config, RelayActuator::new(config.relay), store, 0).unwrap()
    }

    #[test]
    fn test_staged_retrieve_raises_by_slack() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);
        slots.distance.write(20.0);

        let mut windlass = staged_at(40.0);
        windlass.handle_command(Command::AutoRetrieve, 0).unwrap();
        assert_eq!(windlass.mode(), Mode::AutoRetrieve);
        assert!(windlass.is_busy());
        assert!(!windlass.controller().is_active());

        windlass.slow_tick(0, &slots);
        let slack = windlass.environment().slack_m().unwrap();
        assert!(slack >= 1.0);
        let intent = *windlass.controller().intent().unwrap();
        assert_eq!(intent.direction, Direction::Raising);
        assert!((intent.target_m - (40.0 - slack).max(2.0)).abs() < 1e-3);

        assert_eq!(
            windlass.handle_input("lower1", 100),
            Err(CommandError::AlreadyActive)
        );
        windlass.handle_input("STOP", 200).unwrap();
        assert!(!windlass.retrieval().is_active());
        assert!(!windlass.outputs().any());
    }

    #[test]
    fn test_staged_retrieve_completion_reported_once() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);

        let mut windlass = staged_at(16.0);
        windlass.handle_command(Command::AutoRetrieve, 0).unwrap();
        windlass.slow_tick(0, &slots);
        assert!(windlass.retrieval().is_final_pull());
        assert_eq!(windlass.controller().intent().unwrap().target_m, 2.0);

        // The final pull arriving is not the end of the sequence
        pulses(&mut windlass, 56, 500);
        assert!(matches!(
            windlass.fast_tick(600),
            Some(ControllerEvent::Reached { .. })
        ));
        assert_eq!(windlass.mode(), Mode::AutoRetrieve);

        for tick in 2..5 {
            windlass.slow_tick(tick * 500, &slots);
        }
        assert_eq!(windlass.mode(), Mode::Idle);
        assert!(!windlass.is_busy());
        assert_eq!(
            statuses(&mut windlass).as_slice(),
            &[StatusCode::Accepted, StatusCode::Completed]
        );
    }

    #[test]
    fn test_drop_uses_tide_adjusted_depth() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);
        slots.tide_now.write(1.0);
        slots.tide_high.write(2.0);

        let mut windlass = windlass_at(0.0);
        assert_eq!(
            windlass.handle_command(Command::Drop, 0),
            Err(CommandError::InvalidDepth)
        );

        windlass.slow_tick(0, &slots);
        windlass.handle_command(Command::Drop, 10).unwrap();
        assert_eq!(windlass.controller().intent().unwrap().target_m, 10.0);
    }

    #[test]
    fn test_reset_counter() {
        let mut windlass = windlass_at(12.0);
        windlass.handle_command(Command::ResetCounter, 0).unwrap();
        assert_eq!(windlass.position(), 0.0);
        assert!(!windlass.is_busy());
    }

    #[test]
    fn test_sensor_invalid_keeps_slack() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);
        slots.distance.write(10.0);

        let mut windlass = windlass_at(20.0);
        windlass.slow_tick(0, &slots);
        let before = windlass.environment().slack.unwrap();
        statuses(&mut windlass);

        slots.depth.write(f32::NAN);
        windlass.slow_tick(500, &slots);
        assert_eq!(windlass.environment().slack, Some(before));
        assert_eq!(statuses(&mut windlass).as_slice(), &[StatusCode::SensorInvalid]);
    }

    #[test]
    fn test_invalid_reading_skips_one_cycle() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);
        slots.distance.write(10.0);
        slots.wind_speed.write(4.0);

        let mut windlass = windlass_at(20.0);
        windlass.slow_tick(0, &slots);
        let first = windlass.environment().slack.unwrap();
        statuses(&mut windlass);

        slots.wind_speed.write(f32::NAN);
        windlass.slow_tick(500, &slots);
        assert_eq!(windlass.environment().slack, Some(first));

        // Later cycles go on with the last valid wind speed
        slots.distance.write(14.0);
        for tick in 2..20 {
            windlass.slow_tick(tick * 500, &slots);
        }
        let latest = windlass.environment().slack.unwrap();
        assert_eq!(latest.timestamp_ms, 9500);
        assert_eq!(latest.distance_m, 14.0);
        assert_eq!(latest.wind_m_s, 4.0);
        assert!(latest.slack_m < first.slack_m);
        assert_eq!(statuses(&mut windlass).as_slice(), &[StatusCode::SensorInvalid]);
    }

    #[test]
    fn test_no_slack_without_distance() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);

        let mut windlass = windlass_at(20.0);
        windlass.slow_tick(0, &slots);
        assert_eq!(windlass.environment().slack, None);

        let mut published_slack = false;
        while let Some(value) = windlass.pop_telemetry() {
            published_slack |= matches!(value, Telemetry::ChainSlack(_));
        }
        assert!(!published_slack);
    }

    #[test]
    fn test_telemetry_published_on_slow_tick() {
        let slots = SensorSlots::new();
        let mut windlass = windlass_at(20.0);
        windlass.slow_tick(0, &slots);

        let mut values: Vec<Telemetry, OUTBOX_LEN> = Vec::new();
        while let Some(value) = windlass.pop_telemetry() {
            values.push(value).unwrap();
        }
        assert!(values.contains(&Telemetry::RodeDeployed(20.0)));
        assert!(values.contains(&Telemetry::Stage("Idle")));
    }

    #[test]
    fn test_outbox_drops_oldest() {
        let mut windlass = windlass_at(20.0);
        for now in 0..(OUTBOX_LEN as u32 + 5) {
            let _ = windlass.handle_input("bogus", now);
        }
        windlass.stop(100);

        let mut last = None;
        let mut count = 0;
        while let Some(value) = windlass.pop_telemetry() {
            last = Some(value);
            count += 1;
        }
        assert_eq!(count, OUTBOX_LEN);
        assert_eq!(last, Some(Telemetry::Status(StatusCode::Stopped)));
    }

    #[test]
    fn test_fault_latched_until_stop() {
        let config = WindlassConfig::default();
        let mut windlass = Windlass::new(config, StuckActuator, MemoryStore::new(), 0).unwrap();

        assert_eq!(windlass.handle_input("lower5", 0), Err(CommandError::Fault));
        assert!(windlass.is_faulted());
        assert!(!windlass.is_busy());

        assert_eq!(windlass.handle_input("lower5", 10), Err(CommandError::Fault));

        windlass.handle_input("STOP", 20).unwrap();
        assert!(!windlass.is_faulted());
        assert_eq!(
            statuses(&mut windlass).as_slice(),
            &[
                StatusCode::Fault,
                StatusCode::Rejected,
                StatusCode::Fault,
                StatusCode::Rejected,
                StatusCode::Stopped,
            ]
        );
    }

    #[test]
    fn test_auto_drop_first_scope() {
        let slots = SensorSlots::new();
        slots.depth.write(5.0);

        let mut windlass = windlass_at(0.0);
        windlass.slow_tick(0, &slots);
        windlass.handle_command(Command::AutoDrop, 0).unwrap();
        assert_eq!(windlass.mode(), Mode::AutoDeploy);
        assert_eq!(windlass.deployment().stage(), DeploymentStage::Drop);

        // Drop: 5 m + 4 m
        windlass.slow_tick(500, &slots);
        assert_eq!(windlass.controller().intent().unwrap().target_m, 9.0);
        assert_eq!(
            windlass.handle_input("raise1", 600),
            Err(CommandError::AlreadyActive)
        );
        pulses(&mut windlass, 36, 1000);
        windlass.fast_tick(1100);
        windlass.slow_tick(1500, &slots);
        assert_eq!(windlass.deployment().stage(), DeploymentStage::WaitTight);

        // Boat drifts back until the chain is tight
        let tight = windlass.deployment().plan().unwrap().wait_tight_m;
        slots.distance.write(tight + 0.5);
        windlass.slow_tick(2000, &slots);
        assert_eq!(windlass.deployment().stage(), DeploymentStage::HoldDrop);
        windlass.slow_tick(4000, &slots);
        assert_eq!(windlass.deployment().stage(), DeploymentStage::DeployFirst);

        // First scope 3:1
        windlass.slow_tick(4500, &slots);
        assert_eq!(windlass.controller().intent().unwrap().target_m, 15.0);
        pulses(&mut windlass, 24, 5000);
        windlass.fast_tick(5100);
        windlass.slow_tick(5500, &slots);
        assert_eq!(windlass.deployment().stage(), DeploymentStage::WaitFirst);
        assert_eq!(windlass.mode(), Mode::AutoDeploy);

        windlass.handle_input("STOP", 6000).unwrap();
        assert_eq!(windlass.deployment().stage(), DeploymentStage::Idle);
        assert_eq!(windlass.mode(), Mode::Idle);
    }
}
