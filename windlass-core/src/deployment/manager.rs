//! Deployment sequencer
//!
//! Issues successive lowering movements to the chain controller and paces
//! them against the boat's drift:
//!
//! - Drop pays out `depth + drop_offset` in one go
//! - Wait stages advance once the measured distance to the anchor reaches the
//!   chain's catenary reach (the chain is tight) or on a stage timeout
//! - Hold stages are fixed settle delays
//! - Deploy stages lower toward `depth × scope` and hold the controller while
//!   `slack / depth` exceeds the configured ratio, so chain is not piled on
//!   top of the anchor faster than the boat drifts back
//!
//! With [`DeployStrategy::Incremental`] a Deploy stage instead pays out short
//! steps whenever slack falls behind `target_slack_ratio` of the chain out,
//! with a bigger step while slack is falling fast. No step is issued while
//! `slack / depth` is over the ratio.
//!
//! Targets come from the tide-adjusted depth so the final scope still holds
//! at high water.

use crate::config::{ChainConfig, DeployStrategy, DeploymentConfig};
use crate::control::{ChainController, CommandError};
use crate::sensors::Environment;
use crate::slack::SlackEstimator;
use crate::traits::{PersistentStore, WindlassActuator};

use super::stage::{DeploymentStage, StageEvent, StageKind, TransitionError};

/// Targets for one deployment, fixed at start
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeploymentPlan {
    /// Tide-adjusted depth the targets are based on (m)
    pub depth_m: f32,
    /// Drop target (m of chain)
    pub drop_m: f32,
    /// First scope target (m of chain)
    pub first_m: f32,
    /// Second scope target (m of chain)
    pub second_m: f32,
    /// Full scope target (m of chain)
    pub full_m: f32,
    /// Distance that ends WaitTight (m)
    pub wait_tight_m: f32,
    /// Distance that ends WaitFirst (m)
    pub wait_first_m: f32,
    /// Distance that ends WaitSecond (m)
    pub wait_second_m: f32,
}

impl DeploymentPlan {
    /// Compute targets
    ///
    /// `depth_m` is the tide-adjusted depth for chain targets; `live_depth_m`
    /// and `wind_m_s` feed the reach estimates for the wait stages.
    pub fn new(
        depth_m: f32,
        live_depth_m: f32,
        wind_m_s: Option<f32>,
        chain: &ChainConfig,
        config: &DeploymentConfig,
        estimator: &SlackEstimator,
    ) -> Result<Self, CommandError> {
        let limit = chain.upper_limit();
        let drop_m = (depth_m + config.drop_offset_m).min(limit);
        let first_m = (depth_m * config.first_scope).max(drop_m).min(limit);
        let second_m = (depth_m * config.second_scope).max(first_m).min(limit);
        let full_m = (depth_m * config.full_scope)
            .max(config.min_full_chain_m)
            .max(second_m)
            .min(limit);

        let reach = |chain_m: f32| {
            estimator
                .reach(chain_m, live_depth_m, wind_m_s)
                .map_err(|_| CommandError::InvalidDepth)
        };

        Ok(Self {
            depth_m,
            drop_m,
            first_m,
            second_m,
            full_m,
            wait_tight_m: reach(drop_m)?,
            wait_first_m: reach(first_m)?,
            wait_second_m: reach(second_m)?,
        })
    }

    /// Chain target of a Drop or Deploy stage
    pub fn movement_target(&self, stage: DeploymentStage) -> Option<f32> {
        match stage {
            DeploymentStage::Drop => Some(self.drop_m),
            DeploymentStage::DeployFirst => Some(self.first_m),
            DeploymentStage::DeploySecond => Some(self.second_m),
            DeploymentStage::DeployFull => Some(self.full_m),
            _ => None,
        }
    }

    /// Distance target of a Wait stage
    pub fn wait_target(&self, stage: DeploymentStage) -> Option<f32> {
        match stage {
            DeploymentStage::WaitTight => Some(self.wait_tight_m),
            DeploymentStage::WaitFirst => Some(self.wait_first_m),
            DeploymentStage::WaitSecond => Some(self.wait_second_m),
            _ => None,
        }
    }
}

/// Why a sequence ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AbortReason {
    /// STOP command
    Stopped,
    /// A movement kept falling short of its target
    MovementFailed,
    /// Actuator fault
    Fault,
}

/// Events produced by [`DeploymentManager::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeploymentEvent {
    /// Moved to the next stage
    StageChanged {
        from: DeploymentStage,
        to: DeploymentStage,
    },
    /// Full scope deployed
    Completed,
    /// Sequence abandoned
    Aborted(AbortReason),
}

/// Staged deployment sequencer
#[derive(Debug, Clone)]
pub struct DeploymentManager {
    config: DeploymentConfig,
    stage: DeploymentStage,
    plan: Option<DeploymentPlan>,
    stage_started_ms: u32,
    /// Goal of the last movement issued in this stage
    issued_m: Option<f32>,
    /// Re-issues of the current stage's movement
    retries: u8,
    /// Last slack seen and its sample time
    last_slack: Option<(f32, u32)>,
    /// Slack change per second, negative while falling
    slack_rate_m_s: f32,
}

impl DeploymentManager {
    /// Create an idle manager
    pub fn new(config: DeploymentConfig) -> Self {
        Self {
            config,
            stage: DeploymentStage::Idle,
            plan: None,
            stage_started_ms: 0,
            issued_m: None,
            retries: 0,
            last_slack: None,
            slack_rate_m_s: 0.0,
        }
    }

    /// Current stage
    pub fn stage(&self) -> DeploymentStage {
        self.stage
    }

    /// Targets of the running (or last) sequence
    pub fn plan(&self) -> Option<&DeploymentPlan> {
        self.plan.as_ref()
    }

    /// Check if a sequence is running
    pub fn is_active(&self) -> bool {
        self.stage.is_active()
    }

    /// Re-issues used by the current stage
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Begin a sequence
    pub fn start<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        now_ms: u32,
        env: &Environment,
        estimator: &SlackEstimator,
        ctrl: &mut ChainController<S, A>,
    ) -> Result<DeploymentPlan, CommandError> {
        if self.is_active() || ctrl.is_active() {
            return Err(CommandError::AlreadyActive);
        }

        let live_depth = env.depth_m.ok_or(CommandError::InvalidDepth)?;
        if live_depth < self.config.min_depth_m || live_depth > self.config.max_depth_m {
            log_warn!(
                "Deployment: depth {} m outside {} - {} m",
                live_depth,
                self.config.min_depth_m,
                self.config.max_depth_m
            );
            return Err(CommandError::InvalidDepth);
        }
        let depth = env.tide_adjusted_depth().unwrap_or(live_depth);

        let plan = DeploymentPlan::new(
            depth,
            live_depth,
            env.wind_m_s,
            ctrl.chain(),
            &self.config,
            estimator,
        )?;

        let next = self
            .stage
            .transition(StageEvent::Start)
            .map_err(|e| {
                self.rejected(e);
                CommandError::AlreadyActive
            })?;

        log_info!(
            "Deployment: start at depth {} m, drop {} m, scopes {} / {} / {} m",
            plan.depth_m,
            plan.drop_m,
            plan.first_m,
            plan.second_m,
            plan.full_m
        );
        self.plan = Some(plan);
        self.enter(next, now_ms);
        Ok(plan)
    }

    /// Abort to Idle and stop the controller
    ///
    /// Returns whether a sequence was running.
    pub fn stop<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        now_ms: u32,
        ctrl: &mut ChainController<S, A>,
    ) -> bool {
        let was_active = self.is_active();
        ctrl.stop(now_ms);
        if was_active {
            self.abort(AbortReason::Stopped, now_ms);
        }
        was_active
    }

    /// Abandon the sequence without touching the controller
    ///
    /// Used when the controller already stopped itself (fault).
    pub fn abort(&mut self, reason: AbortReason, now_ms: u32) -> Option<DeploymentEvent> {
        if !self.is_active() {
            return None;
        }
        log_warn!("Deployment: aborted in {:?} ({:?})", self.stage, reason);
        self.enter(DeploymentStage::Idle, now_ms);
        Some(DeploymentEvent::Aborted(reason))
    }

    /// Move to the next stage
    pub fn advance(&mut self, now_ms: u32) -> Result<DeploymentStage, TransitionError> {
        let next = self
            .stage
            .transition(StageEvent::Advance)
            .map_err(|e| self.rejected(e))?;
        self.enter(next, now_ms);
        Ok(next)
    }

    fn rejected(&self, error: TransitionError) -> TransitionError {
        log_warn!(
            "Deployment: {:?} rejected in {:?}",
            error.event,
            error.from
        );
        error
    }

    fn enter(&mut self, stage: DeploymentStage, now_ms: u32) {
        log_info!("Deployment: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
        self.stage_started_ms = now_ms;
        self.issued_m = None;
        self.retries = 0;
        self.last_slack = None;
        self.slack_rate_m_s = 0.0;
    }

    fn advance_event(&mut self, now_ms: u32) -> Option<DeploymentEvent> {
        let from = self.stage;
        let to = self.advance(now_ms).ok()?;
        if to == DeploymentStage::Complete {
            log_info!("Deployment: complete");
            Some(DeploymentEvent::Completed)
        } else {
            Some(DeploymentEvent::StageChanged { from, to })
        }
    }

    /// Advance the sequence (slow tick)
    pub fn tick<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        now_ms: u32,
        env: &Environment,
        ctrl: &mut ChainController<S, A>,
    ) -> Option<DeploymentEvent> {
        let plan = self.plan?;
        let elapsed = now_ms.wrapping_sub(self.stage_started_ms);

        match self.stage.kind() {
            StageKind::Inactive => None,
            StageKind::Wait => {
                let target = plan.wait_target(self.stage)?;
                let timeout = self.wait_timeout_ms();
                match env.distance_m {
                    Some(distance) if distance >= target => {
                        log_info!("Deployment: distance {} m reached {} m", distance, target);
                        self.advance_event(now_ms)
                    }
                    _ if elapsed >= timeout => {
                        log_warn!("Deployment: {:?} timed out after {} ms", self.stage, elapsed);
                        self.advance_event(now_ms)
                    }
                    _ => None,
                }
            }
            StageKind::Hold => {
                if elapsed >= self.hold_ms() {
                    self.advance_event(now_ms)
                } else {
                    None
                }
            }
            StageKind::Drop | StageKind::Deploy => {
                let target = plan.movement_target(self.stage)?;
                self.tick_movement(now_ms, target, env, ctrl)
            }
        }
    }

    fn tick_movement<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        now_ms: u32,
        target_m: f32,
        env: &Environment,
        ctrl: &mut ChainController<S, A>,
    ) -> Option<DeploymentEvent> {
        let stepping = self.stage.kind() == StageKind::Deploy
            && self.config.strategy == DeployStrategy::Incremental;
        if stepping {
            self.track_slack_rate(env);
        }

        if ctrl.is_active() {
            if self.stage.kind() == StageKind::Deploy {
                return self.pace(now_ms, env, ctrl);
            }
            return None;
        }

        let tolerance = ctrl.arrival_tolerance();
        if ctrl.position() >= target_m - tolerance {
            return self.advance_event(now_ms);
        }

        if let Some(issued) = self.issued_m.take() {
            if ctrl.position() < issued - tolerance {
                if self.retries >= self.config.max_retries {
                    log_error!(
                        "Deployment: {:?} movement failed at {} m, target {} m",
                        self.stage,
                        ctrl.position(),
                        issued
                    );
                    return self.abort(AbortReason::MovementFailed, now_ms);
                }
                self.retries += 1;
                log_warn!(
                    "Deployment: {:?} movement short, retry {} of {}",
                    self.stage,
                    self.retries,
                    self.config.max_retries
                );
            }
        }

        let goal = if stepping {
            self.next_step(env, ctrl.position(), target_m)?
        } else {
            target_m
        };

        match ctrl.move_to(goal, now_ms) {
            Ok(()) => {
                self.issued_m = Some(goal);
                None
            }
            // Chain limit below the stage target: nothing more to pay out
            Err(CommandError::AtLimit) => self.advance_event(now_ms),
            Err(e) => {
                log_error!("Deployment: movement refused: {:?}", e);
                let reason = if e == CommandError::Fault {
                    AbortReason::Fault
                } else {
                    AbortReason::MovementFailed
                };
                ctrl.stop(now_ms);
                self.abort(reason, now_ms)
            }
        }
    }

    /// Goal of the next incremental step, if slack calls for one
    ///
    /// Without a slack estimate every step is the normal size.
    fn next_step(&self, env: &Environment, position_m: f32, target_m: f32) -> Option<f32> {
        let config = &self.config;
        let step = match env.slack_m() {
            None => config.step_m,
            Some(slack) => {
                if env.depth_m.map_or(false, |depth| slack > depth * config.max_slack_ratio) {
                    log_debug!("Deployment: slack {} m over the ratio, no step", slack);
                    return None;
                }
                let deficit = position_m * config.target_slack_ratio - slack;
                if deficit <= config.min_slack_deficit_m {
                    return None;
                }
                if self.slack_rate_m_s < -config.fast_slack_fall_m_s {
                    config.fast_step_m
                } else {
                    config.step_m
                }
            }
        };

        let goal = (position_m + step).min(target_m);
        log_debug!(
            "Deployment: step to {} m (slack rate {} m/s)",
            goal,
            self.slack_rate_m_s
        );
        Some(goal)
    }

    fn track_slack_rate(&mut self, env: &Environment) {
        let Some(sample) = env.slack else {
            return;
        };
        match self.last_slack {
            Some((last_m, last_ms)) => {
                let dt_ms = sample.timestamp_ms.wrapping_sub(last_ms);
                if dt_ms > 100 {
                    self.slack_rate_m_s = (sample.slack_m - last_m) / (dt_ms as f32 / 1000.0);
                    self.last_slack = Some((sample.slack_m, sample.timestamp_ms));
                }
            }
            None => self.last_slack = Some((sample.slack_m, sample.timestamp_ms)),
        }
    }

    /// Hold or release the controller on the slack / depth ratio
    fn pace<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        now_ms: u32,
        env: &Environment,
        ctrl: &mut ChainController<S, A>,
    ) -> Option<DeploymentEvent> {
        let (Some(slack), Some(depth)) = (env.slack_m(), env.depth_m) else {
            return None;
        };
        if depth <= 0.0 {
            return None;
        }

        let ratio = slack / depth;
        if ratio > self.config.max_slack_ratio {
            if ctrl.hold(now_ms) {
                log_info!("Deployment: slack ratio {} too high, holding", ratio);
            }
        } else if ratio < self.config.max_slack_ratio {
            match ctrl.release(now_ms) {
                Ok(true) => log_info!("Deployment: slack ratio {} ok, resuming", ratio),
                Ok(false) => {}
                Err(e) => {
                    log_error!("Deployment: re-engage after hold failed: {:?}", e);
                    return self.abort(AbortReason::Fault, now_ms);
                }
            }
        }
        None
    }

    fn wait_timeout_ms(&self) -> u32 {
        match self.stage {
            DeploymentStage::WaitTight => self.config.wait_tight_ms,
            DeploymentStage::WaitFirst => self.config.wait_first_ms,
            _ => self.config.wait_second_ms,
        }
    }

    fn hold_ms(&self) -> u32 {
        match self.stage {
            DeploymentStage::HoldDrop => self.config.hold_drop_ms,
            DeploymentStage::HoldFirst => self.config.hold_first_ms,
            _ => self.config.hold_second_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::RelayActuator;
    use crate::config::{CatenaryConfig, WindlassConfig};
    use crate::control::ControlInputs;
    use crate::slack::{SlackInput, SlackSample};
    use crate::storage::MemoryStore;

    type Controller = ChainController<MemoryStore, RelayActuator>;

    fn setup() -> (DeploymentManager, Controller, SlackEstimator) {
        let config = WindlassConfig::default();
        let ctrl = ChainController::new(
            &config,
            RelayActuator::new(config.relay),
            MemoryStore::new(),
            0,
        );
        (
            DeploymentManager::new(config.deployment),
            ctrl,
            SlackEstimator::new(CatenaryConfig::default()),
        )
    }

    fn env(depth: f32) -> Environment {
        Environment {
            depth_m: Some(depth),
            ..Environment::default()
        }
    }

    fn pay_out(ctrl: &mut Controller, metres: f32, now: u32) {
        let pulses = (metres / 0.25) as usize;
        for _ in 0..pulses {
            ctrl.on_pulse(now);
        }
    }

    fn sample(slack: f32) -> SlackSample {
        let estimator = SlackEstimator::new(CatenaryConfig {
            fixed_factor: Some(0.9),
            ..CatenaryConfig::default()
        });
        let mut s = estimator
            .estimate(&SlackInput {
                chain_length_m: 20.0,
                depth_m: 5.0,
                distance_m: 0.0,
                wind_m_s: None,
                timestamp_ms: 0,
            })
            .unwrap();
        s.slack_m = slack;
        s
    }

    fn sample_at(slack: f32, at: u32) -> SlackSample {
        SlackSample {
            timestamp_ms: at,
            ..sample(slack)
        }
    }

    fn incremental() -> DeploymentManager {
        DeploymentManager::new(DeploymentConfig {
            strategy: DeployStrategy::Incremental,
            ..DeploymentConfig::default()
        })
    }

    /// Manager and controller in `stage` with `position` of chain out
    fn stepping_at(stage: DeploymentStage, position: f32) -> (DeploymentManager, Controller) {
        let (_, mut ctrl, est) = setup();
        let mut mgr = incremental();
        mgr.start(0, &env(5.0), &est, &mut ctrl).unwrap();
        ctrl.reset_position(position, 0).unwrap();
        mgr.enter(stage, 0);
        (mgr, ctrl)
    }

    #[test]
    fn test_plan_targets() {
        let (_, ctrl, est) = setup();
        let config = DeploymentConfig::default();
        let plan = DeploymentPlan::new(5.0, 5.0, None, ctrl.chain(), &config, &est).unwrap();
        assert_eq!(plan.drop_m, 9.0);
        assert_eq!(plan.first_m, 15.0);
        assert_eq!(plan.second_m, 25.0);
        assert_eq!(plan.full_m, 35.0);
        assert!(plan.wait_tight_m > 0.0 && plan.wait_tight_m < plan.drop_m);
        assert!(plan.wait_first_m > plan.wait_tight_m);
    }

    #[test]
    fn test_plan_minimum_and_limit() {
        let (_, ctrl, est) = setup();
        let config = DeploymentConfig::default();

        let shallow = DeploymentPlan::new(1.0, 3.0, None, ctrl.chain(), &config, &est).unwrap();
        assert_eq!(shallow.full_m, 10.0);
        assert!(shallow.first_m >= shallow.drop_m);

        let deep = DeploymentPlan::new(40.0, 40.0, None, ctrl.chain(), &config, &est).unwrap();
        assert_eq!(deep.second_m, 100.0);
        assert_eq!(deep.full_m, 100.0);
    }

    #[test]
    fn test_start_requires_valid_depth() {
        let (mut mgr, mut ctrl, est) = setup();
        assert_eq!(
            mgr.start(0, &Environment::default(), &est, &mut ctrl),
            Err(CommandError::InvalidDepth)
        );
        assert_eq!(
            mgr.start(0, &env(2.0), &est, &mut ctrl),
            Err(CommandError::InvalidDepth)
        );
        assert_eq!(
            mgr.start(0, &env(60.0), &est, &mut ctrl),
            Err(CommandError::InvalidDepth)
        );
        assert_eq!(mgr.stage(), DeploymentStage::Idle);
    }

    #[test]
    fn test_start_uses_tide_adjusted_depth() {
        let (mut mgr, mut ctrl, est) = setup();
        let mut e = env(5.0);
        e.tide_now_m = Some(0.5);
        e.tide_high_m = Some(2.5);
        let plan = mgr.start(0, &e, &est, &mut ctrl).unwrap();
        assert_eq!(plan.depth_m, 7.0);
        assert_eq!(plan.first_m, 21.0);
    }

    #[test]
    fn test_second_start_rejected() {
        let (mut mgr, mut ctrl, est) = setup();
        mgr.start(0, &env(5.0), &est, &mut ctrl).unwrap();
        assert_eq!(
            mgr.start(10, &env(5.0), &est, &mut ctrl),
            Err(CommandError::AlreadyActive)
        );
    }

    #[test]
    fn test_first_scope_reached_moves_to_wait_first() {
        let (mut mgr, mut ctrl, est) = setup();
        let e = env(5.0);
        let inputs = ControlInputs {
            slack_m: None,
            depth_m: Some(5.0),
        };

        mgr.start(0, &e, &est, &mut ctrl).unwrap();
        assert_eq!(mgr.stage(), DeploymentStage::Drop);

        // Drop issues the movement to depth + 4
        assert_eq!(mgr.tick(0, &e, &mut ctrl), None);
        assert_eq!(ctrl.intent().unwrap().target_m, 9.0);
        pay_out(&mut ctrl, 9.0, 500);
        ctrl.tick(600, &inputs);
        assert_eq!(
            mgr.tick(1000, &e, &mut ctrl),
            Some(DeploymentEvent::StageChanged {
                from: DeploymentStage::Drop,
                to: DeploymentStage::WaitTight
            })
        );

        // Boat drifts back until the chain is tight
        let mut drifted = e;
        drifted.distance_m = Some(mgr.plan().unwrap().wait_tight_m + 0.1);
        assert!(mgr.tick(1500, &drifted, &mut ctrl).is_some());
        assert_eq!(mgr.stage(), DeploymentStage::HoldDrop);

        // Hold for 2 s
        assert_eq!(mgr.tick(2000, &drifted, &mut ctrl), None);
        assert!(mgr.tick(3500, &drifted, &mut ctrl).is_some());
        assert_eq!(mgr.stage(), DeploymentStage::DeployFirst);

        // First scope: 3:1 on 5 m
        mgr.tick(4000, &drifted, &mut ctrl);
        assert_eq!(ctrl.intent().unwrap().target_m, 15.0);
        pay_out(&mut ctrl, 6.0, 5000);
        ctrl.tick(5100, &inputs);
        assert_eq!(ctrl.position(), 15.0);
        assert_eq!(
            mgr.tick(5500, &drifted, &mut ctrl),
            Some(DeploymentEvent::StageChanged {
                from: DeploymentStage::DeployFirst,
                to: DeploymentStage::WaitFirst
            })
        );
    }

    #[test]
    fn test_wait_stage_times_out() {
        let (mut mgr, mut ctrl, est) = setup();
        let e = env(5.0);
        mgr.start(0, &e, &est, &mut ctrl).unwrap();
        mgr.enter(DeploymentStage::WaitTight, 1000);

        assert_eq!(mgr.tick(30_000, &e, &mut ctrl), None);
        assert!(mgr.tick(31_000, &e, &mut ctrl).is_some());
        assert_eq!(mgr.stage(), DeploymentStage::HoldDrop);
    }

    #[test]
    fn test_deploy_holds_on_slack_ratio() {
        let (mut mgr, mut ctrl, est) = setup();
        let mut e = env(5.0);
        mgr.start(0, &e, &est, &mut ctrl).unwrap();
        ctrl.reset_position(9.0, 0).unwrap();
        mgr.enter(DeploymentStage::DeployFirst, 0);

        mgr.tick(0, &e, &mut ctrl);
        assert!(ctrl.is_active());

        // 3 m slack on 5 m depth: ratio 0.6 > 0.5
        e.slack = Some(sample(3.0));
        mgr.tick(500, &e, &mut ctrl);
        assert!(ctrl.is_held());
        assert!(!ctrl.outputs().any());

        // Boat drifted back: ratio 0.2
        e.slack = Some(sample(1.0));
        mgr.tick(1000, &e, &mut ctrl);
        assert!(!ctrl.is_held());
    }

    #[test]
    fn test_drop_stage_ignores_slack_ratio() {
        let (mut mgr, mut ctrl, est) = setup();
        let mut e = env(5.0);
        mgr.start(0, &e, &est, &mut ctrl).unwrap();
        mgr.tick(0, &e, &mut ctrl);

        e.slack = Some(sample(10.0));
        mgr.tick(500, &e, &mut ctrl);
        assert!(!ctrl.is_held());
    }

    #[test]
    fn test_incremental_steps_follow_slack_deficit() {
        let (mut mgr, mut ctrl) = stepping_at(DeploymentStage::DeployFirst, 10.0);
        let mut e = env(5.0);
        let inputs = ControlInputs::default();

        // 10 m out aims for 1 m of slack; 0.9 m is close enough
        e.slack = Some(sample_at(0.9, 0));
        assert_eq!(mgr.tick(0, &e, &mut ctrl), None);
        assert!(!ctrl.is_active());

        // 0.5 m short, slack falling slowly: normal step
        e.slack = Some(sample_at(0.5, 10_000));
        assert_eq!(mgr.tick(10_000, &e, &mut ctrl), None);
        assert_eq!(ctrl.intent().unwrap().target_m, 10.5);
        pay_out(&mut ctrl, 0.5, 10_200);
        ctrl.tick(10_300, &inputs);
        assert!(!ctrl.is_active());

        // Slack falling 0.3 m/s: fast step
        e.slack = Some(sample_at(0.2, 11_000));
        assert_eq!(mgr.tick(11_000, &e, &mut ctrl), None);
        assert_eq!(ctrl.intent().unwrap().target_m, 11.5);
        assert_eq!(mgr.stage(), DeploymentStage::DeployFirst);
        assert_eq!(mgr.retries(), 0);
    }

    #[test]
    fn test_incremental_no_step_over_slack_ratio() {
        let (mut mgr, mut ctrl) = stepping_at(DeploymentStage::DeployFull, 30.0);
        let mut e = env(5.0);

        // 3 m aimed for, 2.6 m there, but 2.6 / 5 is over the ratio
        e.slack = Some(sample_at(2.6, 0));
        assert_eq!(mgr.tick(0, &e, &mut ctrl), None);
        assert!(!ctrl.is_active());

        e.slack = Some(sample_at(2.4, 10_000));
        mgr.tick(10_000, &e, &mut ctrl);
        assert_eq!(ctrl.intent().unwrap().target_m, 30.5);
    }

    #[test]
    fn test_incremental_steps_reach_stage_target() {
        let (mut mgr, mut ctrl) = stepping_at(DeploymentStage::DeployFirst, 14.0);
        let e = env(5.0);
        let inputs = ControlInputs::default();

        let mut now = 0;
        let mut event = None;
        for _ in 0..10 {
            now += 500;
            event = mgr.tick(now, &e, &mut ctrl);
            if event.is_some() {
                break;
            }
            let intent = *ctrl.intent().unwrap();
            assert!(intent.target_m <= 15.0);
            let delta = intent.target_m - ctrl.position();
            pay_out(&mut ctrl, delta, now);
            ctrl.tick(now + 100, &inputs);
        }

        assert_eq!(
            event,
            Some(DeploymentEvent::StageChanged {
                from: DeploymentStage::DeployFirst,
                to: DeploymentStage::WaitFirst
            })
        );
        assert_eq!(ctrl.position(), 15.0);
    }

    #[test]
    fn test_short_movement_retried_then_aborted() {
        let (mut mgr, mut ctrl, est) = setup();
        let e = env(5.0);
        mgr.start(0, &e, &est, &mut ctrl).unwrap();

        // Each movement is cut short (as a timeout would)
        for attempt in 0..3 {
            assert_eq!(mgr.tick(attempt * 1000, &e, &mut ctrl), None);
            assert!(ctrl.is_active());
            ctrl.stop(attempt * 1000 + 500);
        }
        assert_eq!(mgr.retries(), 2);

        assert_eq!(
            mgr.tick(5000, &e, &mut ctrl),
            Some(DeploymentEvent::Aborted(AbortReason::MovementFailed))
        );
        assert_eq!(mgr.stage(), DeploymentStage::Idle);
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_stop_lands_on_idle() {
        let (mut mgr, mut ctrl, est) = setup();
        let e = env(5.0);
        mgr.start(0, &e, &est, &mut ctrl).unwrap();
        mgr.tick(0, &e, &mut ctrl);
        assert!(ctrl.is_active());

        assert!(mgr.stop(100, &mut ctrl));
        assert_eq!(mgr.stage(), DeploymentStage::Idle);
        assert!(!ctrl.is_active());
        assert!(!ctrl.outputs().any());

        assert!(!mgr.stop(200, &mut ctrl));
    }

    #[test]
    fn test_advance_from_idle_rejected() {
        let (mut mgr, _, _) = setup();
        assert!(mgr.advance(0).is_err());
        assert_eq!(mgr.stage(), DeploymentStage::Idle);
    }

    #[test]
    fn test_full_sequence_completes() {
        let (mut mgr, mut ctrl, est) = setup();
        let e = env(5.0);
        let inputs = ControlInputs::default();
        mgr.start(0, &e, &est, &mut ctrl).unwrap();

        let mut now = 0;
        let mut completed = false;
        for _ in 0..2000 {
            now += 500;
            if let Some(intent) = ctrl.intent().copied() {
                let remaining = intent.target_m - ctrl.position();
                pay_out(&mut ctrl, remaining.max(0.0), now);
                ctrl.tick(now, &inputs);
            }
            if mgr.tick(now, &e, &mut ctrl) == Some(DeploymentEvent::Completed) {
                completed = true;
                break;
            }
        }

        assert!(completed);
        assert_eq!(mgr.stage(), DeploymentStage::Complete);
        assert_eq!(ctrl.position(), 35.0);
    }
}
