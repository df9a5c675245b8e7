//! Staged retrieval sequencer
//!
//! Runs on the slow tick:
//!
//! ```text
//! CheckingSlack ──raise──▶ Raising ──done / slack gone──▶ WaitingForSlack
//!      ▲                                                        │
//!      └──────────────── slack built up / final pull ───────────┘
//! ```
//!
//! - A raise takes in the current slack, at least `min_raise_m`, and no
//!   raise follows another within `raise_cooldown_ms`
//! - A raise stops early when slack drops below `stop_slack_m`
//! - Inside the final-pull zone one raise takes the chain to the remainder
//! - At the remainder the sequence is complete

use crate::config::RetrievalConfig;
use crate::control::{ChainController, CommandError, ControlInputs};
use crate::deployment::AbortReason;
use crate::sensors::Environment;
use crate::traits::{PersistentStore, WindlassActuator};

/// Retrieval sequence state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetrievalState {
    /// Not running
    #[default]
    Idle,
    /// Deciding on the next raise
    CheckingSlack,
    /// A raise is in progress
    Raising,
    /// Waiting for the boat to move up and make slack
    WaitingForSlack,
    /// Chain at the remainder
    Complete,
}

impl RetrievalState {
    /// Check if a sequence is running
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RetrievalState::CheckingSlack
                | RetrievalState::Raising
                | RetrievalState::WaitingForSlack
        )
    }
}

/// Events produced by [`RetrievalManager::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetrievalEvent {
    /// Chain in to the remainder
    Completed,
    /// Sequence abandoned
    Aborted(AbortReason),
}

/// Staged retrieval sequencer
#[derive(Debug, Clone)]
pub struct RetrievalManager {
    config: RetrievalConfig,
    state: RetrievalState,
    /// When the last raise was issued
    last_raise_ms: Option<u32>,
    /// Chain out when the current raise was issued (m)
    raise_from_m: f32,
    /// Current raise is the final pull
    final_pull: bool,
}

impl RetrievalManager {
    /// Create an idle manager
    pub fn new(config: RetrievalConfig) -> Self {
        Self {
            config,
            state: RetrievalState::Idle,
            last_raise_ms: None,
            raise_from_m: 0.0,
            final_pull: false,
        }
    }

    /// Current state
    pub fn state(&self) -> RetrievalState {
        self.state
    }

    /// Check if a sequence is running
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Check if the current raise is the final pull
    pub fn is_final_pull(&self) -> bool {
        self.final_pull
    }

    /// Begin a sequence; the first raise is decided on the next tick
    pub fn start<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        ctrl: &ChainController<S, A>,
    ) -> Result<(), CommandError> {
        if self.is_active() || ctrl.is_active() {
            return Err(CommandError::AlreadyActive);
        }
        if ctrl.position() <= self.config.remainder_m + ctrl.arrival_tolerance() {
            return Err(CommandError::AtLimit);
        }

        log_info!(
            "Retrieval: start at {} m, remainder {} m",
            ctrl.position(),
            self.config.remainder_m
        );
        self.last_raise_ms = None;
        self.final_pull = false;
        self.enter(RetrievalState::CheckingSlack);
        Ok(())
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
            self.abort(AbortReason::Stopped);
        }
        was_active
    }

    /// Abandon the sequence without touching the controller
    pub fn abort(&mut self, reason: AbortReason) -> Option<RetrievalEvent> {
        if !self.is_active() {
            return None;
        }
        log_warn!("Retrieval: aborted in {:?} ({:?})", self.state, reason);
        self.enter(RetrievalState::Idle);
        Some(RetrievalEvent::Aborted(reason))
    }

    fn enter(&mut self, state: RetrievalState) {
        if state != self.state {
            log_debug!("Retrieval: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    /// Slack at which a raise is worth starting (m)
    fn start_slack_m(&self) -> f32 {
        self.config.resume_slack_m.max(self.config.min_raise_m)
    }

    /// Advance the sequence (slow tick)
    pub fn tick<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        now_ms: u32,
        env: &Environment,
        ctrl: &mut ChainController<S, A>,
    ) -> Option<RetrievalEvent> {
        let position = ctrl.position();
        let at_remainder = position <= self.config.remainder_m + ctrl.arrival_tolerance();
        let inputs = ControlInputs {
            slack_m: env.slack_m(),
            depth_m: env.depth_m,
        };
        let final_zone = ctrl.in_final_pull_zone(&inputs);
        let slack = env.slack_m();

        match self.state {
            RetrievalState::Idle | RetrievalState::Complete => None,
            RetrievalState::CheckingSlack => {
                if at_remainder {
                    log_info!("Retrieval: complete at {} m", position);
                    self.enter(RetrievalState::Complete);
                    return Some(RetrievalEvent::Completed);
                }
                if ctrl.is_active() {
                    return None;
                }

                if final_zone {
                    log_info!("Retrieval: final pull from {} m", position);
                    self.final_pull = true;
                    return self.raise_to(self.config.remainder_m, now_ms, ctrl);
                }

                let cooling = self
                    .last_raise_ms
                    .map_or(false, |last| now_ms.wrapping_sub(last) < self.config.raise_cooldown_ms);
                match slack {
                    Some(slack) if !cooling && slack >= self.start_slack_m() => {
                        let goal = (position - slack).max(self.config.remainder_m);
                        log_info!("Retrieval: slack {} m, raising to {} m", slack, goal);
                        self.raise_to(goal, now_ms, ctrl)
                    }
                    _ => {
                        self.enter(RetrievalState::WaitingForSlack);
                        None
                    }
                }
            }
            RetrievalState::Raising => {
                if ctrl.is_active() {
                    let slack_gone = slack.map_or(false, |s| s < self.config.stop_slack_m);
                    if !self.final_pull && slack_gone {
                        log_warn!("Retrieval: slack gone during raise, stopping at {} m", position);
                        ctrl.stop(now_ms);
                        self.enter(RetrievalState::WaitingForSlack);
                    }
                    return None;
                }

                if self.raise_from_m - position < ctrl.arrival_tolerance() {
                    log_error!("Retrieval: raise from {} m moved no chain", self.raise_from_m);
                    return self.abort(AbortReason::MovementFailed);
                }
                self.enter(RetrievalState::WaitingForSlack);
                None
            }
            RetrievalState::WaitingForSlack => {
                let slack_ready = slack.map_or(false, |s| s >= self.start_slack_m());
                if at_remainder || final_zone || slack_ready {
                    self.enter(RetrievalState::CheckingSlack);
                }
                None
            }
        }
    }

    fn raise_to<S: PersistentStore, A: WindlassActuator>(
        &mut self,
        goal_m: f32,
        now_ms: u32,
        ctrl: &mut ChainController<S, A>,
    ) -> Option<RetrievalEvent> {
        let from = ctrl.position();
        match ctrl.move_to(goal_m, now_ms) {
            Ok(()) => {
                self.raise_from_m = from;
                self.last_raise_ms = Some(now_ms);
                self.enter(RetrievalState::Raising);
                None
            }
            Err(CommandError::AtLimit) => {
                self.enter(RetrievalState::WaitingForSlack);
                None
            }
            Err(e) => {
                log_error!("Retrieval: raise refused: {:?}", e);
                let reason = if e == CommandError::Fault {
                    AbortReason::Fault
                } else {
                    AbortReason::MovementFailed
                };
                ctrl.stop(now_ms);
                self.abort(reason)
            }
        }
    }
}
