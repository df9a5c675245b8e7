//! Deployment stage machine
//!
//! Stages run strictly in order; the only way back is an abort to `Idle`.
//!
//! ```text
//! Idle → Drop → WaitTight → HoldDrop
//!      → DeployFirst → WaitFirst → HoldFirst
//!      → DeploySecond → WaitSecond → HoldSecond
//!      → DeployFull → Complete
//! ```

/// Deployment stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeploymentStage {
    /// No sequence running
    #[default]
    Idle,
    /// Pay out depth plus offset so the anchor reaches the bottom
    Drop,
    /// Let the boat drift back until the chain comes tight
    WaitTight,
    /// Let the anchor settle
    HoldDrop,
    /// Pay out to the first scope ratio
    DeployFirst,
    /// Drift back on the first scope
    WaitFirst,
    /// Let the anchor dig in
    HoldFirst,
    /// Pay out to the second scope ratio
    DeploySecond,
    /// Drift back on the second scope
    WaitSecond,
    /// Let the anchor dig in
    HoldSecond,
    /// Pay out to full scope
    DeployFull,
    /// Sequence finished
    Complete,
}

/// What a stage does while it is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StageKind {
    /// `Idle` or `Complete`
    Inactive,
    /// Single lowering movement to the drop target
    Drop,
    /// Waits for distance or timeout
    Wait,
    /// Fixed delay
    Hold,
    /// Slack-paced lowering movement
    Deploy,
}

/// Requests that drive the stage machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StageEvent {
    /// Begin a sequence
    Start,
    /// Current stage finished
    Advance,
    /// Abandon the sequence
    Abort,
}

/// A request the current stage does not accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionError {
    pub from: DeploymentStage,
    pub event: StageEvent,
}

impl DeploymentStage {
    /// Every stage in sequence order
    pub const ALL: [DeploymentStage; 12] = [
        DeploymentStage::Idle,
        DeploymentStage::Drop,
        DeploymentStage::WaitTight,
        DeploymentStage::HoldDrop,
        DeploymentStage::DeployFirst,
        DeploymentStage::WaitFirst,
        DeploymentStage::HoldFirst,
        DeploymentStage::DeploySecond,
        DeploymentStage::WaitSecond,
        DeploymentStage::HoldSecond,
        DeploymentStage::DeployFull,
        DeploymentStage::Complete,
    ];

    /// Stage that follows this one in a running sequence
    pub fn next(&self) -> Option<DeploymentStage> {
        use DeploymentStage::*;
        match self {
            Idle | Complete => None,
            Drop => Some(WaitTight),
            WaitTight => Some(HoldDrop),
            HoldDrop => Some(DeployFirst),
            DeployFirst => Some(WaitFirst),
            WaitFirst => Some(HoldFirst),
            HoldFirst => Some(DeploySecond),
            DeploySecond => Some(WaitSecond),
            WaitSecond => Some(HoldSecond),
            HoldSecond => Some(DeployFull),
            DeployFull => Some(Complete),
        }
    }

    /// Apply an event
    pub fn transition(self, event: StageEvent) -> Result<DeploymentStage, TransitionError> {
        use DeploymentStage::*;
        match (self, event) {
            (_, StageEvent::Abort) => Ok(Idle),
            (Idle | Complete, StageEvent::Start) => Ok(Drop),
            (from, StageEvent::Advance) => from.next().ok_or(TransitionError { from, event }),
            (from, StageEvent::Start) => Err(TransitionError { from, event }),
        }
    }

    /// Behaviour of this stage
    pub fn kind(&self) -> StageKind {
        use DeploymentStage::*;
        match self {
            Idle | Complete => StageKind::Inactive,
            Drop => StageKind::Drop,
            WaitTight | WaitFirst | WaitSecond => StageKind::Wait,
            HoldDrop | HoldFirst | HoldSecond => StageKind::Hold,
            DeployFirst | DeploySecond | DeployFull => StageKind::Deploy,
        }
    }

    /// Check if a sequence is running
    pub fn is_active(&self) -> bool {
        self.kind() != StageKind::Inactive
    }

    /// Published stage name
    pub fn name(&self) -> &'static str {
        use DeploymentStage::*;
        match self {
            Idle => "Idle",
            Drop => "Drop",
            WaitTight => "WaitTight",
            HoldDrop => "HoldDrop",
            DeployFirst => "DeployFirst",
            WaitFirst => "WaitFirst",
            HoldFirst => "HoldFirst",
            DeploySecond => "DeploySecond",
            WaitSecond => "WaitSecond",
            HoldSecond => "HoldSecond",
            DeployFull => "DeployFull",
            Complete => "Complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_fixed() {
        let mut stage = DeploymentStage::Idle.transition(StageEvent::Start).unwrap();
        let mut seen = 1;
        while stage != DeploymentStage::Complete {
            assert_eq!(stage, DeploymentStage::ALL[seen]);
            stage = stage.transition(StageEvent::Advance).unwrap();
            seen += 1;
        }
        assert_eq!(seen, DeploymentStage::ALL.len() - 1);
    }

    #[test]
    fn test_transition_table() {
        for stage in DeploymentStage::ALL {
            // Abort always lands on Idle
            assert_eq!(stage.transition(StageEvent::Abort), Ok(DeploymentStage::Idle));

            let start = stage.transition(StageEvent::Start);
            if stage.is_active() {
                assert_eq!(
                    start,
                    Err(TransitionError {
                        from: stage,
                        event: StageEvent::Start
                    })
                );
            } else {
                assert_eq!(start, Ok(DeploymentStage::Drop));
            }

            match stage.next() {
                Some(next) => assert_eq!(stage.transition(StageEvent::Advance), Ok(next)),
                None => assert!(stage.transition(StageEvent::Advance).is_err()),
            }
        }
    }

    #[test]
    fn test_advance_rejected_when_inactive() {
        assert!(DeploymentStage::Idle.transition(StageEvent::Advance).is_err());
        assert!(DeploymentStage::Complete.transition(StageEvent::Advance).is_err());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(DeploymentStage::Drop.kind(), StageKind::Drop);
        assert_eq!(DeploymentStage::WaitFirst.kind(), StageKind::Wait);
        assert_eq!(DeploymentStage::HoldSecond.kind(), StageKind::Hold);
        assert_eq!(DeploymentStage::DeployFull.kind(), StageKind::Deploy);
        assert!(!DeploymentStage::Complete.is_active());
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in DeploymentStage::ALL.iter().enumerate() {
            for b in &DeploymentStage::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }
}
