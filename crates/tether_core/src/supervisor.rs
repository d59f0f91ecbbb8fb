use std::time::Duration;

use tether_logging::{tether_info, tether_warn};

use crate::Effect;

/// Default time a graceful stop gets before the channel is force-terminated.
pub const STOP_ESCALATION_DEADLINE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPhase {
    #[default]
    Idle,
    /// Graceful stop sent, escalation timer `generation` armed.
    StopRequested { generation: u64 },
}

/// Graceful stop with a bounded wait. A stale timer generation never
/// escalates, so force-terminate fires at most once per stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSupervisor {
    phase: StopPhase,
    deadline: Duration,
    next_generation: u64,
    escalations: u32,
}

impl StopSupervisor {
    pub fn new(deadline: Duration) -> Self {
        Self {
            phase: StopPhase::Idle,
            deadline,
            next_generation: 1,
            escalations: 0,
        }
    }

    pub fn phase(&self) -> StopPhase {
        self.phase
    }

    /// Number of stops that ended in forced termination.
    pub fn escalations(&self) -> u32 {
        self.escalations
    }

    /// Idle -> StopRequested. Returns no effects if a stop is already underway.
    pub fn request_stop(&mut self) -> Vec<Effect> {
        if let StopPhase::StopRequested { generation } = self.phase {
            tether_info!("stop already requested (timer {generation}), ignoring");
            return Vec::new();
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.phase = StopPhase::StopRequested { generation };
        vec![
            Effect::Interrupt,
            Effect::ArmStopTimer {
                generation,
                after: self.deadline,
            },
        ]
    }

    /// The program ended on its own or after the graceful stop.
    pub fn run_ended(&mut self) -> Option<Effect> {
        match std::mem::take(&mut self.phase) {
            StopPhase::StopRequested { generation } => Some(Effect::DisarmStopTimer { generation }),
            StopPhase::Idle => None,
        }
    }

    /// Timer `generation` fired. Returns true when the stop escalates and the
    /// caller must force-terminate; the supervisor is back to idle afterwards.
    pub fn deadline_elapsed(&mut self, generation: u64) -> bool {
        match self.phase {
            StopPhase::StopRequested { generation: armed } if armed == generation => {
                tether_warn!("graceful stop not acknowledged within {:?}, escalating", self.deadline);
                self.phase = StopPhase::Idle;
                self.escalations += 1;
                true
            }
            _ => false,
        }
    }

    /// Drops any armed timer, e.g. when the link is lost.
    pub fn reset(&mut self) -> Option<Effect> {
        self.run_ended()
    }
}

impl Default for StopSupervisor {
    fn default() -> Self {
        Self::new(STOP_ESCALATION_DEADLINE)
    }
}
