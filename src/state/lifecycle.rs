//! Lifecycle states for the fetch cycle machinery
//!
//! Both the scheduler controller and the queue feeder publish their state
//! through an atomic cell so that workers and the monitor loop can observe
//! it without locking.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Controller state for one fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No cycle has been started
    Idle,
    /// Feeder and workers are live
    Running,
    /// Waiting for workers to finish
    Draining,
    /// Cycle finalized
    Stopped,
}

impl SchedulerState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Draining => 2,
            Self::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Draining,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Queue feeder state
///
/// `Exhausted` means the generator has nothing more to hand out, which is
/// distinct from the fetch queue being momentarily empty. `Failed` means the
/// generator errored and the cycle saw only part of its pending records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    Running,
    Exhausted,
    Stopped,
    Failed,
}

impl FeederState {
    /// Returns true while the feeder may still push new records
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Running)
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Exhausted => 1,
            Self::Stopped => 2,
            Self::Failed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Exhausted,
            3 => Self::Failed,
            _ => Self::Stopped,
        }
    }
}

/// Lock-free cell holding a [`SchedulerState`]
#[derive(Debug)]
pub struct AtomicSchedulerState(AtomicU8);

impl AtomicSchedulerState {
    pub fn new(state: SchedulerState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> SchedulerState {
        SchedulerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: SchedulerState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Moves from `from` to `to`, returning false if the current state differs
    pub fn transition(&self, from: SchedulerState, to: SchedulerState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Lock-free cell holding a [`FeederState`]
#[derive(Debug)]
pub struct AtomicFeederState(AtomicU8);

impl AtomicFeederState {
    pub fn new(state: FeederState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> FeederState {
        FeederState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Leaves `Running` for a terminal state; a terminal state is never overwritten
    pub fn finish(&self, state: FeederState) {
        let _ = self.0.compare_exchange(
            FeederState::Running.as_u8(),
            state.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_transition() {
        let state = AtomicSchedulerState::new(SchedulerState::Idle);
        assert!(state.transition(SchedulerState::Idle, SchedulerState::Running));
        assert!(!state.transition(SchedulerState::Idle, SchedulerState::Running));
        assert_eq!(state.load(), SchedulerState::Running);
    }

    #[test]
    fn test_feeder_finish_keeps_first_terminal_state() {
        let state = AtomicFeederState::new(FeederState::Running);
        assert!(state.load().is_alive());

        state.finish(FeederState::Exhausted);
        state.finish(FeederState::Stopped);

        assert_eq!(state.load(), FeederState::Exhausted);
        assert!(!state.load().is_alive());
    }

    #[test]
    fn test_feeder_failure_is_terminal() {
        let state = AtomicFeederState::new(FeederState::Running);
        state.finish(FeederState::Failed);
        state.finish(FeederState::Stopped);

        assert_eq!(state.load(), FeederState::Failed);
        assert!(!state.load().is_alive());
    }

    #[test]
    fn test_display() {
        assert_eq!(SchedulerState::Draining.to_string(), "draining");
    }
}
