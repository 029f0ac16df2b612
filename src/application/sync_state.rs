//! Sync run state machine
//!
//! `Idle → Planning → Generating → Diffing → Committing → Done | Failed`.
//! A run cycles Planning..Committing once per model, then moves to `Done`
//! after the final flush. Any non-terminal phase may move to `Failed`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::application::errors::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPhase {
    Idle,
    Planning,
    Generating,
    Diffing,
    Committing,
    Done,
    Failed,
}

impl SyncPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SyncPhase::{Committing, Diffing, Done, Failed, Generating, Idle, Planning};
        match (self, next) {
            (Idle, Planning | Done)
            | (Planning, Generating)
            | (Generating, Diffing)
            | (Diffing, Committing)
            | (Committing, Planning | Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Generating => "generating",
            Self::Diffing => "diffing",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SyncStateMachine {
    phase: SyncPhase,
    transitions: usize,
}

impl Default for SyncStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            transitions: 0,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    #[must_use]
    pub const fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn transition(&mut self, next: SyncPhase) -> Result<(), SyncError> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!(from = %self.phase, to = %next, "sync phase transition");
        self.phase = next;
        self.transitions += 1;
        Ok(())
    }

    /// Moves to `Failed` unless the run already finished.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = SyncPhase::Failed;
            self.transitions += 1;
        }
    }
}
