//! Worker lifecycle states.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// `installing → installed → activating → active → redundant`.
///
/// A failed install goes straight to `Redundant`; any state may be made
/// redundant when a newer worker replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    /// Installed and waiting for old clients to close.
    Installed,
    Activating,
    Active,
    Redundant,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Installing, Installed) | (Installed, Activating) | (Activating, Active) | (_, Redundant)
        ) && self != Redundant
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: WorkerState) -> Result<(), Error> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState(format!("cannot move worker from {self:?} to {next:?}")));
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}
