//! Simulation fault kinds

use uuid::Uuid;

/// Errors and faults raised by the simulation core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// A join arrived for a connection that already has a session
    #[error("session already exists for connection {0}")]
    DuplicateSession(Uuid),

    /// A body already exists for the connection
    #[error("vehicle body already spawned for connection {0}")]
    AlreadySpawned(Uuid),

    /// A session exists without a body (or the reverse)
    #[error("session {0} has no vehicle body")]
    StateInconsistency(Uuid),

    /// Non-finite state detected on a body; its motion was reset
    #[error("non-finite {what} on body of connection {id}")]
    SimulationFault { id: Uuid, what: &'static str },
}

impl SimError {
    /// Short code sent to clients in `error` messages
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSession(_) => "duplicate_session",
            Self::AlreadySpawned(_) => "already_spawned",
            Self::StateInconsistency(_) => "state_inconsistency",
            Self::SimulationFault { .. } => "simulation_fault",
        }
    }
}
