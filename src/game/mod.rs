//! Vehicle simulation and state synchronization

pub mod bodies;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod physics;
pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod stepper;
pub mod world;

pub use dispatch::Dispatcher;
pub use input::InputState;
pub use session::{ConnectionId, JoinProfile};
pub use simulation::SimulationConfig;
pub use world::{GameWorld, WorldHandle};

/// Inbound event from a connection, applied in arrival order
#[derive(Debug, Clone)]
pub enum WorldEvent {
    Join {
        id: ConnectionId,
        profile: JoinProfile,
    },
    Input {
        id: ConnectionId,
        input: InputState,
    },
    Chat {
        id: ConnectionId,
        message: String,
    },
    Disconnect {
        id: ConnectionId,
    },
}
