//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameWorld, SimulationConfig, WorldHandle};
use crate::ws::hub::ConnectionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<ConnectionHub>,
    pub world: WorldHandle,
}

impl AppState {
    /// Build the state and the world task that still has to be spawned
    pub fn new(config: Config) -> (Self, GameWorld<ConnectionHub>) {
        let config = Arc::new(config);

        // Connection hub doubles as the world's dispatcher
        let hub = Arc::new(ConnectionHub::new());

        let (world, handle) = GameWorld::new(&SimulationConfig::from_config(&config), hub.clone());

        let state = Self {
            config,
            hub,
            world: handle,
        };

        (state, world)
    }
}
