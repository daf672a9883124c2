//! Synchronous simulation core: sessions, inputs, bodies and both ticks

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rapier3d::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::util::time::{tick_delta, BROADCAST_INTERVAL_MS, PHYSICS_TPS};
use crate::ws::protocol::ServerMsg;

use super::bodies::VehicleBodyPool;
use super::dispatch::Dispatcher;
use super::error::SimError;
use super::input::{InputCache, InputState};
use super::physics::VehicleTuning;
use super::session::{ConnectionId, JoinProfile, PlayerSession, SessionRegistry, DEFAULT_NICKNAME};
use super::snapshot::SnapshotBroadcaster;
use super::stepper::{PhysicsStepper, StepReport};
use super::WorldEvent;

/// Spawn ring around the origin
const SPAWN_MIN_DISTANCE: Real = 5.0;
const SPAWN_MAX_DISTANCE: Real = 30.0;
/// Chassis centre height at spawn; cars drop onto the ground
const SPAWN_HEIGHT: Real = 1.0;

/// Simulation settings
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub physics_tps: u32,
    pub broadcast_interval: Duration,
    pub seed: u64,
    pub tuning: VehicleTuning,
}

impl SimulationConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            physics_tps: config.physics_tps,
            broadcast_interval: Duration::from_millis(config.broadcast_interval_ms),
            seed: config.world_seed,
            tuning: VehicleTuning::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            physics_tps: PHYSICS_TPS,
            broadcast_interval: Duration::from_millis(BROADCAST_INTERVAL_MS),
            seed: 0,
            tuning: VehicleTuning::default(),
        }
    }
}

/// Owns every piece of mutable world state. All mutation goes through
/// `&mut self`, so a join, an input, a disconnect and a tick can never
/// interleave.
pub struct Simulation {
    sessions: SessionRegistry,
    inputs: InputCache,
    pool: VehicleBodyPool,
    stepper: PhysicsStepper,
    broadcaster: SnapshotBroadcaster,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            inputs: InputCache::new(),
            pool: VehicleBodyPool::new(tick_delta(config.physics_tps), config.tuning),
            stepper: PhysicsStepper::new(),
            broadcaster: SnapshotBroadcaster::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    /// Apply one inbound connection event
    pub fn handle_event<D: Dispatcher + ?Sized>(&mut self, event: WorldEvent, dispatcher: &D) {
        match event {
            WorldEvent::Join { id, profile } => match self.join(id, profile) {
                Ok(()) => {
                    if let Some(session) = self.sessions.get(&id) {
                        info!(
                            connection_id = %id,
                            nickname = %session.nickname,
                            session_count = self.sessions.len(),
                            "Player joined"
                        );
                    }
                    dispatcher.emit(id, ServerMsg::IdentityAssigned { id });
                    self.broadcast_tick(dispatcher);
                }
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Join rejected");
                    dispatcher.emit(
                        id,
                        ServerMsg::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        },
                    );
                }
            },
            WorldEvent::Input { id, input } => {
                if !self.set_input(id, input) {
                    debug!(connection_id = %id, "Dropping input for connection without session");
                }
            }
            WorldEvent::Chat { id, message } => {
                let sender = self.chat_sender(&id);
                dispatcher.broadcast(ServerMsg::Chat { sender, message });
            }
            WorldEvent::Disconnect { id } => {
                if let Some(session) = self.disconnect(&id) {
                    info!(
                        connection_id = %id,
                        nickname = %session.nickname,
                        session_count = self.sessions.len(),
                        "Player left"
                    );
                    self.broadcast_tick(dispatcher);
                }
            }
        }
    }

    /// Register a session and its vehicle body together
    pub fn join(&mut self, id: ConnectionId, profile: JoinProfile) -> Result<(), SimError> {
        if self.sessions.contains(&id) {
            return Err(SimError::DuplicateSession(id));
        }

        let (position, orientation) = self.generate_spawn_pose();
        self.sessions.join(id, profile)?;

        match self.pool.spawn(id, position, orientation) {
            Ok(_) => {
                self.stepper
                    .publish(id, Isometry::from_parts(position.into(), orientation));
                Ok(())
            }
            Err(e) => {
                // Orphan body: keep the registry as it was
                error!(connection_id = %id, error = %e, "Body exists without session, rolling back join");
                self.sessions.remove(&id);
                Err(e)
            }
        }
    }

    /// Cache the latest input and apply its gear override. Input for a
    /// connection without a session is dropped.
    pub fn set_input(&mut self, id: ConnectionId, input: InputState) -> bool {
        if !self.inputs.set_input(&self.sessions, id, input) {
            return false;
        }
        if let (Some(gear), Some(session)) = (input.gear, self.sessions.get_mut(&id)) {
            session.gear = gear;
        }
        true
    }

    /// Nickname used to tag chat from this connection
    pub fn chat_sender(&self, id: &ConnectionId) -> String {
        self.sessions
            .get(id)
            .map(|s| s.nickname.clone())
            .unwrap_or_else(|| DEFAULT_NICKNAME.to_string())
    }

    /// Tear down a session: body first, then the session entry. Absent
    /// ids are a no-op.
    pub fn disconnect(&mut self, id: &ConnectionId) -> Option<PlayerSession> {
        self.pool.despawn(id);
        self.stepper.forget(id);
        self.inputs.remove(id);
        self.sessions.remove(id)
    }

    /// One fixed-dt physics step
    pub fn tick(&mut self) -> StepReport {
        self.stepper
            .step(&self.sessions, &self.inputs, &mut self.pool)
    }

    /// Fan out the current snapshot to every connection
    pub fn broadcast_tick<D: Dispatcher + ?Sized>(&mut self, dispatcher: &D) {
        self.broadcaster.broadcast(
            self.stepper.tick(),
            &self.sessions,
            self.stepper.transforms(),
            dispatcher,
        );
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn physics_tick(&self) -> u64 {
        self.stepper.tick()
    }

    /// Random point on the spawn ring, facing a random direction
    fn generate_spawn_pose(&mut self) -> (Vector<Real>, Rotation<Real>) {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(SPAWN_MIN_DISTANCE..SPAWN_MAX_DISTANCE);
        let yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);

        let position = vector![angle.cos() * distance, SPAWN_HEIGHT, angle.sin() * distance];
        let orientation = Rotation::from_axis_angle(&Vector::y_axis(), yaw);
        (position, orientation)
    }
}
