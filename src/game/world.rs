//! Authoritative world task: one owner, two timers, one event queue

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{tick_period, Timer};

use super::dispatch::Dispatcher;
use super::simulation::{Simulation, SimulationConfig};
use super::WorldEvent;

/// Capacity of the inbound event queue
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Handle to the running world
#[derive(Clone)]
pub struct WorldHandle {
    event_tx: mpsc::Sender<WorldEvent>,
    session_count: Arc<AtomicUsize>,
    physics_tick: Arc<AtomicU64>,
}

impl WorldHandle {
    /// Queue an event for the world task. Returns false once the world has stopped.
    pub async fn send(&self, event: WorldEvent) -> bool {
        self.event_tx.send(event).await.is_ok()
    }

    pub fn session_count(&self) -> usize {
        self.session_count.load(Ordering::Relaxed)
    }

    pub fn physics_tick(&self) -> u64 {
        self.physics_tick.load(Ordering::Relaxed)
    }
}

/// The world task. Events, physics ticks and broadcast ticks are all
/// handled on this one task, never concurrently.
pub struct GameWorld<D: Dispatcher> {
    simulation: Simulation,
    event_rx: mpsc::Receiver<WorldEvent>,
    dispatcher: Arc<D>,
    physics_period: Duration,
    broadcast_period: Duration,
    session_count: Arc<AtomicUsize>,
    physics_tick: Arc<AtomicU64>,
}

impl<D: Dispatcher> GameWorld<D> {
    pub fn new(config: &SimulationConfig, dispatcher: Arc<D>) -> (Self, WorldHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let session_count = Arc::new(AtomicUsize::new(0));
        let physics_tick = Arc::new(AtomicU64::new(0));

        let handle = WorldHandle {
            event_tx,
            session_count: session_count.clone(),
            physics_tick: physics_tick.clone(),
        };

        let world = Self {
            simulation: Simulation::new(config),
            event_rx,
            dispatcher,
            physics_period: tick_period(config.physics_tps),
            broadcast_period: config.broadcast_interval,
            session_count,
            physics_tick,
        };

        (world, handle)
    }

    /// Run until every `WorldHandle` is dropped
    pub async fn run(mut self) {
        info!(
            physics_period_us = self.physics_period.as_micros() as u64,
            broadcast_period_ms = self.broadcast_period.as_millis() as u64,
            "World started"
        );

        let mut physics_interval = interval(self.physics_period);
        physics_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(self.broadcast_period);
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(event) => {
                        self.simulation.handle_event(event, self.dispatcher.as_ref());
                        self.session_count
                            .store(self.simulation.session_count(), Ordering::Relaxed);
                    }
                    None => break,
                },
                _ = physics_interval.tick() => self.physics_tick(),
                _ = broadcast_interval.tick() => {
                    self.simulation.broadcast_tick(self.dispatcher.as_ref());
                }
            }
        }

        info!(tick = self.simulation.physics_tick(), "World stopped");
    }

    fn physics_tick(&mut self) {
        let timer = Timer::new();
        let report = self.simulation.tick();
        self.physics_tick.store(report.tick, Ordering::Relaxed);

        if !report.inconsistencies.is_empty() || !report.faults.is_empty() {
            debug!(
                tick = report.tick,
                inconsistencies = report.inconsistencies.len(),
                faults = report.faults.len(),
                "Tick completed with skipped bodies"
            );
        }

        let elapsed = timer.elapsed();
        if elapsed > self.physics_period {
            warn!(
                tick = report.tick,
                elapsed_us = timer.elapsed_micros(),
                "Physics tick overran its period"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::dispatch::testing::RecordingDispatcher;
    use crate::game::{InputState, JoinProfile};
    use crate::ws::protocol::ServerMsg;
    use uuid::Uuid;

    fn spawn_world() -> (WorldHandle, Arc<RecordingDispatcher>, tokio::task::JoinHandle<()>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (world, handle) = GameWorld::new(&SimulationConfig::default(), dispatcher.clone());
        let task = tokio::spawn(world.run());
        (handle, dispatcher, task)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_and_broadcasts_on_their_own_cadence() {
        let (handle, dispatcher, _task) = spawn_world();
        let id = Uuid::from_u128(1);
        assert!(
            handle
                .send(WorldEvent::Join {
                    id,
                    profile: JoinProfile::default(),
                })
                .await
        );
        assert!(
            handle
                .send(WorldEvent::Input {
                    id,
                    input: InputState {
                        accelerate: true,
                        ..Default::default()
                    },
                })
                .await
        );

        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(handle.session_count(), 1);
        let ticks = handle.physics_tick();
        assert!((55..=61).contains(&ticks), "physics ticks: {}", ticks);

        // One roster push on join plus periodic snapshots every 50 ms
        let snapshots = dispatcher.snapshots();
        assert!(snapshots.len() >= 20, "snapshots: {}", snapshots.len());
        let (last_tick, players) = snapshots.last().unwrap();
        assert!(*last_tick > 0);
        assert!(players.contains_key(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn join_is_answered_with_identity() {
        let (handle, dispatcher, _task) = spawn_world();
        let id = Uuid::from_u128(5);
        handle
            .send(WorldEvent::Join {
                id,
                profile: JoinProfile::default(),
            })
            .await;

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(dispatcher
            .emitted()
            .contains(&(id, ServerMsg::IdentityAssigned { id })));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_clears_session() {
        let (handle, dispatcher, _task) = spawn_world();
        let id = Uuid::from_u128(2);
        handle
            .send(WorldEvent::Join {
                id,
                profile: JoinProfile::default(),
            })
            .await;
        handle.send(WorldEvent::Disconnect { id }).await;
        handle.send(WorldEvent::Disconnect { id }).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(handle.session_count(), 0);
        let (_, players) = dispatcher.snapshots().pop().unwrap();
        assert!(players.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn world_stops_when_handles_drop() {
        let (handle, _dispatcher, task) = spawn_world();
        drop(handle);

        tokio_test::assert_ok!(task.await);
    }
}
