//! Snapshot building for network transmission

use std::collections::HashMap;

use rapier3d::prelude::{Isometry, Real};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::ws::protocol::{PlayerSnapshot, Position, Rotation, ServerMsg};

use super::dispatch::Dispatcher;
use super::session::{ConnectionId, PlayerSession, SessionRegistry};

/// Builds the reduced, externally visible view of every session
#[derive(Debug, Default)]
pub struct SnapshotBroadcaster {
    /// Snapshots emitted so far
    sent: u64,
}

impl SnapshotBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Map every session to its public fields and latest pose. Sessions
    /// without a published pose are left out.
    pub fn build(
        &self,
        sessions: &SessionRegistry,
        transforms: &HashMap<ConnectionId, Isometry<Real>>,
    ) -> HashMap<Uuid, PlayerSnapshot> {
        sessions
            .list_all()
            .filter_map(|session| match transforms.get(&session.id) {
                Some(pose) => Some((session.id, player_snapshot(session, pose))),
                None => {
                    warn!(connection_id = %session.id, "No published pose for session");
                    None
                }
            })
            .collect()
    }

    /// Build and fan out a snapshot to every connection
    pub fn broadcast<D: Dispatcher + ?Sized>(
        &mut self,
        tick: u64,
        sessions: &SessionRegistry,
        transforms: &HashMap<ConnectionId, Isometry<Real>>,
        dispatcher: &D,
    ) {
        let players = self.build(sessions, transforms);
        let count = players.len();
        dispatcher.broadcast(ServerMsg::Snapshot { tick, players });
        self.sent += 1;
        trace!(tick, players = count, sent = self.sent, "Snapshot broadcast");
    }
}

fn player_snapshot(session: &PlayerSession, pose: &Isometry<Real>) -> PlayerSnapshot {
    let t = &pose.translation.vector;
    let q = &pose.rotation.coords;
    PlayerSnapshot {
        nickname: session.nickname.clone(),
        vehicle_model: session.vehicle_model.clone(),
        color: session.color.clone(),
        position: Position {
            x: t.x,
            y: t.y,
            z: t.z,
        },
        rotation: Rotation {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        },
        gear: session.gear,
    }
}
