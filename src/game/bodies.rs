//! Vehicle body pool: one chassis per session inside the shared world

use std::collections::HashMap;

use rapier3d::prelude::*;

use super::error::SimError;
use super::physics::{PhysicsWorld, VehicleTuning};
use super::session::ConnectionId;

/// Readback of one body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub pose: Isometry<Real>,
    pub linvel: Vector<Real>,
    pub angvel: Vector<Real>,
}

/// Owns the physics world and the connection -> body association
pub struct VehicleBodyPool {
    world: PhysicsWorld,
    tuning: VehicleTuning,
    handles: HashMap<ConnectionId, RigidBodyHandle>,
}

impl VehicleBodyPool {
    pub fn new(dt: Real, tuning: VehicleTuning) -> Self {
        Self {
            world: PhysicsWorld::new(dt),
            tuning,
            handles: HashMap::new(),
        }
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    /// Create and register a chassis for the connection
    pub fn spawn(
        &mut self,
        id: ConnectionId,
        position: Vector<Real>,
        orientation: Rotation<Real>,
    ) -> Result<RigidBodyHandle, SimError> {
        if self.handles.contains_key(&id) {
            return Err(SimError::AlreadySpawned(id));
        }

        let pose = Isometry::from_parts(position.into(), orientation);
        let handle = self.world.insert_vehicle(pose, &self.tuning);
        self.handles.insert(id, handle);
        Ok(handle)
    }

    /// Remove the chassis from the world, then drop the association.
    /// Absent ids are a no-op.
    pub fn despawn(&mut self, id: &ConnectionId) -> bool {
        let Some(handle) = self.handles.get(id).copied() else {
            return false;
        };
        self.world.remove(handle);
        self.handles.remove(id);
        true
    }

    pub fn get(&self, id: &ConnectionId) -> Option<BodyState> {
        let body = self.body(id)?;
        Some(BodyState {
            pose: *body.position(),
            linvel: *body.linvel(),
            angvel: *body.angvel(),
        })
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.handles.contains_key(id)
    }

    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.handles.keys().copied()
    }

    pub(crate) fn body(&self, id: &ConnectionId) -> Option<&RigidBody> {
        let handle = self.handles.get(id)?;
        self.world.body(*handle)
    }

    pub(crate) fn body_mut(&mut self, id: &ConnectionId) -> Option<&mut RigidBody> {
        let handle = self.handles.get(id)?;
        self.world.body_mut(*handle)
    }

    pub(crate) fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }
}
