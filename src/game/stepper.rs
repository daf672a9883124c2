//! Fixed-timestep stepping: input -> impulses -> integrate -> readback

use std::collections::HashMap;

use rapier3d::prelude::*;
use tracing::warn;

use super::bodies::VehicleBodyPool;
use super::error::SimError;
use super::input::{InputCache, InputState};
use super::physics::{local_forward, world_up, VehicleTuning};
use super::session::{ConnectionId, SessionRegistry};

/// Linear impulse and yaw-rate change derived from one input snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlResponse {
    /// World-space impulse (force * dt)
    pub impulse: Vector<Real>,
    /// Change in angular velocity about world up (rad/s)
    pub yaw_rate_delta: Real,
}

/// Translate control flags into an impulse along the body's own axes.
/// Flags are additive: accelerate and brake together apply both forces,
/// left and right together cancel.
pub fn control_response(
    orientation: &Rotation<Real>,
    input: &InputState,
    tuning: &VehicleTuning,
    dt: Real,
) -> ControlResponse {
    let mut local_force = Vector::zeros();
    if input.accelerate {
        local_force += local_forward() * tuning.accelerate_force;
    }
    if input.brake {
        local_force -= local_forward() * tuning.brake_force;
    }

    let mut yaw_rate_delta = 0.0;
    if input.steer_left {
        yaw_rate_delta += tuning.steer_rate;
    }
    if input.steer_right {
        yaw_rate_delta -= tuning.steer_rate;
    }

    ControlResponse {
        impulse: orientation * local_force * dt,
        yaw_rate_delta,
    }
}

/// What happened during one physics tick
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub tick: u64,
    /// Bodies that received input and were integrated
    pub stepped: usize,
    /// Sessions skipped because their body was missing
    pub inconsistencies: Vec<SimError>,
    /// Bodies whose non-finite state was reset
    pub faults: Vec<SimError>,
}

/// Advances the shared world at a fixed dt and keeps the latest pose per session
pub struct PhysicsStepper {
    tick: u64,
    transforms: HashMap<ConnectionId, Isometry<Real>>,
}

impl PhysicsStepper {
    pub fn new() -> Self {
        Self {
            tick: 0,
            transforms: HashMap::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Latest published pose per session
    pub fn transforms(&self) -> &HashMap<ConnectionId, Isometry<Real>> {
        &self.transforms
    }

    /// Publish a pose outside of a step (spawn)
    pub fn publish(&mut self, id: ConnectionId, pose: Isometry<Real>) {
        self.transforms.insert(id, pose);
    }

    pub fn forget(&mut self, id: &ConnectionId) {
        self.transforms.remove(id);
    }

    /// Run one fixed step over every live session
    pub fn step(
        &mut self,
        sessions: &SessionRegistry,
        inputs: &InputCache,
        pool: &mut VehicleBodyPool,
    ) -> StepReport {
        self.tick += 1;
        let mut report = StepReport {
            tick: self.tick,
            ..Default::default()
        };

        let tuning = *pool.tuning();
        let dt = pool.world().dt();

        let mut live = Vec::with_capacity(sessions.len());
        for id in sessions.ids() {
            if !pool.contains(&id) {
                warn!(connection_id = %id, tick = self.tick, "Session has no vehicle body, skipping");
                report.inconsistencies.push(SimError::StateInconsistency(id));
                continue;
            }

            if let Some(fault) = self.sanitize(&id, pool) {
                report.faults.push(fault);
            }

            let input = inputs.get(&id);
            if let Some(body) = pool.body_mut(&id) {
                let response = control_response(body.rotation(), &input, &tuning, dt);
                if response.impulse != Vector::zeros() {
                    body.apply_impulse(response.impulse, true);
                }
                if response.yaw_rate_delta != 0.0 {
                    let angvel = body.angvel() + world_up() * response.yaw_rate_delta;
                    body.set_angvel(angvel, true);
                }
            }
            live.push(id);
        }

        pool.world_mut().step();

        for id in live {
            if let Some(fault) = self.sanitize(&id, pool) {
                report.faults.push(fault);
            }
            if let Some(body) = pool.body(&id) {
                self.transforms.insert(id, *body.position());
                report.stepped += 1;
            }
        }

        report
    }

    /// Zero the motion of a body with non-finite state. A non-finite pose is
    /// replaced by the last published one.
    fn sanitize(&self, id: &ConnectionId, pool: &mut VehicleBodyPool) -> Option<SimError> {
        let last_pose = self.transforms.get(id).copied();
        let body = pool.body_mut(id)?;

        let pose_ok = is_finite_pose(body.position());
        let motion_ok = is_finite(body.linvel()) && is_finite(body.angvel());
        if pose_ok && motion_ok {
            return None;
        }

        body.set_linvel(Vector::zeros(), true);
        body.set_angvel(Vector::zeros(), true);
        let what = if pose_ok {
            "velocity"
        } else {
            body.set_position(last_pose.unwrap_or_else(Isometry::identity), true);
            "pose"
        };

        warn!(connection_id = %id, tick = self.tick, what, "Non-finite body state, motion reset");
        Some(SimError::SimulationFault { id: *id, what })
    }
}

impl Default for PhysicsStepper {
    fn default() -> Self {
        Self::new()
    }
}

fn is_finite(v: &Vector<Real>) -> bool {
    v.iter().all(|c| c.is_finite())
}

fn is_finite_pose(pose: &Isometry<Real>) -> bool {
    is_finite(&pose.translation.vector) && pose.rotation.coords.iter().all(|c| c.is_finite())
}
