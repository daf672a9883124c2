//! Shared rigid-body world and vehicle constants

use rapier3d::prelude::*;

/// Vehicle physics constants
#[derive(Debug, Clone, Copy)]
pub struct VehicleTuning {
    /// Body mass in kg
    pub mass: Real,
    /// Collision box half extents (x = half width, y = half height, z = half length)
    pub half_extents: Vector<Real>,
    /// Linear damping coefficient
    pub linear_damping: Real,
    /// Angular damping coefficient
    pub angular_damping: Real,
    /// Contact friction of the chassis
    pub friction: Real,
    /// Forward force while accelerating (N)
    pub accelerate_force: Real,
    /// Backward force while braking (N)
    pub brake_force: Real,
    /// Yaw rate added per tick per steer flag (rad/s)
    pub steer_rate: Real,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            mass: 1500.0,
            half_extents: vector![1.0, 0.5, 2.0],
            linear_damping: 0.1,
            angular_damping: 0.5,
            friction: 0.3,
            accelerate_force: 15_000.0,
            brake_force: 9_000.0,
            steer_rate: 0.1,
        }
    }
}

/// Nose direction in body space
pub fn local_forward() -> Vector<Real> {
    vector![0.0, 0.0, -1.0]
}

/// World up axis used for steering
pub fn world_up() -> Vector<Real> {
    vector![0.0, 1.0, 0.0]
}

pub const GRAVITY_Y: Real = -9.82;
pub const SOLVER_ITERATIONS: usize = 10;
/// Half size of the square ground slab
pub const GROUND_HALF_SIZE: Real = 500.0;

/// The rapier pipeline plus every set it steps
pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

impl PhysicsWorld {
    /// World with gravity, a fixed step of `dt` seconds and a static ground slab at y = 0
    pub fn new(dt: Real) -> Self {
        let integration_parameters = IntegrationParameters {
            dt,
            max_velocity_iterations: SOLVER_ITERATIONS,
            ..IntegrationParameters::default()
        };

        let mut world = Self {
            gravity: vector![0.0, GRAVITY_Y, 0.0],
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        };

        let ground = ColliderBuilder::cuboid(GROUND_HALF_SIZE, 0.5, GROUND_HALF_SIZE)
            .translation(vector![0.0, -0.5, 0.0])
            .build();
        world.collider_set.insert(ground);

        world
    }

    /// Fixed step length in seconds
    pub fn dt(&self) -> Real {
        self.integration_parameters.dt
    }

    /// Insert a dynamic vehicle chassis
    pub fn insert_vehicle(&mut self, pose: Isometry<Real>, tuning: &VehicleTuning) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .position(pose)
            .linear_damping(tuning.linear_damping)
            .angular_damping(tuning.angular_damping)
            .build();
        let handle = self.rigid_body_set.insert(body);

        let he = tuning.half_extents;
        let chassis = ColliderBuilder::cuboid(he.x, he.y, he.z)
            .mass(tuning.mass)
            .friction(tuning.friction)
            .build();
        self.collider_set
            .insert_with_parent(chassis, handle, &mut self.rigid_body_set);

        handle
    }

    /// Remove a body and its colliders
    pub fn remove(&mut self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    #[cfg(test)]
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Advance the whole world by one fixed step
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resting_vehicle_settles_on_ground() {
        let tuning = VehicleTuning::default();
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let pose = Isometry::translation(0.0, 1.0, 0.0);
        let handle = world.insert_vehicle(pose, &tuning);

        for _ in 0..180 {
            world.step();
        }

        let y = world.body(handle).map(|b| b.translation().y).unwrap();
        assert!((y - tuning.half_extents.y).abs() < 0.05, "chassis rests at y = {}", y);
    }

    #[test]
    fn chassis_mass_is_applied() {
        let tuning = VehicleTuning::default();
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let handle = world.insert_vehicle(Isometry::translation(0.0, 1.0, 0.0), &tuning);
        world.step();

        let mass = world.body(handle).map(|b| b.mass()).unwrap();
        assert!((mass - tuning.mass).abs() < 1e-2);
    }

    #[test]
    fn remove_drops_body() {
        let mut world = PhysicsWorld::new(1.0 / 60.0);
        let handle = world.insert_vehicle(Isometry::identity(), &VehicleTuning::default());

        assert!(world.remove(handle));
        assert!(!world.remove(handle));
        assert_eq!(world.body_count(), 0);
    }
}
