// ==============================================================================
// vehicle.rs - RAPIER RAY-CAST VEHICLE AS THE DRIFT HOST
// ------------------------------------------------------------------------------
// One Vehicle = chassis rigid body + DynamicRayCastVehicleController (4 wheels,
// added in FL, FR, RL, RR order) + the drift orchestrator that drives it.
//
// Conventions bridged here:
// - chassis forward is local -Z (wheel axle +X, suspension -Y => controller
//   forward = up × axle = -Z)
// - core steer is +right; rapier steering is +left (rotation about +Y)
// - core brake is a force; rapier brake is an impulse cap per step
// ==============================================================================

use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::na::{UnitQuaternion, Vector3};
use rapier3d::prelude::*;

use crate::aven_drift::{
    DriftEvent, EngineStatus, HeldActions, StatusSink, VehicleHost, VehicleOrchestrator,
    WheelId, WheelTransform, Wheels,
};

pub struct VehicleConfig {
    pub mass: f32,                          // kg
    pub linear_damping: f32,                // drag
    pub angular_damping: f32,               // rotational drag
    pub chassis_half_extents: [f32; 3],     // [hx, hy, hz] meters
    pub chassis_com_offset: [f32; 3],       // local offset from collider center

    // --- Wheels ---
    pub wheelbase: f32,                     // meters (front axle to rear axle)
    pub track_width: f32,                   // meters (left to right)
    pub wheel_mount_height: f32,            // meters below chassis center
    pub wheel_radius: f32,                  // meters
    pub suspension_rest_length: f32,        // meters
    pub suspension_stiffness: f32,
    pub suspension_compression: f32,
    pub suspension_damping: f32,
    pub max_suspension_travel: f32,         // meters
    pub max_suspension_force: f32,          // N
    pub friction_slip: f32,                 // authored tire grip (baseline)
    pub side_friction_stiffness: f32,
}

pub const GT86: VehicleConfig = VehicleConfig {
    mass: 1350.0,
    linear_damping: 0.08,
    angular_damping: 0.6,
    chassis_half_extents: [0.9, 0.35, 2.1],
    chassis_com_offset: [0.0, -0.15, 0.0],

    wheelbase: 2.5,
    track_width: 1.5,
    wheel_mount_height: 0.2,
    wheel_radius: 0.35,
    suspension_rest_length: 0.35,
    suspension_stiffness: 30.0,
    suspension_compression: 4.4,
    suspension_damping: 2.3,
    max_suspension_travel: 0.3,
    max_suspension_force: 15_000.0,
    friction_slip: 10.5,
    side_friction_stiffness: 1.0,
};

#[inline]
pub fn wheel_index(id: WheelId) -> usize {
    match id {
        WheelId::FL => 0,
        WheelId::FR => 1,
        WheelId::RL => 2,
        WheelId::RR => 3,
    }
}

/// Chassis-local mount point for a wheel.
pub fn wheel_mount(config: &VehicleConfig, id: WheelId) -> Point<Real> {
    let x = if matches!(id, WheelId::FL | WheelId::RL) { -config.track_width * 0.5 } else { config.track_width * 0.5 };
    let z = if id.is_front() { -config.wheelbase * 0.5 } else { config.wheelbase * 0.5 };
    point![x, -config.wheel_mount_height, z]
}

pub fn build_controller(chassis: RigidBodyHandle, config: &VehicleConfig) -> DynamicRayCastVehicleController {
    let mut controller = DynamicRayCastVehicleController::new(chassis);
    controller.index_up_axis = 1;
    controller.index_forward_axis = 2; // only used for rapier's own speed sign + spin

    let tuning = WheelTuning {
        suspension_stiffness: config.suspension_stiffness,
        suspension_compression: config.suspension_compression,
        suspension_damping: config.suspension_damping,
        max_suspension_travel: config.max_suspension_travel,
        side_friction_stiffness: config.side_friction_stiffness,
        friction_slip: config.friction_slip,
        max_suspension_force: config.max_suspension_force,
    };

    for id in WheelId::ALL {
        controller.add_wheel(
            wheel_mount(config, id),
            -Vector::y(),
            Vector::x(),
            config.suspension_rest_length,
            config.wheel_radius,
            &tuning,
        );
    }
    controller
}

// ============================================
// Status sink (what the snapshot publishes)
// ============================================

#[derive(Clone, Debug, Default)]
pub struct VehicleStatus {
    pub engine: EngineStatus,
    pub wheels: Wheels<WheelTransform>,
    pub events: Vec<DriftEvent>,
}

impl StatusSink for VehicleStatus {
    fn push_engine_status(&mut self, status: EngineStatus) {
        self.engine = status;
    }

    fn push_wheel_transforms(&mut self, wheels: &Wheels<WheelTransform>) {
        self.wheels = *wheels;
    }

    fn push_drift_event(&mut self, event: DriftEvent) {
        self.events.push(event);
    }
}

// ============================================
// Vehicle
// ============================================

pub struct Vehicle {
    pub body: RigidBodyHandle,              // the chassis body
    pub controller: DynamicRayCastVehicleController,
    pub drift: VehicleOrchestrator,
    pub input: HeldActions,                 // latest held actions from the client
    pub status: VehicleStatus,              // refreshed every tick
    pub spawn_point: [f32; 3],
    pub wheel_speed: Wheels<f32>,           // rad/s, measured after each step
    wheel_spin_prev: Wheels<f32>,
}

impl Vehicle {
    pub fn new(
        body: RigidBodyHandle,
        controller: DynamicRayCastVehicleController,
        drift: VehicleOrchestrator,
        spawn_point: [f32; 3],
    ) -> Self {
        Self {
            body,
            controller,
            drift,
            input: HeldActions::default(),
            status: VehicleStatus::default(),
            spawn_point,
            wheel_speed: Wheels::default(),
            wheel_spin_prev: Wheels::default(),
        }
    }

    /// Derive wheel angular speed from rapier's accumulated spin angle.
    pub fn measure_wheel_speed(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let wheels = self.controller.wheels();
        for id in WheelId::ALL {
            // rapier spins positive along +Z; our forward is -Z
            let spin = -wheels[wheel_index(id)].rotation;
            self.wheel_speed[id] = (spin - self.wheel_spin_prev[id]) / dt;
            self.wheel_spin_prev[id] = spin;
        }
    }

    pub fn reset_wheel_spin(&mut self) {
        self.wheel_speed = Wheels::default();
        self.wheel_spin_prev = Wheels::from_fn(|id| -self.controller.wheels()[wheel_index(id)].rotation);
    }
}

/// Borrowed view that lets the orchestrator drive one rapier vehicle.
pub struct RapierHost<'a> {
    pub body: &'a mut RigidBody,
    pub controller: &'a mut DynamicRayCastVehicleController,
    pub wheel_speed: &'a Wheels<f32>,
    pub dt: f32,
}

impl RapierHost<'_> {
    fn wake_if(&mut self, active: bool) {
        if active && self.body.is_sleeping() {
            self.body.wake_up(true);
        }
    }
}

impl VehicleHost for RapierHost<'_> {
    fn linear_velocity(&self) -> Vector3<f32> {
        // a sleeping body keeps whatever impulses piled up on it
        if self.body.is_sleeping() {
            return Vector3::zeros();
        }
        *self.body.linvel()
    }

    fn orientation(&self) -> UnitQuaternion<f32> {
        *self.body.rotation()
    }

    fn wheel_in_contact(&self, wheel: WheelId) -> bool {
        self.controller.wheels()[wheel_index(wheel)].raycast_info().is_in_contact
    }

    fn wheel_angular_speed(&self, wheel: WheelId) -> f32 {
        self.wheel_speed[wheel]
    }

    fn wheel_radius(&self, wheel: WheelId) -> f32 {
        self.controller.wheels()[wheel_index(wheel)].radius
    }

    fn wheel_friction_slip(&self, wheel: WheelId) -> f32 {
        self.controller.wheels()[wheel_index(wheel)].friction_slip
    }

    fn set_wheel_friction_slip(&mut self, wheel: WheelId, value: f32) {
        self.controller.wheels_mut()[wheel_index(wheel)].friction_slip = value;
    }

    fn set_wheel_engine_force(&mut self, wheel: WheelId, force: f32) {
        // rapier only wakes the chassis for positive engine force
        self.wake_if(force != 0.0);
        self.controller.wheels_mut()[wheel_index(wheel)].engine_force = force;
    }

    fn set_wheel_brake(&mut self, wheel: WheelId, force: f32) {
        self.wake_if(force != 0.0);
        self.controller.wheels_mut()[wheel_index(wheel)].brake = force * self.dt;
    }

    fn set_steering(&mut self, wheel: WheelId, angle: f32) {
        self.wake_if(angle != 0.0);
        self.controller.wheels_mut()[wheel_index(wheel)].steering = -angle;
    }

    fn apply_torque(&mut self, torque: Vector3<f32>) {
        self.body.apply_torque_impulse(torque * self.dt, true);
    }

    fn wheel_transform(&self, wheel: WheelId) -> WheelTransform {
        let w = &self.controller.wheels()[wheel_index(wheel)];
        let center = w.center();
        let spin = -w.rotation;
        let steer = UnitQuaternion::from_axis_angle(&Vector::y_axis(), w.steering);
        let roll = UnitQuaternion::from_axis_angle(&Vector::x_axis(), spin);
        let q = *self.body.rotation() * steer * roll;
        WheelTransform {
            position: [center.x, center.y, center.z],
            rotation: [q.i, q.j, q.k, q.w],
            spin,
        }
    }
}
