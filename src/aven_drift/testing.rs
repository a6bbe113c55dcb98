//! Scripted in-memory host. Reports whatever kinematics it is given and
//! records everything written to it, which makes replay and scenario tests
//! independent of a rigid-body solver.

use rapier3d::na::{UnitQuaternion, Vector3};

use crate::aven_drift::host::{DriftEvent, EngineStatus, StatusSink, VehicleHost, WheelTransform};
use crate::aven_drift::types::{WheelId, Wheels};

pub const DEFAULT_FRICTION_SLIP: f32 = 10.5;
pub const DEFAULT_WHEEL_RADIUS: f32 = 0.35;

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedHost {
    pub velocity: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub contact: Wheels<bool>,
    pub angular_speed: Wheels<f32>,
    pub radius: Wheels<f32>,
    pub friction_slip: Wheels<f32>,
    pub engine_force: Wheels<f32>,
    pub brake: Wheels<f32>,
    pub steering: Wheels<f32>,
    /// Torque applied during the most recent tick.
    pub torque: Vector3<f32>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self {
            velocity: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            contact: Wheels { fl: true, fr: true, rl: true, rr: true },
            angular_speed: Wheels::default(),
            radius: Wheels::from_fn(|_| DEFAULT_WHEEL_RADIUS),
            friction_slip: Wheels::from_fn(|_| DEFAULT_FRICTION_SLIP),
            engine_force: Wheels::default(),
            brake: Wheels::default(),
            steering: Wheels::default(),
            torque: Vector3::zeros(),
        }
    }
}

impl ScriptedHost {
    pub fn moving(velocity: Vector3<f32>) -> Self {
        Self { velocity, ..Self::default() }
    }

    /// Velocity of `speed` m/s at `slip_deg` degrees off the -Z heading.
    pub fn sliding(speed: f32, slip_deg: f32) -> Self {
        let a = slip_deg.to_radians();
        Self::moving(Vector3::new(a.sin(), 0.0, -a.cos()) * speed)
    }

    /// Called between ticks so the torque field only shows the latest write.
    pub fn begin_tick(&mut self) {
        self.torque = Vector3::zeros();
    }
}

impl VehicleHost for ScriptedHost {
    fn linear_velocity(&self) -> Vector3<f32> { self.velocity }
    fn orientation(&self) -> UnitQuaternion<f32> { self.rotation }
    fn wheel_in_contact(&self, wheel: WheelId) -> bool { self.contact[wheel] }
    fn wheel_angular_speed(&self, wheel: WheelId) -> f32 { self.angular_speed[wheel] }
    fn wheel_radius(&self, wheel: WheelId) -> f32 { self.radius[wheel] }
    fn wheel_friction_slip(&self, wheel: WheelId) -> f32 { self.friction_slip[wheel] }

    fn set_wheel_friction_slip(&mut self, wheel: WheelId, value: f32) { self.friction_slip[wheel] = value; }
    fn set_wheel_engine_force(&mut self, wheel: WheelId, force: f32) { self.engine_force[wheel] = force; }
    fn set_wheel_brake(&mut self, wheel: WheelId, force: f32) { self.brake[wheel] = force; }
    fn set_steering(&mut self, wheel: WheelId, angle: f32) { self.steering[wheel] = angle; }
    fn apply_torque(&mut self, torque: Vector3<f32>) { self.torque += torque; }

    fn wheel_transform(&self, _wheel: WheelId) -> WheelTransform {
        WheelTransform::default()
    }
}

/// Sink that keeps everything it was sent.
#[derive(Default, Debug)]
pub struct RecordingSink {
    pub engine: Vec<EngineStatus>,
    pub wheel_pushes: usize,
    pub events: Vec<DriftEvent>,
}

impl StatusSink for RecordingSink {
    fn push_engine_status(&mut self, status: EngineStatus) {
        self.engine.push(status);
    }

    fn push_wheel_transforms(&mut self, _wheels: &Wheels<WheelTransform>) {
        self.wheel_pushes += 1;
    }

    fn push_drift_event(&mut self, event: DriftEvent) {
        self.events.push(event);
    }
}
