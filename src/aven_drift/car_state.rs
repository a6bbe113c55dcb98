// ==============================================================================
// car_state.rs - DERIVED KINEMATIC SNAPSHOT (READ-ONLY VIEW OF THE HOST)
// ------------------------------------------------------------------------------
// Basis convention: chassis forward is local -Z, right is +X, up is +Y.
//
//   local_velocity = R⁻¹ · v_world
//   forward_speed  = -local_velocity.z
//   lateral_speed  = |local_velocity.x|
//   slip           = atan2((heading × v̂)·up, heading·v̂)
//
// Slip is forced to 0 below 1 m/s (direction undefined) and snapped to 0 inside
// a ±4° deadzone so idle jitter never reaches the drift detector.
// ==============================================================================

use rapier3d::na::Vector3;
use serde::Serialize;

use crate::aven_drift::host::VehicleHost;
use crate::aven_drift::types::{finite_or, WheelId, Wheels};

pub const MS_TO_KMH: f32 = 3.6;
pub const SLIP_MIN_SPEED: f32 = 1.0;                      // m/s
pub const SLIP_DEADZONE: f32 = 4.0 * std::f32::consts::PI / 180.0; // rad
pub const SLIDING_LATERAL_SPEED: f32 = 0.6;               // m/s
pub const GROUNDED_MIN_WHEELS: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CarState {
    pub world_velocity: [f32; 3],
    pub local_velocity: [f32; 3],
    pub speed: f32,         // m/s
    pub speed_kmh: f32,
    pub forward_speed: f32, // m/s, signed (+ forward)
    pub lateral_speed: f32, // m/s, absolute
    pub slip_angle: f32,    // rad, signed, deadzoned
    pub is_sliding: bool,
    pub contact_count: usize,
    pub grounded: bool,
    pub wheel_spin: Wheels<f32>, // rad/s per wheel, + rolling forward
}

impl Default for CarState {
    fn default() -> Self {
        Self {
            world_velocity: [0.0; 3],
            local_velocity: [0.0; 3],
            speed: 0.0,
            speed_kmh: 0.0,
            forward_speed: 0.0,
            lateral_speed: 0.0,
            slip_angle: 0.0,
            is_sliding: false,
            contact_count: 0,
            grounded: false,
            wheel_spin: Wheels::default(),
        }
    }
}

impl CarState {
    /// Recompute every field from the host. Never writes to the host.
    pub fn update(&mut self, host: &dyn VehicleHost) {
        let velocity = host.linear_velocity();
        let velocity = if velocity.iter().all(|c| c.is_finite()) { velocity } else { Vector3::zeros() };
        let rot = host.orientation();

        let speed = velocity.norm();
        let heading = rot * Vector3::new(0.0, 0.0, -1.0);
        let up = Vector3::y();
        let local = rot.inverse() * velocity;

        let slip_angle = if speed < SLIP_MIN_SPEED {
            0.0
        } else {
            let dir = velocity / speed;
            let angle = heading.cross(&dir).dot(&up).atan2(heading.dot(&dir));
            if angle.abs() < SLIP_DEADZONE { 0.0 } else { angle }
        };

        let contact_count = WheelId::ALL
            .iter()
            .filter(|&&w| host.wheel_in_contact(w))
            .count();

        self.world_velocity = [velocity.x, velocity.y, velocity.z];
        self.local_velocity = [local.x, local.y, local.z];
        self.speed = speed;
        self.speed_kmh = speed * MS_TO_KMH;
        self.forward_speed = -local.z;
        self.lateral_speed = local.x.abs();
        self.slip_angle = slip_angle;
        self.is_sliding = self.lateral_speed > SLIDING_LATERAL_SPEED;
        self.contact_count = contact_count;
        self.grounded = contact_count >= GROUNDED_MIN_WHEELS;
        self.wheel_spin = Wheels::from_fn(|w| finite_or(host.wheel_angular_speed(w), 0.0));
    }

    #[inline]
    pub fn slip_angle_deg(&self) -> f32 {
        self.slip_angle.to_degrees()
    }

    #[inline]
    pub fn is_moving_forward(&self) -> bool {
        self.forward_speed > 0.5
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.speed < 0.5
    }

    pub fn normalized_speed(&self, max_speed: f32) -> f32 {
        if max_speed <= 0.0 {
            return 0.0;
        }
        (self.speed / max_speed).clamp(0.0, 1.0)
    }
}
