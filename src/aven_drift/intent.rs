// ==============================================================================
// intent.rs - RAW HELD ACTIONS -> BOUNDED DRIVER INTENT
// ------------------------------------------------------------------------------
// throttle / brake ramp toward 0 or 1 with separate rise and fall rates.
// Throttle releases slower than it engages so keyboard players can feather a
// drift. Steer snaps to -1/0/1; smoothing happens later in the orchestrator
// where drift-aware multipliers are known.
// ==============================================================================

use serde::Serialize;

use crate::aven_drift::host::{Action, RawInput};
use crate::aven_drift::types::move_toward;

pub const THROTTLE_RISE: f32 = 20.0; // 1/s
pub const THROTTLE_FALL: f32 = 6.0;  // 1/s
pub const BRAKE_RISE: f32 = 25.0;    // 1/s
pub const BRAKE_FALL: f32 = 15.0;    // 1/s

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct InputIntent {
    pub throttle: f32,  // 0..1
    pub brake: f32,     // 0..1
    pub steer: f32,     // -1 (left) .. 1 (right)
    pub handbrake: f32, // 0 or 1
}

impl InputIntent {
    pub fn update(&mut self, dt: f32, raw: &dyn RawInput) {
        let dt = dt.max(0.0);

        let throttle_target = if raw.is_held(Action::Accelerate) { 1.0 } else { 0.0 };
        let throttle_rate = if throttle_target > self.throttle { THROTTLE_RISE } else { THROTTLE_FALL };
        self.throttle = move_toward(self.throttle, throttle_target, throttle_rate * dt);

        let brake_target = if raw.is_held(Action::Brake) { 1.0 } else { 0.0 };
        let brake_rate = if brake_target > self.brake { BRAKE_RISE } else { BRAKE_FALL };
        self.brake = move_toward(self.brake, brake_target, brake_rate * dt);

        let mut steer = 0.0;
        if raw.is_held(Action::SteerLeft) { steer -= 1.0; }
        if raw.is_held(Action::SteerRight) { steer += 1.0; }
        self.steer = steer;

        self.handbrake = if raw.is_held(Action::Handbrake) { 1.0 } else { 0.0 };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn handbrake_active(&self) -> bool {
        self.handbrake > 0.5
    }
}
