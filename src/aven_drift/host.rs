// ==============================================================================
// host.rs - COLLABORATOR BOUNDARY
// ------------------------------------------------------------------------------
// The drift core never owns a rigid body. Everything it reads or writes goes
// through three seams:
//
// - VehicleHost: the physics side (velocity, orientation, per-wheel contact,
//   per-wheel friction / engine force / brake, steering, applied torque)
// - RawInput:    "is this action held right now" queries
// - StatusSink:  fire-and-forget pushes for audio + wheel-mesh sync
//
// Friction slip is read exactly once (baseline capture) and written every tick.
// ==============================================================================

use rapier3d::na::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::aven_drift::types::WheelId;

/// Physics host contract consumed by the orchestrator.
pub trait VehicleHost {
    // --- read every tick ---
    fn linear_velocity(&self) -> Vector3<f32>;
    fn orientation(&self) -> UnitQuaternion<f32>;
    fn wheel_in_contact(&self, wheel: WheelId) -> bool;
    fn wheel_angular_speed(&self, wheel: WheelId) -> f32; // rad/s
    fn wheel_radius(&self, wheel: WheelId) -> f32;        // m

    // --- read once for the baseline ---
    fn wheel_friction_slip(&self, wheel: WheelId) -> f32;

    // --- written every tick ---
    fn set_wheel_friction_slip(&mut self, wheel: WheelId, value: f32);
    fn set_wheel_engine_force(&mut self, wheel: WheelId, force: f32);
    fn set_wheel_brake(&mut self, wheel: WheelId, force: f32);
    fn set_steering(&mut self, wheel: WheelId, angle: f32);
    fn apply_torque(&mut self, torque: Vector3<f32>);

    /// World transform of a wheel, for mesh sync.
    fn wheel_transform(&self, wheel: WheelId) -> WheelTransform;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Action {
    Accelerate,
    Brake,
    SteerLeft,
    SteerRight,
    Handbrake,
}

/// Raw input collaborator.
pub trait RawInput {
    fn is_held(&self, action: Action) -> bool;
}

/// Plain held-action state, filled from network input frames.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeldActions {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub handbrake: bool,
}

impl RawInput for HeldActions {
    fn is_held(&self, action: Action) -> bool {
        match action {
            Action::Accelerate => self.accelerate,
            Action::Brake => self.brake,
            Action::SteerLeft => self.steer_left,
            Action::SteerRight => self.steer_right,
            Action::Handbrake => self.handbrake,
        }
    }
}

// ============================================
// Outgoing status
// ============================================

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineStatus {
    pub rpm: f32,
    pub max_rpm: f32,
    pub throttle: f32,
    pub is_revving: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct WheelTransform {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion (i, j, k, w)
    pub spin: f32,          // rad, accumulated rolling angle
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftEvent {
    Started,
    Ended,
}

/// Audio / visual collaborators. Every method defaults to a no-op.
pub trait StatusSink {
    fn push_engine_status(&mut self, _status: EngineStatus) {}
    fn push_wheel_transforms(&mut self, _wheels: &crate::aven_drift::Wheels<WheelTransform>) {}
    fn push_drift_event(&mut self, _event: DriftEvent) {}
}

/// Discards everything.
pub struct NullSink;

impl StatusSink for NullSink {}
