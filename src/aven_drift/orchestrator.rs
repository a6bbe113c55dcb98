// ==============================================================================
// orchestrator.rs - PER-TICK DRIFT PIPELINE
// ==============================================================================
// One instance per vehicle. Owns every subsystem; subsystems never see each
// other. Each step only consumes what earlier steps produced:
//
//  1) intent        <- raw held actions
//  2) car state     <- host kinematics
//  3) drift machine <- car state + throttle pressed
//  4) effective throttle (keyboard floor while drifting)
//  5) powertrain    <- wheel rpm estimate, auto-shift, requested torque
//  6) drivetrain    -> axle torque + brake split
//  7) wheel forces  -> host (handbrake cuts rear drive, locks rears)
//  8) steering      -> host (rate limited toward drift-scaled target)
//  9) grip          -> host (relative to the baseline captured at spawn)
// 10) yaw assist    -> host (drift only)
// 11) status        -> audio / wheel-mesh collaborators
//
// Nothing here can fail. Non-finite intermediates collapse to 0 force / idle
// rpm and are reported at debug level.
// ==============================================================================

use rapier3d::na::Vector3;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aven_drift::car_state::CarState;
use crate::aven_drift::drift_state::DriftStateMachine;
use crate::aven_drift::drivetrain::Drivetrain;
use crate::aven_drift::host::{DriftEvent, EngineStatus, RawInput, StatusSink, VehicleHost};
use crate::aven_drift::intent::InputIntent;
use crate::aven_drift::powertrain::{Gear, GearChange, Powertrain};
use crate::aven_drift::tuning::DriftTuning;
use crate::aven_drift::types::{move_toward, AxleSplit, WheelId, Wheels};

pub const THROTTLE_PRESSED: f32 = 0.1;

/// Friction slip as authored on the host, captured once at construction.
/// Every runtime grip value is baseline x multiplier, so multipliers never
/// compound across ticks.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct BaselineGrip {
    pub wheels: Wheels<f32>,
}

impl BaselineGrip {
    pub fn capture(host: &dyn VehicleHost) -> Self {
        let wheels = Wheels::from_fn(|w| {
            let value = host.wheel_friction_slip(w);
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                warn!(wheel = %w, value, "host reported unusable friction slip, using 1.0");
                1.0
            }
        });
        Self { wheels }
    }
}

/// What happened during one tick, for the caller's bookkeeping and tests.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub events: Vec<DriftEvent>,
    pub gear_change: Option<GearChange>,
    pub effective_throttle: f32,
    pub wheel_rpm: f32,
    pub requested_torque: f32,
    pub torque_split: AxleSplit,
    pub brake_split: AxleSplit,
    pub steer_angle: f32,
    pub yaw_torque: f32,
}

pub struct VehicleOrchestrator {
    tuning: DriftTuning,
    torque_upgrade: f32,
    intent: InputIntent,
    car: CarState,
    drift: DriftStateMachine,
    powertrain: Powertrain,
    drivetrain: Drivetrain,
    baseline: BaselineGrip,
    steer_angle: f32,
    reference_wheel: WheelId,
    queued_events: Vec<DriftEvent>,
}

impl VehicleOrchestrator {
    /// Reads the host's friction once; every later access is write-only.
    pub fn new(tuning: DriftTuning, host: &dyn VehicleHost) -> Self {
        let baseline = BaselineGrip::capture(host);
        Self {
            intent: InputIntent::default(),
            car: CarState::default(),
            drift: DriftStateMachine::new(tuning.detection, tuning.drift_rear_grip),
            powertrain: Powertrain::new(tuning.engine.clone(), tuning.engine_torque),
            drivetrain: Drivetrain::new(tuning.drive_type),
            baseline,
            steer_angle: 0.0,
            reference_wheel: WheelId::RL,
            torque_upgrade: 1.0,
            queued_events: Vec::new(),
            tuning,
        }
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    #[inline] pub fn speed_kmh(&self) -> f32 { self.car.speed_kmh }
    #[inline] pub fn is_drifting(&self) -> bool { self.drift.is_drifting() }
    #[inline] pub fn gear(&self) -> Gear { self.powertrain.gear() }
    #[inline] pub fn rpm(&self) -> f32 { self.powertrain.rpm() }
    #[inline] pub fn steer_angle(&self) -> f32 { self.steer_angle }
    #[inline] pub fn car_state(&self) -> &CarState { &self.car }
    #[inline] pub fn intent(&self) -> &InputIntent { &self.intent }
    #[inline] pub fn drift(&self) -> &DriftStateMachine { &self.drift }
    #[inline] pub fn powertrain(&self) -> &Powertrain { &self.powertrain }
    #[inline] pub fn drivetrain(&self) -> &Drivetrain { &self.drivetrain }
    #[inline] pub fn baseline(&self) -> &BaselineGrip { &self.baseline }
    #[inline] pub fn tuning(&self) -> &DriftTuning { &self.tuning }

    pub fn engine_status(&self, throttle: f32) -> EngineStatus {
        EngineStatus {
            rpm: self.powertrain.rpm(),
            max_rpm: self.powertrain.redline_rpm(),
            throttle,
            is_revving: self.powertrain.is_revving(),
        }
    }

    // ------------------------------------------------------------------
    // runtime configuration
    // ------------------------------------------------------------------

    /// Swap the whole tuning block. Callers validate first (see
    /// `DriftTuning::patched`). Upgrades applied so far are preserved.
    pub fn set_tuning(&mut self, tuning: DriftTuning) {
        self.drivetrain.set_drive_type(tuning.drive_type);
        self.drift.set_detection(tuning.detection);
        self.drift.set_drift_grip(tuning.drift_rear_grip);
        self.powertrain
            .set_tuning(tuning.engine.clone(), tuning.engine_torque * self.torque_upgrade);
        self.tuning = tuning;
    }

    /// Upgrades compound and survive later `set_tuning` calls, even while the
    /// base torque is zero.
    pub fn apply_upgrade(&mut self, multiplier: f32) {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.torque_upgrade *= multiplier;
        }
        self.powertrain.apply_upgrade(multiplier);
    }

    #[inline] pub fn torque_upgrade(&self) -> f32 { self.torque_upgrade }

    pub fn shift_up(&mut self) -> Option<GearChange> { self.powertrain.shift_up() }
    pub fn shift_down(&mut self) -> Option<GearChange> { self.powertrain.shift_down() }
    pub fn set_reverse(&mut self) -> Option<GearChange> { self.powertrain.set_reverse() }
    pub fn set_neutral(&mut self) -> Option<GearChange> { self.powertrain.set_neutral() }

    /// Hard contact reported by the host. Large hits drop out of drift
    /// without waiting for the decay window.
    pub fn notify_collision(&mut self, impulse: f32) -> Option<DriftEvent> {
        if !(impulse >= self.tuning.collision_exit_impulse) {
            return None;
        }
        let event = self.drift.force_exit();
        if let Some(e) = event {
            debug!(impulse, "collision ended drift");
            self.queued_events.push(e);
        }
        event
    }

    /// Back to a standing start. Baseline grip is kept; it belongs to the
    /// vehicle, not to the run.
    pub fn reset(&mut self) {
        self.intent.reset();
        self.powertrain.reset();
        if let Some(e) = self.drift.force_exit() {
            self.queued_events.push(e);
        }
        self.car = CarState::default();
        self.steer_angle = 0.0;
    }

    // ------------------------------------------------------------------
    // tick
    // ------------------------------------------------------------------

    pub fn tick(
        &mut self,
        dt: f32,
        raw: &dyn RawInput,
        host: &mut dyn VehicleHost,
        sink: &mut dyn StatusSink,
    ) -> TickReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut report = TickReport::default();
        report.events.append(&mut self.queued_events);

        // 1) intent
        self.intent.update(dt, raw);

        // 2) kinematics
        self.car.update(host);

        // 3) drift classification
        let throttle_pressed = self.intent.throttle > THROTTLE_PRESSED;
        if let Some(e) = self.drift.update(dt, &self.car, throttle_pressed) {
            report.events.push(e);
        }
        let drifting = self.drift.is_drifting();

        // 4) keyboard assist: binary throttle must not starve a drift
        let mut throttle = self.intent.throttle;
        if drifting && throttle < self.tuning.drift_min_throttle {
            throttle = self.tuning.drift_min_throttle;
        }
        report.effective_throttle = throttle;

        // 5) engine
        let radius = host.wheel_radius(self.reference_wheel);
        let wheel_rpm = self.powertrain.estimate_wheel_rpm(radius, self.car.speed);
        self.powertrain.update_rpm(dt, wheel_rpm, throttle);
        report.gear_change = self.powertrain.auto_shift();
        let torque = self.powertrain.compute_requested_torque(throttle, self.car.speed);
        report.wheel_rpm = wheel_rpm;
        report.requested_torque = torque;

        // 6) distribution
        let torque_split = self.drivetrain.distribute_torque(torque);
        let brake_split = self
            .drivetrain
            .distribute_brake(self.intent.brake * self.tuning.brake_force);
        report.torque_split = torque_split;
        report.brake_split = brake_split;

        // 7) forces
        self.apply_forces(host, torque_split, brake_split);

        // 8) steering
        report.steer_angle = self.apply_steering(dt, host, drifting);

        // 9) grip
        self.apply_grip(host, drifting);

        // 10) yaw assist
        report.yaw_torque = if drifting { self.apply_yaw_assist(host) } else { 0.0 };

        // 11) collaborators
        sink.push_engine_status(self.engine_status(throttle));
        sink.push_wheel_transforms(&Wheels::from_fn(|w| host.wheel_transform(w)));
        for e in &report.events {
            sink.push_drift_event(*e);
        }

        report
    }

    fn apply_forces(&self, host: &mut dyn VehicleHost, torque: AxleSplit, brake: AxleSplit) {
        let handbrake = self.intent.handbrake_active();

        let front_drive = safe(torque.front * 0.5, "front drive");
        let rear_drive = if handbrake { 0.0 } else { safe(torque.rear * 0.5, "rear drive") };
        let front_brake = safe(brake.front * 0.5, "front brake");
        let rear_brake = if handbrake {
            self.tuning.handbrake_force
        } else {
            safe(brake.rear * 0.5, "rear brake")
        };

        for w in WheelId::ALL {
            let (drive, brake) = if w.is_rear() { (rear_drive, rear_brake) } else { (front_drive, front_brake) };
            host.set_wheel_engine_force(w, drive);
            host.set_wheel_brake(w, brake);
        }
    }

    /// Linear rate limit: lock-to-lock time is the same at any tick rate.
    fn apply_steering(&mut self, dt: f32, host: &mut dyn VehicleHost, drifting: bool) -> f32 {
        let scale = if drifting { self.tuning.drift_steer_multiplier } else { 1.0 };
        let target = self.intent.steer * self.tuning.max_steer_angle * scale;
        self.steer_angle = safe(
            move_toward(self.steer_angle, target, self.tuning.steer_speed * dt),
            "steer angle",
        );

        host.set_steering(WheelId::FL, self.steer_angle);
        host.set_steering(WheelId::FR, self.steer_angle);
        self.steer_angle
    }

    fn apply_grip(&self, host: &mut dyn VehicleHost, drifting: bool) {
        let (front, rear) = if self.intent.handbrake_active() {
            (1.0, self.tuning.handbrake_rear_grip)
        } else if drifting {
            (self.tuning.drift_front_grip, self.drift.rear_grip_multiplier())
        } else {
            (1.0, 1.0)
        };

        for w in WheelId::ALL {
            let m = if w.is_rear() { rear } else { front };
            host.set_wheel_friction_slip(w, self.baseline.wheels[w] * m);
        }
    }

    /// Yaw torque about the chassis up axis that turns the heading toward the
    /// velocity, i.e. drives slip back toward zero. Returns the signed
    /// magnitude applied.
    fn apply_yaw_assist(&self, host: &mut dyn VehicleHost) -> f32 {
        let max = self.tuning.yaw_assist_max;
        let yaw = safe(self.car.slip_angle * self.tuning.yaw_assist_strength, "yaw assist").clamp(-max, max);
        if yaw != 0.0 {
            let up = host.orientation() * Vector3::y();
            host.apply_torque(up * yaw);
        }
        yaw
    }
}

#[inline]
fn safe(value: f32, what: &'static str) -> f32 {
    if value.is_finite() {
        value
    } else {
        debug!(what, "non-finite output replaced with 0");
        0.0
    }
}
