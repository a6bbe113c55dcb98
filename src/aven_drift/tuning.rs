// ==============================================================================
// tuning.rs - PUBLIC TUNING SURFACE + PRESETS
// ------------------------------------------------------------------------------
// Everything a designer may change at construction or at runtime. All values
// are plain data; the orchestrator re-reads them each tick, so a drive-type
// change lands on the next torque distribution.
//
// Patches arrive from clients as partial JSON (`TuningPatch`). A patch is
// applied to a copy, validated, and only then swapped in.
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aven_drift::types::DriveType;

#[derive(Debug, Error, PartialEq)]
pub enum TuningError {
    #[error("`{field}` must be finite, got {value}")]
    NotFinite { field: &'static str, value: f32 },

    #[error("`{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    #[error("`{field}` must be within [{min}, {max}], got {value}")]
    OutOfRange { field: &'static str, value: f32, min: f32, max: f32 },

    #[error("gear table needs a reverse ratio and at least one forward gear (got {0} entries)")]
    GearTable(usize),

    #[error("drift exit time ({exit}) must not be shorter than enter time ({enter})")]
    ExitBeforeEnter { enter: f32, exit: f32 },

    #[error("redline ({redline}) must be above idle ({idle})")]
    RedlineBelowIdle { idle: f32, redline: f32 },

    #[error("unknown drive type `{0}`")]
    UnknownDriveType(String),
}

// ============================================
// Torque model
// ============================================

/// How requested torque is derived from throttle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TorqueModel {
    /// Throttle x base torque with a low-speed launch boost that fades out by
    /// `boost_fade_kmh`. No gear math.
    Arcade {
        launch_boost: f32,   // multiplier at 0 km/h
        boost_fade_kmh: f32, // boost reaches 1.0 here
    },
    /// Torque curve x gear ratio x final drive.
    Simulation {
        efficiency: f32, // driveline losses, 0..1
    },
}

impl Default for TorqueModel {
    fn default() -> Self {
        TorqueModel::Arcade { launch_boost: 2.0, boost_fade_kmh: 80.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    pub idle_rpm: f32,
    pub redline_rpm: f32,
    pub peak_torque_rpm: f32,
    pub curve_width_rpm: f32,
    /// Index 0 is reverse (negative), 1..N are forward gears.
    pub gear_ratios: Vec<f32>,
    pub final_drive: f32,
    pub model: TorqueModel,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            idle_rpm: 900.0,
            redline_rpm: 7500.0,
            peak_torque_rpm: 5200.0,
            curve_width_rpm: 3500.0,
            gear_ratios: vec![-3.4, 3.6, 2.2, 1.55, 1.2, 1.0, 0.82],
            final_drive: 4.1,
            model: TorqueModel::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftDetection {
    pub min_speed: f32,         // m/s
    pub min_slip_angle: f32,    // degrees
    pub min_lateral_speed: f32, // m/s
    pub enter_time: f32,        // s of sustained intent before DRIFT
    pub exit_time: f32,         // s of absent intent before GRIP (accumulator cap)
}

impl Default for DriftDetection {
    fn default() -> Self {
        Self {
            min_speed: 7.0,
            min_slip_angle: 8.0,
            min_lateral_speed: 0.6,
            enter_time: 0.15,
            exit_time: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftTuning {
    pub engine_torque: f32,          // N at the wheels (arcade) / N·m at the crank (simulation)
    pub brake_force: f32,            // N, total across all wheels
    pub handbrake_force: f32,        // N, per rear wheel
    pub max_steer_angle: f32,        // rad
    pub steer_speed: f32,            // rad/s
    pub drift_rear_grip: f32,        // x baseline while drifting
    pub drift_front_grip: f32,       // x baseline while drifting
    pub handbrake_rear_grip: f32,    // x baseline while handbrake held
    pub drift_steer_multiplier: f32, // steering lock scale while drifting
    pub drift_min_throttle: f32,     // keyboard assist floor while drifting
    pub drive_type: DriveType,
    pub yaw_assist_strength: f32,    // N·m per rad of slip
    pub yaw_assist_max: f32,         // N·m
    pub collision_exit_impulse: f32, // N·s, force-exit drift above this
    pub detection: DriftDetection,
    pub engine: EngineTuning,
}

impl Default for DriftTuning {
    fn default() -> Self {
        Self::gt86()
    }
}

impl DriftTuning {
    /// Light RWD coupe.
    pub fn gt86() -> Self {
        Self {
            engine_torque: 3200.0,
            brake_force: 8000.0,
            handbrake_force: 6000.0,
            max_steer_angle: 0.6,
            steer_speed: 2.5,
            drift_rear_grip: 0.9,
            drift_front_grip: 0.95,
            handbrake_rear_grip: 0.5,
            drift_steer_multiplier: 1.3,
            drift_min_throttle: 0.3,
            drive_type: DriveType::Rwd,
            yaw_assist_strength: 1800.0,
            yaw_assist_max: 2500.0,
            collision_exit_impulse: 4000.0,
            detection: DriftDetection::default(),
            engine: EngineTuning::default(),
        }
    }

    /// Heavier AWD car with a front-biased split; harder to break loose.
    pub fn awd_rally() -> Self {
        Self {
            engine_torque: 3800.0,
            brake_force: 9500.0,
            drift_rear_grip: 0.85,
            drift_front_grip: 0.9,
            drive_type: DriveType::Awd { front_bias: 0.4 },
            yaw_assist_strength: 2200.0,
            yaw_assist_max: 3000.0,
            ..Self::gt86()
        }
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        let scalars: [(&'static str, f32); 13] = [
            ("engine_torque", self.engine_torque),
            ("brake_force", self.brake_force),
            ("handbrake_force", self.handbrake_force),
            ("max_steer_angle", self.max_steer_angle),
            ("steer_speed", self.steer_speed),
            ("drift_rear_grip", self.drift_rear_grip),
            ("drift_front_grip", self.drift_front_grip),
            ("handbrake_rear_grip", self.handbrake_rear_grip),
            ("drift_steer_multiplier", self.drift_steer_multiplier),
            ("drift_min_throttle", self.drift_min_throttle),
            ("yaw_assist_strength", self.yaw_assist_strength),
            ("yaw_assist_max", self.yaw_assist_max),
            ("collision_exit_impulse", self.collision_exit_impulse),
        ];
        for (field, value) in scalars {
            if !value.is_finite() {
                return Err(TuningError::NotFinite { field, value });
            }
            if value < 0.0 {
                return Err(TuningError::OutOfRange { field, value, min: 0.0, max: f32::MAX });
            }
        }

        positive("max_steer_angle", self.max_steer_angle)?;
        positive("steer_speed", self.steer_speed)?;
        unit("drift_min_throttle", self.drift_min_throttle)?;
        unit("handbrake_rear_grip", self.handbrake_rear_grip)?;

        if let DriveType::Awd { front_bias } = self.drive_type {
            if !front_bias.is_finite() {
                return Err(TuningError::NotFinite { field: "awd_front_bias", value: front_bias });
            }
            unit("awd_front_bias", front_bias)?;
        }

        let d = &self.detection;
        positive("detection.enter_time", d.enter_time)?;
        positive("detection.exit_time", d.exit_time)?;
        if d.exit_time < d.enter_time {
            return Err(TuningError::ExitBeforeEnter { enter: d.enter_time, exit: d.exit_time });
        }
        for (field, value) in [
            ("detection.min_speed", d.min_speed),
            ("detection.min_slip_angle", d.min_slip_angle),
            ("detection.min_lateral_speed", d.min_lateral_speed),
        ] {
            if !value.is_finite() {
                return Err(TuningError::NotFinite { field, value });
            }
        }

        let e = &self.engine;
        positive("engine.idle_rpm", e.idle_rpm)?;
        if !(e.redline_rpm > e.idle_rpm) {
            return Err(TuningError::RedlineBelowIdle { idle: e.idle_rpm, redline: e.redline_rpm });
        }
        positive("engine.final_drive", e.final_drive)?;
        positive("engine.curve_width_rpm", e.curve_width_rpm)?;
        if e.gear_ratios.len() < 2 {
            return Err(TuningError::GearTable(e.gear_ratios.len()));
        }
        if let Some(bad) = e.gear_ratios.iter().copied().find(|r| !r.is_finite()) {
            return Err(TuningError::NotFinite { field: "engine.gear_ratios", value: bad });
        }
        match e.model {
            TorqueModel::Arcade { launch_boost, boost_fade_kmh } => {
                positive("engine.model.launch_boost", launch_boost)?;
                positive("engine.model.boost_fade_kmh", boost_fade_kmh)?;
            }
            TorqueModel::Simulation { efficiency } => {
                unit("engine.model.efficiency", efficiency)?;
            }
        }

        Ok(())
    }

    /// Apply a partial update on a copy and return it if the result is valid.
    pub fn patched(&self, patch: &TuningPatch) -> Result<Self, TuningError> {
        let mut next = self.clone();
        patch.apply_to(&mut next)?;
        next.validate()?;
        Ok(next)
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), TuningError> {
    if !value.is_finite() {
        return Err(TuningError::NotFinite { field, value });
    }
    if value <= 0.0 {
        return Err(TuningError::NotPositive { field, value });
    }
    Ok(())
}

fn unit(field: &'static str, value: f32) -> Result<(), TuningError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TuningError::OutOfRange { field, value, min: 0.0, max: 1.0 });
    }
    Ok(())
}

// ============================================
// Partial updates (wire-facing)
// ============================================

/// Every field optional; missing fields keep their current value.
/// `drive_type` is a name ("rwd" / "fwd" / "awd") so unknown layouts can be
/// rejected instead of silently mapped.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TuningPatch {
    pub engine_torque: Option<f32>,
    pub brake_force: Option<f32>,
    pub handbrake_force: Option<f32>,
    pub max_steer_angle: Option<f32>,
    pub steer_speed: Option<f32>,
    pub drift_rear_grip: Option<f32>,
    pub drift_front_grip: Option<f32>,
    pub drift_steer_multiplier: Option<f32>,
    pub drift_min_throttle: Option<f32>,
    pub drive_type: Option<String>,
    pub awd_front_bias: Option<f32>,
    pub yaw_assist_strength: Option<f32>,
    pub yaw_assist_max: Option<f32>,
    pub detection: Option<DriftDetection>,
    pub torque_model: Option<TorqueModel>,
}

impl TuningPatch {
    fn apply_to(&self, t: &mut DriftTuning) -> Result<(), TuningError> {
        macro_rules! set {
            ($($field:ident),*) => {
                $( if let Some(v) = self.$field { t.$field = v; } )*
            };
        }
        set!(
            engine_torque,
            brake_force,
            handbrake_force,
            max_steer_angle,
            steer_speed,
            drift_rear_grip,
            drift_front_grip,
            drift_steer_multiplier,
            drift_min_throttle,
            yaw_assist_strength,
            yaw_assist_max
        );

        if let Some(d) = self.detection { t.detection = d; }
        if let Some(m) = self.torque_model { t.engine.model = m; }

        let current_bias = match t.drive_type {
            DriveType::Awd { front_bias } => front_bias,
            _ => 0.5,
        };
        let bias = self.awd_front_bias.unwrap_or(current_bias);

        match &self.drive_type {
            Some(name) => {
                t.drive_type = DriveType::parse(name, bias)
                    .ok_or_else(|| TuningError::UnknownDriveType(name.clone()))?;
            }
            None => {
                if let DriveType::Awd { front_bias } = &mut t.drive_type {
                    *front_bias = bias;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert_eq!(DriftTuning::gt86().validate(), Ok(()));
        assert_eq!(DriftTuning::awd_rally().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        let mut t = DriftTuning::gt86();
        t.steer_speed = f32::NAN;
        assert!(matches!(t.validate(), Err(TuningError::NotFinite { field: "steer_speed", .. })));

        let mut t = DriftTuning::gt86();
        t.engine.gear_ratios = vec![-3.0];
        assert_eq!(t.validate(), Err(TuningError::GearTable(1)));

        let mut t = DriftTuning::gt86();
        t.detection.exit_time = 0.1;
        assert!(matches!(t.validate(), Err(TuningError::ExitBeforeEnter { .. })));

        let mut t = DriftTuning::gt86();
        t.drive_type = DriveType::Awd { front_bias: 1.5 };
        assert!(matches!(t.validate(), Err(TuningError::OutOfRange { field: "awd_front_bias", .. })));
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let base = DriftTuning::gt86();
        let patch: TuningPatch =
            serde_json::from_str(r#"{"drift_rear_grip":0.8,"drive_type":"awd","awd_front_bias":0.35}"#)
                .unwrap();
        let next = base.patched(&patch).unwrap();
        assert_eq!(next.drift_rear_grip, 0.8);
        assert_eq!(next.drive_type, DriveType::Awd { front_bias: 0.35 });
        assert_eq!(next.engine_torque, base.engine_torque);
    }

    #[test]
    fn unknown_drive_type_patch_is_rejected() {
        let base = DriftTuning::gt86();
        let patch = TuningPatch { drive_type: Some("tracks".into()), ..Default::default() };
        assert_eq!(
            base.patched(&patch),
            Err(TuningError::UnknownDriveType("tracks".into()))
        );
    }

    #[test]
    fn tuning_round_trips_through_json() {
        let t = DriftTuning::awd_rally();
        let json = serde_json::to_string(&t).unwrap();
        let back: DriftTuning = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
