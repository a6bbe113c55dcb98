// ==============================================================================
// drift_state.rs - DEBOUNCED GRIP / DRIFT CLASSIFIER
// ------------------------------------------------------------------------------
// Intent (per tick):
//   speed >= min_speed  AND  |slip| >= min_slip_angle
//   AND lateral >= min_lateral_speed  AND  throttle pressed
//
// Confidence accumulator c ∈ [0, exit_time]:
//   c += dt on intent, c -= dt otherwise, clamped every tick in both phases.
//
//   GRIP  --(c >= enter_time)--> DRIFT    rear grip = drift value, emit Started
//   DRIFT --(c <= 0)-----------> GRIP     rear grip = 1.0,         emit Ended
//
// A false tick decrements, it never resets. force_exit() is the one path that
// skips the debounce (collisions, respawn).
// ==============================================================================

use serde::Serialize;
use tracing::debug;

use crate::aven_drift::car_state::CarState;
use crate::aven_drift::host::DriftEvent;
use crate::aven_drift::tuning::DriftDetection;

/// Relative slack when comparing accumulated dt against the enter threshold.
/// 9 x (1/60) in f32 lands a hair under 0.15; this keeps the tick count at
/// ceil(enter_time / dt).
const ENTER_EPSILON: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPhase {
    Grip,
    Drift,
}

pub struct DriftStateMachine {
    detection: DriftDetection,
    drift_grip: f32,
    phase: DriftPhase,
    confidence: f32,
    rear_grip_multiplier: f32,
}

impl DriftStateMachine {
    pub fn new(detection: DriftDetection, drift_grip: f32) -> Self {
        Self {
            detection,
            drift_grip,
            phase: DriftPhase::Grip,
            confidence: 0.0,
            rear_grip_multiplier: 1.0,
        }
    }

    #[inline] pub fn phase(&self) -> DriftPhase { self.phase }
    #[inline] pub fn is_drifting(&self) -> bool { self.phase == DriftPhase::Drift }
    #[inline] pub fn confidence(&self) -> f32 { self.confidence }
    #[inline] pub fn rear_grip_multiplier(&self) -> f32 { self.rear_grip_multiplier }
    #[inline] pub fn detection(&self) -> &DriftDetection { &self.detection }

    pub fn set_detection(&mut self, detection: DriftDetection) {
        self.detection = detection;
        self.confidence = self.confidence.clamp(0.0, detection.exit_time.max(0.0));
    }

    /// Takes effect immediately if already drifting.
    pub fn set_drift_grip(&mut self, drift_grip: f32) {
        self.drift_grip = drift_grip;
        if self.is_drifting() {
            self.rear_grip_multiplier = drift_grip;
        }
    }

    /// Whether this tick's kinematics + throttle count as wanting to drift.
    pub fn has_intent(&self, car: &CarState, throttle_pressed: bool) -> bool {
        let d = &self.detection;
        throttle_pressed
            && car.speed >= d.min_speed
            && car.slip_angle_deg().abs() >= d.min_slip_angle
            && car.lateral_speed >= d.min_lateral_speed
    }

    pub fn update(&mut self, dt: f32, car: &CarState, throttle_pressed: bool) -> Option<DriftEvent> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let exit_time = self.detection.exit_time.max(0.0);

        let step = if self.has_intent(car, throttle_pressed) { dt } else { -dt };
        self.confidence = (self.confidence + step).clamp(0.0, exit_time);

        match self.phase {
            DriftPhase::Grip => {
                let enter = self.detection.enter_time * (1.0 - ENTER_EPSILON);
                if self.confidence >= enter && self.confidence > 0.0 {
                    self.phase = DriftPhase::Drift;
                    self.rear_grip_multiplier = self.drift_grip;
                    debug!(confidence = self.confidence, slip_deg = car.slip_angle_deg(), "drift started");
                    return Some(DriftEvent::Started);
                }
            }
            DriftPhase::Drift => {
                if self.confidence <= 0.0 {
                    self.phase = DriftPhase::Grip;
                    self.rear_grip_multiplier = 1.0;
                    debug!(speed = car.speed, "drift ended");
                    return Some(DriftEvent::Ended);
                }
            }
        }
        None
    }

    /// Drop straight to GRIP. Emits `Ended` only if a drift was in progress.
    pub fn force_exit(&mut self) -> Option<DriftEvent> {
        let was_drifting = self.is_drifting();
        self.phase = DriftPhase::Grip;
        self.confidence = 0.0;
        self.rear_grip_multiplier = 1.0;
        if was_drifting {
            debug!("drift force-exited");
            Some(DriftEvent::Ended)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn sliding_car() -> CarState {
        CarState {
            speed: 10.0,
            slip_angle: 12f32.to_radians(),
            lateral_speed: 1.0,
            ..CarState::default()
        }
    }

    fn machine() -> DriftStateMachine {
        DriftStateMachine::new(DriftDetection::default(), 0.9)
    }

    #[test]
    fn enters_on_ceil_enter_over_dt() {
        let mut m = machine();
        let car = sliding_car();
        let mut entered_on = None;
        for tick in 1..=20 {
            if m.update(DT, &car, true) == Some(DriftEvent::Started) {
                entered_on = Some(tick);
                break;
            }
        }
        assert_eq!(entered_on, Some(9));
    }

    #[test]
    fn tick_count_holds_for_other_rates() {
        for (dt, expected) in [(1.0 / 120.0, 18), (1.0 / 240.0, 36), (0.04, 4)] {
            let mut m = machine();
            let car = sliding_car();
            let mut ticks = 0;
            while !m.is_drifting() {
                m.update(dt, &car, true);
                ticks += 1;
                assert!(ticks < 1000);
            }
            assert_eq!(ticks, expected, "dt = {dt}");
        }
    }

    #[test]
    fn intent_requires_every_condition() {
        let m = machine();
        let car = sliding_car();
        assert!(m.has_intent(&car, true));
        assert!(!m.has_intent(&car, false));
        assert!(!m.has_intent(&CarState { speed: 6.9, ..car.clone() }, true));
        assert!(!m.has_intent(&CarState { slip_angle: 7f32.to_radians(), ..car.clone() }, true));
        assert!(!m.has_intent(&CarState { slip_angle: -12f32.to_radians(), lateral_speed: 0.5, ..car.clone() }, true));
        assert!(m.has_intent(&CarState { slip_angle: -12f32.to_radians(), ..car }, true));
    }

    #[test]
    fn confidence_never_leaves_its_range() {
        let mut m = machine();
        let car = sliding_car();
        let idle = CarState::default();
        // deterministic pseudo-random pattern of intent and dt
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..5000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let dt = 0.001 + (seed % 100) as f32 * 0.001;
            let intent = seed & 1 == 1;
            let before = m.phase();
            let event = m.update(dt, if intent { &car } else { &idle }, intent);
            let c = m.confidence();
            assert!((0.0..=0.25).contains(&c), "confidence {c} escaped");
            match event {
                Some(DriftEvent::Started) => {
                    assert_eq!(before, DriftPhase::Grip);
                    assert!(c >= 0.15 * (1.0 - ENTER_EPSILON));
                }
                Some(DriftEvent::Ended) => {
                    assert_eq!(before, DriftPhase::Drift);
                    assert_eq!(c, 0.0);
                }
                None => assert_eq!(before, m.phase()),
            }
        }
    }

    #[test]
    fn false_tick_decrements_instead_of_resetting() {
        let mut m = machine();
        let car = sliding_car();
        for _ in 0..5 { m.update(DT, &car, true); }
        m.update(DT, &car, false);
        assert_relative_eq!(m.confidence(), 4.0 * DT, epsilon = 1e-6);
        assert_eq!(m.phase(), DriftPhase::Grip);
    }

    #[test]
    fn drift_then_recover_scenario() {
        let mut m = machine();
        let car = sliding_car();

        // 0.2 s of throttle while sliding
        for _ in 0..12 { m.update(DT, &car, true); }
        assert!(m.is_drifting());
        assert_relative_eq!(m.rear_grip_multiplier(), 0.9);

        // throttle released, slip under 8° for 0.3 s
        let straight = CarState { slip_angle: 5f32.to_radians(), ..car };
        let mut ended = false;
        for _ in 0..18 {
            if m.update(DT, &straight, false) == Some(DriftEvent::Ended) {
                ended = true;
            }
        }
        assert!(ended);
        assert_eq!(m.phase(), DriftPhase::Grip);
        assert_eq!(m.rear_grip_multiplier(), 1.0);
    }

    #[test]
    fn force_exit_is_immediate() {
        let mut m = machine();
        let car = sliding_car();
        for _ in 0..30 { m.update(DT, &car, true); }
        assert!(m.is_drifting());
        assert_relative_eq!(m.confidence(), 0.25);

        assert_eq!(m.force_exit(), Some(DriftEvent::Ended));
        assert_eq!(m.phase(), DriftPhase::Grip);
        assert_eq!(m.confidence(), 0.0);
        assert_eq!(m.rear_grip_multiplier(), 1.0);
        assert_eq!(m.force_exit(), None);
    }

    #[test]
    fn drift_grip_change_applies_while_drifting() {
        let mut m = machine();
        let car = sliding_car();
        for _ in 0..10 { m.update(DT, &car, true); }
        m.set_drift_grip(0.75);
        assert_eq!(m.rear_grip_multiplier(), 0.75);
    }
}
