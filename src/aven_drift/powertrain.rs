// ==============================================================================
// powertrain.rs - ENGINE RPM + GEARBOX + REQUESTED TORQUE
// ------------------------------------------------------------------------------
// RPM model (engine inertia without an inertia tensor):
//
//   desired = idle + (redline - idle) * throttle
//   load    = clamp(1 - 0.6 * throttle, 0.3, 1.0)
//   target  = desired * (1 - load) + wheel_rpm * load
//   rpm     = move_toward(rpm, target, rate * dt)   rate: 8000 up / 4000 down
//
// Low throttle biases toward the wheels (engine is "connected"), high throttle
// lets the engine free-rev. Everything is clamped to [idle, redline] so a bad
// wheel estimate can never push NaN into audio or torque.
// ==============================================================================

use serde::Serialize;
use tracing::{debug, warn};

use crate::aven_drift::car_state::MS_TO_KMH;
use crate::aven_drift::tuning::{EngineTuning, TorqueModel};
use crate::aven_drift::types::{finite_or, move_toward};

pub const RPM_RISE_RATE: f32 = 8000.0; // rpm/s
pub const RPM_FALL_RATE: f32 = 4000.0; // rpm/s
pub const REV_FRACTION: f32 = 0.9;     // of redline
pub const MIN_GEAR_RATIO: f32 = 0.01;
pub const TORQUE_CURVE_FLOOR: f32 = 0.3;
pub const SHIFT_HOLD_TIME: f32 = 0.3;  // s, no auto shift after any gear change

const RAD_S_TO_RPM: f32 = 60.0 / std::f32::consts::TAU;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "lowercase")]
pub enum Gear {
    Reverse,
    Neutral,
    Forward(usize),
}

impl Gear {
    /// Sign applied to drive torque in the arcade model.
    pub fn direction(&self) -> f32 {
        match self {
            Gear::Reverse => -1.0,
            Gear::Neutral => 0.0,
            Gear::Forward(_) => 1.0,
        }
    }

    /// Table index (0 = reverse), `None` for neutral.
    pub fn table_index(&self) -> Option<usize> {
        match self {
            Gear::Reverse => Some(0),
            Gear::Neutral => None,
            Gear::Forward(n) => Some(*n),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GearChange {
    pub from: Gear,
    pub to: Gear,
}

pub struct Powertrain {
    tuning: EngineTuning,
    base_torque: f32,
    rpm: f32,
    gear: Gear,
    is_revving: bool,
    shift_hold: f32, // s left before auto_shift may act again
}

impl Powertrain {
    pub fn new(tuning: EngineTuning, base_torque: f32) -> Self {
        let rpm = tuning.idle_rpm;
        let gear = if tuning.gear_ratios.len() > 1 { Gear::Forward(1) } else { Gear::Neutral };
        Self {
            tuning,
            base_torque,
            rpm,
            gear,
            is_revving: false,
            shift_hold: 0.0,
        }
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    #[inline] pub fn rpm(&self) -> f32 { self.rpm }
    #[inline] pub fn gear(&self) -> Gear { self.gear }
    #[inline] pub fn is_revving(&self) -> bool { self.is_revving }
    #[inline] pub fn base_torque(&self) -> f32 { self.base_torque }
    #[inline] pub fn idle_rpm(&self) -> f32 { self.tuning.idle_rpm }

    #[inline]
    pub fn redline_rpm(&self) -> f32 {
        self.tuning.redline_rpm.max(self.tuning.idle_rpm)
    }

    /// Highest forward gear index; 0 when the table has no forward gears.
    #[inline]
    pub fn top_gear(&self) -> usize {
        self.tuning.gear_ratios.len().saturating_sub(1)
    }

    /// Ratio of the current gear. Out-of-range indices clamp to the table;
    /// neutral or an empty table is 0.
    pub fn gear_ratio(&self) -> f32 {
        let ratios = &self.tuning.gear_ratios;
        match self.gear.table_index() {
            Some(i) if !ratios.is_empty() => ratios[i.min(ratios.len() - 1)],
            _ => 0.0,
        }
    }

    // ------------------------------------------------------------------
    // configuration
    // ------------------------------------------------------------------

    /// Swap engine parameters at runtime. Keeps rpm (re-clamped) and gear
    /// (re-clamped to the new table).
    pub fn set_tuning(&mut self, tuning: EngineTuning, base_torque: f32) {
        self.tuning = tuning;
        self.base_torque = base_torque;
        self.rpm = self.rpm.clamp(self.tuning.idle_rpm, self.redline_rpm());
        if let Gear::Forward(n) = self.gear {
            let top = self.top_gear();
            self.gear = if top == 0 { Gear::Neutral } else { Gear::Forward(n.clamp(1, top)) };
        }
    }

    /// Rescale base torque (performance upgrades).
    pub fn apply_upgrade(&mut self, multiplier: f32) {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            warn!(multiplier, "ignoring invalid torque upgrade");
            return;
        }
        self.base_torque *= multiplier;
        debug!(base_torque = self.base_torque, "torque upgrade applied");
    }

    pub fn reset(&mut self) {
        self.rpm = self.tuning.idle_rpm;
        self.gear = if self.top_gear() >= 1 { Gear::Forward(1) } else { Gear::Neutral };
        self.is_revving = false;
        self.shift_hold = 0.0;
    }

    // ------------------------------------------------------------------
    // torque
    // ------------------------------------------------------------------

    /// Drive torque requested for this throttle at this speed (m/s).
    ///
    /// Arcade: `base x throttle x boost(kmh)` signed by gear direction.
    /// Simulation: `base x throttle x curve(rpm) x ratio x final_drive x eff`.
    pub fn compute_requested_torque(&self, throttle: f32, speed: f32) -> f32 {
        let throttle = finite_or(throttle, 0.0).clamp(0.0, 1.0);

        let torque = match self.tuning.model {
            TorqueModel::Arcade { launch_boost, boost_fade_kmh } => {
                let kmh = finite_or(speed.abs() * MS_TO_KMH, 0.0);
                let t = if boost_fade_kmh > 0.0 { (kmh / boost_fade_kmh).clamp(0.0, 1.0) } else { 1.0 };
                let boost = launch_boost + (1.0 - launch_boost) * t;
                self.base_torque * throttle * boost * self.gear.direction()
            }
            TorqueModel::Simulation { efficiency } => {
                self.base_torque
                    * throttle
                    * self.torque_curve(self.rpm)
                    * self.gear_ratio()
                    * self.tuning.final_drive
                    * efficiency
            }
        };

        finite_or(torque, 0.0)
    }

    /// Normalized bell curve peaking at `peak_torque_rpm`, never below 0.3.
    pub fn torque_curve(&self, rpm: f32) -> f32 {
        let width = if self.tuning.curve_width_rpm > 0.0 { self.tuning.curve_width_rpm } else { 1.0 };
        let x = (rpm - self.tuning.peak_torque_rpm) / width;
        finite_or((-x * x).exp(), TORQUE_CURVE_FLOOR).max(TORQUE_CURVE_FLOOR)
    }

    // ------------------------------------------------------------------
    // rpm
    // ------------------------------------------------------------------

    pub fn update_rpm(&mut self, dt: f32, wheel_rpm: f32, throttle: f32) {
        let idle = self.tuning.idle_rpm;
        let redline = self.redline_rpm();
        let dt = finite_or(dt, 0.0).max(0.0);
        let throttle = finite_or(throttle, 0.0).clamp(0.0, 1.0);
        let wheel_rpm = finite_or(wheel_rpm, idle).max(0.0);
        self.shift_hold = (self.shift_hold - dt).max(0.0);

        let desired = idle + (redline - idle) * throttle;
        let load = (1.0 - 0.6 * throttle).clamp(0.3, 1.0);
        let mut target = (desired * (1.0 - load) + wheel_rpm * load).clamp(idle, redline);

        // off-throttle near idle: settle instead of hovering above it
        if throttle < 0.1 && self.rpm < idle * 1.5 {
            target = idle;
        }

        let rate = if target > self.rpm { RPM_RISE_RATE } else { RPM_FALL_RATE };
        self.rpm = move_toward(self.rpm, target, rate * dt);

        self.rpm = finite_or(self.rpm, idle).clamp(idle, redline);
        self.is_revving = self.rpm > redline * REV_FRACTION;
    }

    /// Engine rpm implied by the current road speed through the current gear.
    pub fn estimate_wheel_rpm(&self, wheel_radius: f32, speed: f32) -> f32 {
        let idle = self.tuning.idle_rpm;
        let ratio = self.gear_ratio();

        if !(wheel_radius > 0.0) || ratio.abs() < MIN_GEAR_RATIO {
            return idle;
        }

        let wheel_rad_s = speed.abs() / wheel_radius;
        let engine_rpm = wheel_rad_s * RAD_S_TO_RPM * ratio.abs() * self.tuning.final_drive;

        if !engine_rpm.is_finite() {
            return idle;
        }
        engine_rpm.clamp(0.0, self.redline_rpm() * 1.5)
    }

    // ------------------------------------------------------------------
    // gearbox
    // ------------------------------------------------------------------

    /// Automatic forward shifting. Reverse and neutral are left alone, and
    /// nothing happens until rpm has had `SHIFT_HOLD_TIME` to follow the last
    /// change.
    pub fn auto_shift(&mut self) -> Option<GearChange> {
        let Gear::Forward(n) = self.gear else { return None };
        if self.shift_hold > 0.0 {
            return None;
        }
        let redline = self.redline_rpm();

        if self.rpm > redline * REV_FRACTION && n < self.top_gear() {
            return self.change_to(Gear::Forward(n + 1));
        }
        if self.rpm < self.tuning.idle_rpm * 2.0 && n > 1 {
            return self.change_to(Gear::Forward(n - 1));
        }
        None
    }

    pub fn shift_up(&mut self) -> Option<GearChange> {
        let top = self.top_gear();
        let next = match self.gear {
            Gear::Reverse => Gear::Neutral,
            Gear::Neutral if top >= 1 => Gear::Forward(1),
            Gear::Forward(n) if n < top => Gear::Forward(n + 1),
            _ => return None,
        };
        self.change_to(next)
    }

    pub fn shift_down(&mut self) -> Option<GearChange> {
        let next = match self.gear {
            Gear::Forward(n) if n > 1 => Gear::Forward(n - 1),
            Gear::Forward(_) => Gear::Neutral,
            Gear::Neutral if !self.tuning.gear_ratios.is_empty() => Gear::Reverse,
            _ => return None,
        };
        self.change_to(next)
    }

    pub fn set_reverse(&mut self) -> Option<GearChange> {
        if self.tuning.gear_ratios.is_empty() {
            return None;
        }
        self.change_to(Gear::Reverse)
    }

    pub fn set_neutral(&mut self) -> Option<GearChange> {
        self.change_to(Gear::Neutral)
    }

    fn change_to(&mut self, to: Gear) -> Option<GearChange> {
        if to == self.gear {
            return None;
        }
        let change = GearChange { from: self.gear, to };
        self.gear = to;
        self.shift_hold = SHIFT_HOLD_TIME;
        debug!(from = ?change.from, to = ?change.to, rpm = self.rpm, "gear change");
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arcade() -> Powertrain {
        Powertrain::new(EngineTuning::default(), 1000.0)
    }

    #[test]
    fn launch_boost_fades_out_by_80_kmh() {
        let p = arcade();
        assert_relative_eq!(p.compute_requested_torque(1.0, 0.0), 2000.0);
        assert_relative_eq!(p.compute_requested_torque(0.5, 40.0 / 3.6), 750.0, epsilon = 1e-2);
        assert_relative_eq!(p.compute_requested_torque(1.0, 80.0 / 3.6), 1000.0, epsilon = 1e-2);
        assert_relative_eq!(p.compute_requested_torque(1.0, 200.0 / 3.6), 1000.0);
    }

    #[test]
    fn arcade_torque_follows_gear_direction() {
        let mut p = arcade();
        p.set_reverse();
        assert!(p.compute_requested_torque(1.0, 0.0) < 0.0);
        p.set_neutral();
        assert_eq!(p.compute_requested_torque(1.0, 0.0), 0.0);
    }

    #[test]
    fn simulation_torque_uses_curve_and_ratio() {
        let tuning = EngineTuning {
            model: TorqueModel::Simulation { efficiency: 1.0 },
            ..EngineTuning::default()
        };
        let p = Powertrain::new(tuning.clone(), 200.0);
        let expected = 200.0 * p.torque_curve(p.rpm()) * tuning.gear_ratios[1] * tuning.final_drive;
        assert_relative_eq!(p.compute_requested_torque(1.0, 5.0), expected, epsilon = 1e-3);
    }

    #[test]
    fn torque_curve_peaks_and_has_floor() {
        let p = arcade();
        assert_relative_eq!(p.torque_curve(5200.0), 1.0);
        assert!(p.torque_curve(4000.0) < 1.0);
        assert_eq!(p.torque_curve(0.0), TORQUE_CURVE_FLOOR);
        assert_eq!(p.torque_curve(50_000.0), TORQUE_CURVE_FLOOR);
    }

    #[test]
    fn rpm_stays_in_band_for_any_input() {
        let mut p = arcade();
        let throttles = [0.0, 0.05, 0.3, 0.7, 1.0];
        let wheel_rpms = [0.0, 500.0, 3000.0, 9000.0, 1.0e7];
        let dts = [1.0 / 240.0, 1.0 / 60.0, 0.5];
        for &dt in &dts {
            for &t in &throttles {
                for &w in &wheel_rpms {
                    p.update_rpm(dt, w, t);
                    assert!(p.rpm() >= 900.0 && p.rpm() <= 7500.0, "rpm {} out of band", p.rpm());
                }
            }
        }
        p.update_rpm(1.0 / 60.0, f32::NAN, 1.0);
        assert!(p.rpm().is_finite());
    }

    #[test]
    fn rpm_rises_faster_than_it_falls() {
        let mut p = arcade();
        p.update_rpm(0.1, 0.0, 1.0);
        // full throttle: target = 7500*0.6 + 0*0.4 = 4500 -> capped by 800 rpm step
        assert_relative_eq!(p.rpm(), 1700.0, epsilon = 1e-2);

        let mut q = arcade();
        q.rpm = 6000.0;
        q.update_rpm(0.1, 0.0, 0.0);
        assert_relative_eq!(q.rpm(), 5600.0, epsilon = 1e-2);
    }

    #[test]
    fn off_throttle_settles_to_idle() {
        let mut p = arcade();
        p.rpm = 1200.0;
        let mut last = p.rpm();
        for _ in 0..60 {
            p.update_rpm(1.0 / 60.0, 1100.0, 0.0);
            assert!(p.rpm() <= last, "rpm bounced back up");
            last = p.rpm();
        }
        assert_relative_eq!(p.rpm(), 900.0);
    }

    #[test]
    fn revving_flag_near_redline() {
        let mut p = arcade();
        for _ in 0..120 {
            p.update_rpm(1.0 / 60.0, 7500.0, 1.0);
        }
        assert!(p.is_revving());
    }

    #[test]
    fn wheel_rpm_guards_return_idle() {
        let mut p = arcade();
        assert_eq!(p.estimate_wheel_rpm(0.0, 20.0), 900.0);
        assert_eq!(p.estimate_wheel_rpm(-0.3, 20.0), 900.0);
        assert_eq!(p.estimate_wheel_rpm(f32::NAN, 20.0), 900.0);
        p.set_neutral();
        assert_eq!(p.estimate_wheel_rpm(0.35, 20.0), 900.0);

        let tiny = EngineTuning { gear_ratios: vec![-0.001, 0.005], ..EngineTuning::default() };
        let p = Powertrain::new(tiny, 100.0);
        assert_eq!(p.estimate_wheel_rpm(0.35, 20.0), 900.0);
    }

    #[test]
    fn wheel_rpm_from_speed() {
        let p = arcade();
        // 10 m/s, r = 0.5 -> 20 rad/s -> 190.99 rpm * 3.6 * 4.1
        let expected = 20.0 * RAD_S_TO_RPM * 3.6 * 4.1;
        assert_relative_eq!(p.estimate_wheel_rpm(0.5, 10.0), expected, epsilon = 1e-2);
    }

    #[test]
    fn auto_shift_up_and_down() {
        let mut p = arcade();
        p.rpm = 7000.0;
        assert_eq!(
            p.auto_shift(),
            Some(GearChange { from: Gear::Forward(1), to: Gear::Forward(2) })
        );
        p.shift_hold = 0.0;
        p.rpm = 1500.0;
        assert_eq!(p.auto_shift().map(|c| c.to), Some(Gear::Forward(1)));
        p.shift_hold = 0.0;
        // never below first
        assert_eq!(p.auto_shift(), None);

        p.set_reverse();
        p.rpm = 7400.0;
        assert_eq!(p.auto_shift(), None);
        assert_eq!(p.gear(), Gear::Reverse);
    }

    #[test]
    fn auto_shift_waits_for_rpm_to_follow() {
        // steady 30 m/s at full throttle: rpm lags the new gear after each upshift
        for hz in [60.0f32, 240.0] {
            let dt = 1.0 / hz;
            let mut p = arcade();
            let mut changes = Vec::new();
            for tick in 0..(hz as usize * 3) {
                let wheel_rpm = p.estimate_wheel_rpm(0.35, 30.0);
                p.update_rpm(dt, wheel_rpm, 1.0);
                if p.auto_shift().is_some() {
                    changes.push(tick as f32 * dt);
                }
            }
            assert!(!changes.is_empty(), "{hz} Hz never shifted");
            for pair in changes.windows(2) {
                assert!(pair[1] - pair[0] >= SHIFT_HOLD_TIME - dt, "{hz} Hz shifted twice in {}s", pair[1] - pair[0]);
            }
        }
    }

    #[test]
    fn manual_shift_also_holds_off_auto_shift() {
        let mut p = arcade();
        p.shift_up();
        p.rpm = 1000.0;
        assert_eq!(p.auto_shift(), None);
        assert_eq!(p.gear(), Gear::Forward(2));

        p.update_rpm(SHIFT_HOLD_TIME, 0.0, 0.0);
        assert_eq!(p.auto_shift().map(|c| c.to), Some(Gear::Forward(1)));
    }

    #[test]
    fn top_gear_does_not_upshift() {
        let mut p = arcade();
        while p.shift_up().is_some() {}
        assert_eq!(p.gear(), Gear::Forward(6));
        p.rpm = 7400.0;
        assert_eq!(p.auto_shift(), None);
    }

    #[test]
    fn manual_shifting_walks_the_table() {
        let mut p = arcade();
        assert_eq!(p.shift_down().map(|c| c.to), Some(Gear::Neutral));
        assert_eq!(p.shift_down().map(|c| c.to), Some(Gear::Reverse));
        assert_eq!(p.shift_down(), None);
        assert_eq!(p.shift_up().map(|c| c.to), Some(Gear::Neutral));
        assert_eq!(p.set_neutral(), None);
    }

    #[test]
    fn empty_gear_table_is_safe() {
        let empty = EngineTuning { gear_ratios: vec![], ..EngineTuning::default() };
        let mut p = Powertrain::new(empty, 500.0);
        assert_eq!(p.gear(), Gear::Neutral);
        assert_eq!(p.gear_ratio(), 0.0);
        assert_eq!(p.shift_up(), None);
        assert_eq!(p.set_reverse(), None);
        assert_eq!(p.estimate_wheel_rpm(0.35, 10.0), 900.0);
    }

    #[test]
    fn upgrade_scales_base_torque() {
        let mut p = arcade();
        p.apply_upgrade(1.25);
        assert_relative_eq!(p.base_torque(), 1250.0);
        p.apply_upgrade(f32::INFINITY);
        p.apply_upgrade(-2.0);
        assert_relative_eq!(p.base_torque(), 1250.0);
    }
}
