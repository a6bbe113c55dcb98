//! Core shared types for `aven_drift` (engine-agnostic).
// aven_drift/types.rs
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

// ----- tiny scalar helpers -----

/// Step `current` toward `target` by at most `max_delta`. Never overshoots.
#[inline]
pub fn move_toward(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + max_delta * delta.signum()
    }
}

#[inline]
pub fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

// ============================================
// Wheel identification
// ============================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WheelId { FL, FR, RL, RR }

impl WheelId {
    pub const ALL: [WheelId; 4] = [WheelId::FL, WheelId::FR, WheelId::RL, WheelId::RR];

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::FR)
    }

    pub fn is_rear(&self) -> bool {
        matches!(self, WheelId::RL | WheelId::RR)
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Fixed four-wheel container
// ============================================

/// Exactly four named wheels. Replaces "iterate the children and check which
/// ones are wheels" with a layout the compiler can see.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Wheels<T> {
    pub fl: T,
    pub fr: T,
    pub rl: T,
    pub rr: T,
}

impl<T> Wheels<T> {
    pub fn from_fn(mut f: impl FnMut(WheelId) -> T) -> Self {
        Self {
            fl: f(WheelId::FL),
            fr: f(WheelId::FR),
            rl: f(WheelId::RL),
            rr: f(WheelId::RR),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Wheels<U> {
        Wheels {
            fl: f(&self.fl),
            fr: f(&self.fr),
            rl: f(&self.rl),
            rr: f(&self.rr),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (WheelId, &T)> {
        WheelId::ALL.into_iter().map(move |id| (id, &self[id]))
    }
}

impl<T> Index<WheelId> for Wheels<T> {
    type Output = T;

    fn index(&self, id: WheelId) -> &T {
        match id {
            WheelId::FL => &self.fl,
            WheelId::FR => &self.fr,
            WheelId::RL => &self.rl,
            WheelId::RR => &self.rr,
        }
    }
}

impl<T> IndexMut<WheelId> for Wheels<T> {
    fn index_mut(&mut self, id: WheelId) -> &mut T {
        match id {
            WheelId::FL => &mut self.fl,
            WheelId::FR => &mut self.fr,
            WheelId::RL => &mut self.rl,
            WheelId::RR => &mut self.rr,
        }
    }
}

// ============================================
// Axle split
// ============================================

/// Front/rear pair produced by the drivetrain (torque in N·m, brake in N).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct AxleSplit {
    pub front: f32,
    pub rear: f32,
}

impl AxleSplit {
    pub const ZERO: AxleSplit = AxleSplit { front: 0.0, rear: 0.0 };

    #[inline]
    pub fn total(&self) -> f32 { self.front + self.rear }
}

// ============================================
// Drive type
// ============================================

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DriveType {
    Rwd,
    Fwd,
    Awd { front_bias: f32 },
    /// No axle receives torque. Used when the configured layout is unusable.
    Disconnected,
}

impl Default for DriveType {
    fn default() -> Self { DriveType::Rwd }
}

impl DriveType {
    /// Parse a drive-type name. Unknown names return `None` so callers can
    /// keep whatever layout they already had.
    pub fn parse(name: &str, awd_front_bias: f32) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rwd" => Some(DriveType::Rwd),
            "fwd" => Some(DriveType::Fwd),
            "awd" => Some(DriveType::Awd { front_bias: awd_front_bias }),
            "none" | "disconnected" => Some(DriveType::Disconnected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_wheel_is_front_or_rear() {
        let rear: Vec<_> = WheelId::ALL.into_iter().filter(WheelId::is_rear).collect();
        assert_eq!(rear, vec![WheelId::RL, WheelId::RR]);
        assert!(WheelId::ALL.iter().all(|w| w.is_front() != w.is_rear()));
    }

    #[test]
    fn wheels_index_matches_named_fields() {
        let mut w = Wheels::from_fn(|id| id.as_str().to_string());
        assert_eq!(w[WheelId::RL], "RL");
        w[WheelId::FR] = "x".into();
        assert_eq!(w.fr, "x");
        let ids: Vec<_> = w.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, WheelId::ALL.to_vec());
    }

    #[test]
    fn unknown_drive_type_is_rejected() {
        assert_eq!(DriveType::parse("RWD", 0.5), Some(DriveType::Rwd));
        assert_eq!(DriveType::parse("awd", 0.3), Some(DriveType::Awd { front_bias: 0.3 }));
        assert_eq!(DriveType::parse("hover", 0.5), None);
    }
}
