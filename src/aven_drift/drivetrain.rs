//! Axle torque / brake distribution. Configuration only, no simulation state.

use crate::aven_drift::types::{AxleSplit, DriveType};

/// Brake bias is fixed and independent of which axle is driven.
pub const BRAKE_FRONT_SHARE: f32 = 0.6;
pub const BRAKE_REAR_SHARE: f32 = 0.4;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Drivetrain {
    drive: DriveType,
}

impl Drivetrain {
    pub fn new(drive: DriveType) -> Self {
        let mut d = Self::default();
        d.set_drive_type(drive);
        d
    }

    #[inline]
    pub fn drive_type(&self) -> DriveType {
        self.drive
    }

    pub fn set_drive_type(&mut self, drive: DriveType) {
        match drive {
            DriveType::Awd { front_bias } => self.set_awd(front_bias),
            other => self.drive = other,
        }
    }

    pub fn set_rwd(&mut self) { self.drive = DriveType::Rwd; }
    pub fn set_fwd(&mut self) { self.drive = DriveType::Fwd; }

    pub fn set_awd(&mut self, front_bias: f32) {
        let front_bias = if front_bias.is_finite() { front_bias.clamp(0.0, 1.0) } else { 0.5 };
        self.drive = DriveType::Awd { front_bias };
    }

    pub fn distribute_torque(&self, torque: f32) -> AxleSplit {
        match self.drive {
            DriveType::Rwd => AxleSplit { front: 0.0, rear: torque },
            DriveType::Fwd => AxleSplit { front: torque, rear: 0.0 },
            DriveType::Awd { front_bias } => AxleSplit {
                front: torque * front_bias,
                rear: torque - torque * front_bias,
            },
            DriveType::Disconnected => AxleSplit::ZERO,
        }
    }

    pub fn distribute_brake(&self, brake_force: f32) -> AxleSplit {
        AxleSplit {
            front: brake_force * BRAKE_FRONT_SHARE,
            rear: brake_force * BRAKE_REAR_SHARE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn split_sums_to_input_for_every_layout() {
        let torques = [0.0, 1.0, 350.0, 4321.5, -800.0];
        let mut layouts = vec![DriveType::Rwd, DriveType::Fwd];
        layouts.extend((0..=10).map(|i| DriveType::Awd { front_bias: i as f32 / 10.0 }));

        for drive in layouts {
            let d = Drivetrain::new(drive);
            for &t in &torques {
                let s = d.distribute_torque(t);
                assert_relative_eq!(s.total(), t, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn rwd_fwd_awd_shapes() {
        assert_eq!(Drivetrain::new(DriveType::Rwd).distribute_torque(100.0), AxleSplit { front: 0.0, rear: 100.0 });
        assert_eq!(Drivetrain::new(DriveType::Fwd).distribute_torque(100.0), AxleSplit { front: 100.0, rear: 0.0 });
        let awd = Drivetrain::new(DriveType::Awd { front_bias: 0.3 }).distribute_torque(100.0);
        assert_relative_eq!(awd.front, 30.0, epsilon = 1e-4);
        assert_relative_eq!(awd.rear, 70.0, epsilon = 1e-4);
    }

    #[test]
    fn awd_bias_is_clamped() {
        let mut d = Drivetrain::default();
        d.set_awd(1.7);
        assert_eq!(d.drive_type(), DriveType::Awd { front_bias: 1.0 });
        d.set_awd(-0.2);
        assert_eq!(d.drive_type(), DriveType::Awd { front_bias: 0.0 });
        d.set_awd(f32::NAN);
        assert_eq!(d.drive_type(), DriveType::Awd { front_bias: 0.5 });
    }

    #[test]
    fn brake_is_sixty_forty_regardless_of_drive() {
        for drive in [DriveType::Rwd, DriveType::Fwd, DriveType::Awd { front_bias: 0.9 }, DriveType::Disconnected] {
            let b = Drivetrain::new(drive).distribute_brake(1000.0);
            assert_relative_eq!(b.front, 600.0);
            assert_relative_eq!(b.rear, 400.0);
            assert_relative_eq!(b.total(), 1000.0);
        }
    }

    #[test]
    fn disconnected_sends_nothing() {
        let d = Drivetrain::new(DriveType::Disconnected);
        assert_eq!(d.distribute_torque(900.0), AxleSplit::ZERO);
    }

    #[test]
    fn layout_switches_apply_immediately() {
        let mut d = Drivetrain::default();
        assert_eq!(d.distribute_torque(10.0).front, 0.0);
        d.set_fwd();
        assert_eq!(d.distribute_torque(10.0).rear, 0.0);
        d.set_rwd();
        assert_eq!(d.distribute_torque(10.0).front, 0.0);
    }
}
