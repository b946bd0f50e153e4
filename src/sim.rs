//! Simulated swerve modules and gyro.
//!
//! Each module handle shares its state with the `SimWorld`, which advances
//! wheel travel, steering and the true chassis pose once per control cycle.

use std::f64::consts::PI;
use std::sync::Arc;

use parking_lot::Mutex;
use swerve_kinematics::{
    HeadingProvider, ModuleActuator, ModulePositionSource, NUM_WHEELS, Pose2d, Rotation2d,
    SwerveKinematics, Translation2d, WheelLocation, WheelState,
};
use tracing::trace;

use crate::config::SimSettings;

/// Below this commanded speed (m/s) a module stops instead of steering.
const STOP_SPEED: f64 = 0.001;

#[derive(Debug, Default)]
struct ModulePlant {
    /// True steering angle (rad).
    angle: f64,
    /// Relative steering encoder zero, in true-angle radians.
    turning_zero: f64,
    /// True distance rolled (m).
    rolled: f64,
    /// Drive encoder zero, in rolled meters.
    drive_zero: f64,
    target: Option<WheelState>,
    /// Speed actually being driven this cycle (m/s).
    speed: f64,
}

/// Handle to one simulated module.
#[derive(Debug, Clone)]
pub struct SimModule {
    location: WheelLocation,
    plant: Arc<Mutex<ModulePlant>>,
}

impl ModulePositionSource for SimModule {
    fn drive_position(&self) -> f64 {
        let p = self.plant.lock();
        p.rolled - p.drive_zero
    }

    fn turning_position(&self) -> Rotation2d {
        let p = self.plant.lock();
        Rotation2d::new(p.angle - p.turning_zero)
    }

    fn absolute_angle(&self) -> Rotation2d {
        Rotation2d::new(self.plant.lock().angle)
    }

    fn reset_encoders(&mut self) {
        let mut p = self.plant.lock();
        p.drive_zero = p.rolled;
        p.turning_zero = 0.0;
    }
}

impl ModuleActuator for SimModule {
    fn set_desired_state(&mut self, state: WheelState) {
        if state.speed.abs() < STOP_SPEED {
            self.stop();
            return;
        }
        trace!(wheel = self.location.name(), %state, "module target");
        self.plant.lock().target = Some(state);
    }

    fn stop(&mut self) {
        let mut p = self.plant.lock();
        p.target = None;
        p.speed = 0.0;
    }
}

/// Simulated gyro. Reports the true yaw relative to the last `zero`, plus the
/// mount offset.
#[derive(Debug, Clone)]
pub struct SimGyro {
    yaw: Arc<Mutex<f64>>,
    zero_yaw: f64,
    offset: Rotation2d,
}

impl HeadingProvider for SimGyro {
    fn heading(&self) -> Rotation2d {
        Rotation2d::new(*self.yaw.lock() - self.zero_yaw) + self.offset
    }

    fn zero(&mut self) {
        self.zero_yaw = *self.yaw.lock();
    }
}

/// Ground truth for the simulation.
///
/// The true pose lives in the field frame the gyro defines at calibration:
/// the robot starts at the origin facing `heading_offset`.
pub struct SimWorld {
    kinematics: SwerveKinematics,
    plants: [Arc<Mutex<ModulePlant>>; NUM_WHEELS],
    yaw: Arc<Mutex<f64>>,
    heading_offset: Rotation2d,
    steer_rate: f64,
    true_pose: Pose2d,
}

impl SimWorld {
    pub fn new(
        kinematics: SwerveKinematics,
        settings: &SimSettings,
        heading_offset: Rotation2d,
    ) -> Self {
        // Relative encoders power on reading zero wherever the wheel points
        let plants = settings.power_on_angles_deg.map(|deg| {
            let angle = deg.to_radians();
            Arc::new(Mutex::new(ModulePlant {
                angle,
                turning_zero: angle,
                ..Default::default()
            }))
        });
        SimWorld {
            kinematics,
            plants,
            yaw: Arc::new(Mutex::new(heading_offset.radians())),
            heading_offset,
            steer_rate: settings.steer_rate,
            true_pose: Pose2d::new(0.0, 0.0, heading_offset),
        }
    }

    pub fn modules(&self) -> [SimModule; NUM_WHEELS] {
        WheelLocation::ALL.map(|location| SimModule {
            location,
            plant: Arc::clone(&self.plants[location.index()]),
        })
    }

    /// A gyro whose mount offset matches the world's starting heading, so a
    /// `zero` at the start pose reports the true yaw from then on.
    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            yaw: Arc::clone(&self.yaw),
            zero_yaw: 0.0,
            offset: self.heading_offset,
        }
    }

    pub fn true_pose(&self) -> Pose2d {
        self.true_pose
    }

    /// Advance the plant by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let max_steer = self.steer_rate * dt;
        let actual: [WheelState; NUM_WHEELS] = std::array::from_fn(|i| {
            let mut p = self.plants[i].lock();
            match p.target {
                Some(target) => {
                    let error = (target.angle - Rotation2d::new(p.angle)).radians();
                    p.angle = wrap(p.angle + error.clamp(-max_steer, max_steer));
                    p.speed = target.speed;
                }
                None => p.speed = 0.0,
            }
            p.rolled += p.speed * dt;
            WheelState::new(p.speed, Rotation2d::new(p.angle))
        });

        let chassis = self.kinematics.to_chassis_speeds(&actual);
        let heading = self.true_pose.heading;
        let travel = Translation2d::new(chassis.vx * dt, chassis.vy * dt).rotate_by(heading);
        let mut yaw = self.yaw.lock();
        *yaw += chassis.omega * dt;
        self.true_pose = Pose2d::new(
            self.true_pose.x + travel.x,
            self.true_pose.y + travel.y,
            Rotation2d::new(*yaw),
        );
    }
}

fn wrap(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use swerve_kinematics::SwerveGeometry;

    fn world_facing(heading_offset: Rotation2d) -> SimWorld {
        let kinematics =
            SwerveKinematics::new(SwerveGeometry::rectangular(0.5, 0.5).unwrap()).unwrap();
        SimWorld::new(
            kinematics,
            &SimSettings {
                steer_rate: 10.0,
                power_on_angles_deg: [30.0, -45.0, 90.0, 0.0],
            },
            heading_offset,
        )
    }

    fn world() -> SimWorld {
        world_facing(Rotation2d::ZERO)
    }

    #[test]
    fn relative_encoder_is_wrong_until_reset() {
        let world = world();
        let mut modules = world.modules();
        let fl = &mut modules[0];
        assert_eq!(fl.turning_position(), Rotation2d::ZERO);
        assert!((fl.absolute_angle().degrees() - 30.0).abs() < 1e-9);
        fl.reset_encoders();
        assert!((fl.turning_position().degrees() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn steering_is_rate_limited() {
        let mut world = world();
        let mut modules = world.modules();
        let back_right = &mut modules[3];
        back_right.set_desired_state(WheelState::new(1.0, Rotation2d::from_degrees(90.0)));
        world.step(0.02);
        // 10 rad/s for 20 ms = 0.2 rad
        assert!((back_right.absolute_angle().radians() - 0.2).abs() < 1e-9);
        assert!((back_right.drive_position() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn tiny_command_stops_module() {
        let mut world = world();
        let mut modules = world.modules();
        modules[0].set_desired_state(WheelState::new(1.0, Rotation2d::from_degrees(30.0)));
        world.step(0.1);
        modules[0].set_desired_state(WheelState::new(0.0001, Rotation2d::from_degrees(-90.0)));
        world.step(0.1);
        // Did not move or steer after the stop
        assert!((modules[0].drive_position() - 0.1).abs() < 1e-9);
        assert!((modules[0].absolute_angle().degrees() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn gyro_zero_and_offset() {
        let world = world_facing(Rotation2d::from_degrees(-90.0));
        *world.yaw.lock() = 1.0;
        let mut gyro = world.gyro();
        gyro.zero();
        assert!((gyro.heading().degrees() - (-90.0)).abs() < 1e-9);
        *world.yaw.lock() = 1.5;
        assert!((gyro.heading().radians() - (0.5 - std::f64::consts::FRAC_PI_2)).abs() < 1e-9);
    }

    #[test]
    fn offset_world_starts_facing_the_offset() {
        let mut world = world_facing(Rotation2d::from_degrees(-90.0));
        let mut gyro = world.gyro();
        gyro.zero();
        assert_eq!(world.true_pose().heading, Rotation2d::from_degrees(-90.0));
        assert!((gyro.heading().degrees() - (-90.0)).abs() < 1e-9);

        // Back-right already points forward, and robot forward is field -y
        let mut modules = world.modules();
        modules[3].reset_encoders();
        modules[3].set_desired_state(WheelState::new(1.0, Rotation2d::ZERO));
        world.step(0.1);
        let truth = world.true_pose();
        assert!(truth.y < 0.0);
        assert!((truth.heading.radians() - gyro.heading().radians()).abs() < 1e-9);
    }
}
