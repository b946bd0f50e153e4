#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for four-wheel swerve drive kinematics."]
#![doc = ""]
#![doc = "This crate converts chassis velocity commands into per-wheel speed and steering"]
#![doc = "targets, keeps those targets within the drivetrain's physical limits, and tracks"]
#![doc = "the robot pose from wheel odometry fused with an authoritative heading sensor."]

use core::f64::consts::FRAC_PI_2;
use core::fmt;
use libm::fabs;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod drive;
pub mod error;
pub mod geometry;
pub mod hardware;
pub mod kinematics;
pub mod odometry;
pub mod rotation;

pub use drive::{DriveState, SwerveDrive};
pub use error::KinematicsError;
pub use geometry::{NUM_WHEELS, SwerveGeometry, WheelGeometry, WheelLocation};
pub use hardware::{HeadingProvider, ModuleActuator, ModulePositionSource};
pub use kinematics::{SwerveKinematics, desaturate_wheel_speeds};
pub use odometry::{OdometryUpdate, SwerveOdometry};
pub use rotation::{Rotation2d, Translation2d, normalize_angle};

/// A 2‑D pose `(x, y, heading)` in the fixed field frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2d {
    /// Field‑frame x position (m).
    pub x: f64,
    /// Field‑frame y position (m).
    pub y: f64,
    /// Heading, counter‑clockwise from the field x‑axis.
    pub heading: Rotation2d,
}

impl Pose2d {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: Field-frame x position in meters.
    /// * `y`: Field-frame y position in meters.
    /// * `heading`: Robot orientation in the field frame.
    pub const fn new(x: f64, y: f64, heading: Rotation2d) -> Self {
        Pose2d { x, y, heading }
    }

    /// The position part of the pose.
    pub fn translation(&self) -> Translation2d {
        Translation2d::new(self.x, self.y)
    }
}

impl fmt::Display for Pose2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x: {:.3}, y: {:.3}, θ: {:.3} rad)",
            self.x,
            self.y,
            self.heading.radians()
        )
    }
}

/// A displacement expressed in the robot frame, as recovered from wheel deltas.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2d {
    /// Forward displacement (m).
    pub dx: f64,
    /// Leftward displacement (m).
    pub dy: f64,
    /// Rotation (rad).
    pub dtheta: f64,
}

/// Robot‑frame linear and angular velocity.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Forward velocity (m/s).
    pub vx: f64,
    /// Leftward velocity (m/s).
    pub vy: f64,
    /// Counter‑clockwise angular velocity (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `vx`: Forward velocity of the chassis (m/s).
    /// * `vy`: Leftward velocity of the chassis (m/s).
    /// * `omega`: Angular velocity of the chassis (rad/s).
    pub const fn new(vx: f64, vy: f64, omega: f64) -> Self {
        ChassisSpeeds { vx, vy, omega }
    }

    /// Convert a field‑relative command into robot‑frame chassis speeds.
    ///
    /// `vx`/`vy` are measured along the field axes; `heading` is the robot's
    /// current field heading.
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: Rotation2d) -> Self {
        let robot = Translation2d::new(vx, vy).rotate_by(-heading);
        ChassisSpeeds::new(robot.x, robot.y, omega)
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(vx: {:.2} m/s, vy: {:.2} m/s, ω: {:.2} rad/s)",
            self.vx, self.vy, self.omega
        )
    }
}

/// Speed and steering angle of one wheel, either a target or a measurement.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelState {
    /// Signed drive speed (m/s). Negative drives the wheel backwards.
    pub speed: f64,
    /// Steering angle in the robot frame.
    pub angle: Rotation2d,
}

impl WheelState {
    /// Construct a wheel state.
    pub const fn new(speed: f64, angle: Rotation2d) -> Self {
        WheelState { speed, angle }
    }

    /// Choose the kinematically equivalent state that needs the least steering.
    ///
    /// If reaching `self.angle` from `current` takes more than a quarter turn,
    /// the wheel steers to the opposite angle and drives in reverse instead.
    /// A difference of exactly `PI / 2` keeps the original target.
    ///
    /// # Arguments
    ///
    /// * `current`: The wheel's measured steering angle.
    pub fn optimize(self, current: Rotation2d) -> WheelState {
        let delta = self.angle - current;
        if fabs(delta.radians()) > FRAC_PI_2 {
            WheelState::new(-self.speed, self.angle.opposite())
        } else {
            self
        }
    }

    /// Scale the speed by the cosine of the remaining steering error so a wheel
    /// that is still turning does not drive across its target direction.
    pub fn cosine_scaled(self, current: Rotation2d) -> WheelState {
        let error = self.angle - current;
        WheelState::new(self.speed * error.cos(), self.angle)
    }
}

impl fmt::Display for WheelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2} m/s @ {})", self.speed, self.angle)
    }
}

/// Cumulative drive distance and steering angle of one wheel.
///
/// Only differences between consecutive samples are meaningful to odometry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelPosition {
    /// Signed distance traveled since the encoder was last reset (m).
    pub distance: f64,
    /// Absolute steering angle.
    pub angle: Rotation2d,
}

impl WheelPosition {
    /// Construct a wheel position sample.
    pub const fn new(distance: f64, angle: Rotation2d) -> Self {
        WheelPosition { distance, angle }
    }
}
