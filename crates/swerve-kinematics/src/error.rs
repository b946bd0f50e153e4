//! Error types for the swerve kinematics library.
//!
//! Construction-time problems (bad geometry, bad limits) and lifecycle misuse
//! (reading odometry before it has a baseline) are reported here. Numeric
//! inputs are never validated per cycle; NaN filtering belongs to the sensor
//! drivers.

use core::fmt;

/// Errors that can occur while building or running the swerve drive core.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// A wheel offset was not a finite number.
    InvalidGeometry(&'static str),
    /// The wheel layout makes the forward-kinematics solve singular,
    /// e.g. all four wheels mounted at the same point.
    DegenerateGeometry(&'static str),
    /// The physical maximum wheel speed is not a positive, finite number.
    InvalidMaxSpeed(&'static str),
    /// Odometry was queried or updated before `initialize`/`reset_pose`.
    NotInitialized(&'static str),
    /// The drivetrain was used before `calibrate` completed.
    NotCalibrated(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidGeometry(msg) => write!(f, "Invalid wheel geometry: {}", msg),
            KinematicsError::DegenerateGeometry(msg) => {
                write!(f, "Degenerate wheel geometry: {}", msg)
            }
            KinematicsError::InvalidMaxSpeed(msg) => write!(f, "Invalid max wheel speed: {}", msg),
            KinematicsError::NotInitialized(msg) => write!(f, "Odometry not initialized: {}", msg),
            KinematicsError::NotCalibrated(msg) => write!(f, "Drivetrain not calibrated: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
