//! Interfaces to the hardware collaborators of the drive core.
//!
//! Motor, encoder and gyro drivers live outside this crate. The core only
//! reads from them through these traits and hands them target states; any
//! sensor-fault or NaN filtering is the driver's job.

use crate::{Rotation2d, WheelPosition, WheelState};

/// Source of the robot's authoritative heading.
pub trait HeadingProvider {
    /// Current heading, counter-clockwise positive.
    fn heading(&self) -> Rotation2d;

    /// Redefine the current physical orientation as the reference heading.
    ///
    /// Implementations apply their fixed mount offset after zeroing, so
    /// a sensor mounted a quarter turn off the chassis axis still reports the
    /// robot's forward direction as its configured zero.
    fn zero(&mut self);
}

/// Per-wheel sensor readings consumed by odometry.
pub trait ModulePositionSource {
    /// Cumulative signed drive distance (m).
    fn drive_position(&self) -> f64;

    /// Steering angle from the relative (motor) encoder.
    fn turning_position(&self) -> Rotation2d;

    /// Steering angle from the absolute encoder. Read once at calibration to
    /// seed the relative encoder.
    fn absolute_angle(&self) -> Rotation2d;

    /// Zero the drive distance and seed the relative steering encoder from
    /// the absolute one.
    fn reset_encoders(&mut self);

    /// Snapshot of this wheel for odometry.
    fn position(&self) -> WheelPosition {
        WheelPosition::new(self.drive_position(), self.turning_position())
    }
}

/// Closed-loop module controller that executes target wheel states.
pub trait ModuleActuator: ModulePositionSource {
    /// Drive toward the given speed and steering angle.
    fn set_desired_state(&mut self, state: WheelState);

    /// Cut drive and steering output.
    fn stop(&mut self);
}
