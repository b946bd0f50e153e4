//! Static wheel layout of the drivetrain.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::KinematicsError;
use crate::rotation::Translation2d;

/// Number of independently steered wheels on the drivetrain.
pub const NUM_WHEELS: usize = 4;

/// Where a wheel sits on the chassis. Arrays of per-wheel values always use
/// this order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelLocation {
    /// Front left wheel, index 0.
    FrontLeft,
    /// Front right wheel, index 1.
    FrontRight,
    /// Back left wheel, index 2.
    BackLeft,
    /// Back right wheel, index 3.
    BackRight,
}

impl WheelLocation {
    /// All wheel locations in array order.
    pub const ALL: [WheelLocation; NUM_WHEELS] = [
        WheelLocation::FrontLeft,
        WheelLocation::FrontRight,
        WheelLocation::BackLeft,
        WheelLocation::BackRight,
    ];

    /// Index of this wheel in per-wheel arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short human readable name, used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            WheelLocation::FrontLeft => "front_left",
            WheelLocation::FrontRight => "front_right",
            WheelLocation::BackLeft => "back_left",
            WheelLocation::BackRight => "back_right",
        }
    }
}

impl fmt::Display for WheelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Offset of a wheel's contact point from the robot's rotation center, in
/// robot-frame meters (x forward, y left).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelGeometry {
    /// Forward offset (m).
    pub x: f64,
    /// Leftward offset (m).
    pub y: f64,
}

impl WheelGeometry {
    /// Construct a wheel offset.
    pub const fn new(x: f64, y: f64) -> Self {
        WheelGeometry { x, y }
    }

    /// The offset as a vector.
    pub fn offset(&self) -> Translation2d {
        Translation2d::new(self.x, self.y)
    }
}

/// The four wheel offsets of a swerve drivetrain. Fixed once constructed.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwerveGeometry {
    wheels: [WheelGeometry; NUM_WHEELS],
}

impl SwerveGeometry {
    /// Construct the layout from four offsets ordered front-left, front-right,
    /// back-left, back-right.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidGeometry)` if any offset is not finite.
    /// Singular layouts are rejected later by `SwerveKinematics::new`.
    pub fn new(wheels: [WheelGeometry; NUM_WHEELS]) -> Result<Self, KinematicsError> {
        if wheels.iter().any(|w| !w.x.is_finite() || !w.y.is_finite()) {
            return Err(KinematicsError::InvalidGeometry("offsets must be finite"));
        }
        Ok(SwerveGeometry { wheels })
    }

    /// Symmetric rectangular layout centered on the rotation center.
    ///
    /// # Arguments
    ///
    /// * `wheelbase`: Distance between front and back axles (m).
    /// * `track_width`: Distance between left and right wheels (m).
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidGeometry)` if either dimension is not positive.
    pub fn rectangular(wheelbase: f64, track_width: f64) -> Result<Self, KinematicsError> {
        if !(wheelbase > 0.0) || !(track_width > 0.0) {
            return Err(KinematicsError::InvalidGeometry(
                "wheelbase and track width must be positive",
            ));
        }
        let (hx, hy) = (wheelbase / 2.0, track_width / 2.0);
        Self::new([
            WheelGeometry::new(hx, hy),
            WheelGeometry::new(hx, -hy),
            WheelGeometry::new(-hx, hy),
            WheelGeometry::new(-hx, -hy),
        ])
    }

    /// All four offsets in array order.
    pub fn wheels(&self) -> &[WheelGeometry; NUM_WHEELS] {
        &self.wheels
    }

    /// Offset of a single wheel.
    pub fn wheel(&self, location: WheelLocation) -> WheelGeometry {
        self.wheels[location.index()]
    }
}

impl fmt::Display for SwerveGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwerveGeometry [")?;
        for (location, wheel) in WheelLocation::ALL.iter().zip(self.wheels.iter()) {
            write!(f, " {}: {}", location, wheel.offset())?;
        }
        write!(f, " ]")
    }
}
