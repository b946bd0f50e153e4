//! Planar rotations and translations.
//!
//! Every angle stored in a [`Rotation2d`] is normalized to `[-PI, PI)`, so two
//! rotations can be compared directly and a wheel angle that differs from
//! another by exactly `PI` is recognizable as the same heading driven in
//! reverse.

use core::f64::consts::PI;
use core::fmt;
use core::ops::{Add, Neg, Sub};
use libm::{atan2, cos, hypot, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Normalize an angle to be within `[-PI, PI)`.
///
/// Angles at `PI` will be normalized to `-PI`.
///
/// # Arguments
///
/// * `angle`: The angle in radians to normalize.
///
/// # Returns
///
/// The normalized angle in radians.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % (2.0 * PI);
    if a >= PI {
        a - 2.0 * PI
    } else if a < -PI {
        a + 2.0 * PI
    } else {
        a
    }
}

/// A rotation in the plane, counter-clockwise positive.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "f64", into = "f64"))]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Rotation2d {
    radians: f64,
}

impl Rotation2d {
    /// The zero rotation.
    pub const ZERO: Rotation2d = Rotation2d { radians: 0.0 };

    /// Construct a rotation from radians. The value is normalized to `[-PI, PI)`.
    pub fn new(radians: f64) -> Self {
        Rotation2d {
            radians: normalize_angle(radians),
        }
    }

    /// Construct a rotation from degrees.
    pub fn from_degrees(degrees: f64) -> Self {
        Self::new(degrees.to_radians())
    }

    /// Returns the angle in radians, within `[-PI, PI)`.
    pub fn radians(&self) -> f64 {
        self.radians
    }

    /// Returns the angle in degrees, within `[-180, 180)`.
    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }

    /// Cosine of the angle.
    pub fn cos(&self) -> f64 {
        cos(self.radians)
    }

    /// Sine of the angle.
    pub fn sin(&self) -> f64 {
        sin(self.radians)
    }

    /// Compose this rotation with `other`.
    pub fn rotate_by(self, other: Rotation2d) -> Self {
        Self::new(self.radians + other.radians)
    }

    /// The rotation pointing the opposite way (this rotation plus `PI`).
    pub fn opposite(self) -> Self {
        Self::new(self.radians + PI)
    }
}

impl From<f64> for Rotation2d {
    fn from(radians: f64) -> Self {
        Rotation2d::new(radians)
    }
}

impl From<Rotation2d> for f64 {
    fn from(rotation: Rotation2d) -> Self {
        rotation.radians
    }
}

impl Add for Rotation2d {
    type Output = Rotation2d;

    fn add(self, rhs: Rotation2d) -> Rotation2d {
        self.rotate_by(rhs)
    }
}

impl Sub for Rotation2d {
    type Output = Rotation2d;

    /// The shortest signed angular distance from `rhs` to `self`.
    fn sub(self, rhs: Rotation2d) -> Rotation2d {
        Rotation2d::new(self.radians - rhs.radians)
    }
}

impl Neg for Rotation2d {
    type Output = Rotation2d;

    fn neg(self) -> Rotation2d {
        Rotation2d::new(-self.radians)
    }
}

impl fmt::Display for Rotation2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°", self.degrees())
    }
}

/// A 2-D vector in meters (or meters per second when used for wheel velocities).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Translation2d {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
}

impl Translation2d {
    /// Construct a new translation.
    pub const fn new(x: f64, y: f64) -> Self {
        Translation2d { x, y }
    }

    /// Euclidean length of the vector.
    pub fn norm(&self) -> f64 {
        hypot(self.x, self.y)
    }

    /// Direction of the vector. The zero vector reports a zero rotation.
    pub fn angle(&self) -> Rotation2d {
        Rotation2d::new(atan2(self.y, self.x))
    }

    /// Rotate the vector counter-clockwise by `rotation`.
    pub fn rotate_by(self, rotation: Rotation2d) -> Self {
        let (c, s) = (rotation.cos(), rotation.sin());
        Translation2d {
            x: self.x * c - self.y * s,
            y: self.x * s + self.y * c,
        }
    }
}

impl Add for Translation2d {
    type Output = Translation2d;

    fn add(self, rhs: Translation2d) -> Translation2d {
        Translation2d::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Translation2d {
    type Output = Translation2d;

    fn sub(self, rhs: Translation2d) -> Translation2d {
        Translation2d::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Translation2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}
