//! Swerve inverse and forward kinematics.
//!
//! Every wheel obeys the rigid-body relation `v_wheel = v_chassis + ω × r_wheel`.
//! Stacking the x and y rows of all four wheels gives an 8×3 matrix `A` with
//! `A · [vx, vy, ω]ᵀ = [v0x, v0y, v1x, v1y, …]ᵀ`. Inverse kinematics multiplies
//! by `A`; forward kinematics multiplies by its least-squares pseudo-inverse
//! `(AᵀA)⁻¹Aᵀ`, which is computed once at construction.

use core::array;

use libm::fabs;
use nalgebra::{SMatrix, SVector, Vector3};
use tracing::debug;

use crate::geometry::{NUM_WHEELS, SwerveGeometry};
use crate::rotation::{Rotation2d, Translation2d};
use crate::{ChassisSpeeds, KinematicsError, Twist2d, WheelPosition, WheelState};

/// Wheel vectors at or below this magnitude (m/s) are treated as a stop.
pub const ZERO_SPEED_EPSILON: f64 = 1e-9;

/// Smallest `|det(AᵀA)|` accepted for a usable wheel layout.
const SINGULARITY_EPSILON: f64 = 1e-9;

/// One x row and one y row per wheel.
const WHEEL_ROWS: usize = 2 * NUM_WHEELS;

type InverseMatrix = SMatrix<f64, WHEEL_ROWS, 3>;
type ForwardMatrix = SMatrix<f64, 3, WHEEL_ROWS>;
type WheelVector = SVector<f64, WHEEL_ROWS>;

/// Kinematics helper for a four-wheel swerve drivetrain.
#[derive(Debug, Clone, PartialEq)]
pub struct SwerveKinematics {
    geometry: SwerveGeometry,
    inverse: InverseMatrix,
    forward: ForwardMatrix,
}

impl SwerveKinematics {
    /// Build the kinematic matrices for a wheel layout.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::DegenerateGeometry)` if the layout cannot
    /// distinguish translation from rotation (the forward solve is singular).
    pub fn new(geometry: SwerveGeometry) -> Result<Self, KinematicsError> {
        let mut inverse = InverseMatrix::zeros();
        for (i, wheel) in geometry.wheels().iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -wheel.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = wheel.x;
        }

        let transpose = inverse.transpose();
        let normal = transpose * inverse;
        if fabs(normal.determinant()) < SINGULARITY_EPSILON {
            return Err(KinematicsError::DegenerateGeometry(
                "wheel offsets must not all coincide",
            ));
        }
        let normal_inverse = normal.try_inverse().ok_or(KinematicsError::DegenerateGeometry(
            "forward kinematics matrix is not invertible",
        ))?;
        let forward = normal_inverse * transpose;

        debug!(%geometry, "swerve kinematics constructed");
        Ok(SwerveKinematics {
            geometry,
            inverse,
            forward,
        })
    }

    /// The wheel layout these kinematics were built for.
    pub fn geometry(&self) -> &SwerveGeometry {
        &self.geometry
    }

    /// Calculates the wheel states required to achieve the given chassis speeds.
    /// This is the inverse kinematics problem.
    ///
    /// A wheel whose required velocity is zero has no defined direction. Such a
    /// wheel gets speed `0.0` and keeps the angle given in `held`, normally the
    /// wheel's measured steering angle, so stopping never re-steers a wheel.
    ///
    /// # Arguments
    ///
    /// * `speeds`: The desired robot-frame chassis velocity.
    /// * `held`: Per-wheel angles to keep for wheels that are commanded to stop.
    ///
    /// # Returns
    ///
    /// One target state per wheel, in `WheelLocation` order. Speeds are not yet
    /// desaturated or optimized.
    pub fn to_wheel_states(
        &self,
        speeds: ChassisSpeeds,
        held: &[Rotation2d; NUM_WHEELS],
    ) -> [WheelState; NUM_WHEELS] {
        let wheel_vectors = self.inverse * Vector3::new(speeds.vx, speeds.vy, speeds.omega);

        array::from_fn(|i| {
            let velocity = Translation2d::new(wheel_vectors[2 * i], wheel_vectors[2 * i + 1]);
            let speed = velocity.norm();
            if speed <= ZERO_SPEED_EPSILON {
                WheelState::new(0.0, held[i])
            } else {
                WheelState::new(speed, velocity.angle())
            }
        })
    }

    /// Calculates the chassis speeds that best explain the given wheel states,
    /// in the least-squares sense. This is the forward kinematics problem.
    pub fn to_chassis_speeds(&self, states: &[WheelState; NUM_WHEELS]) -> ChassisSpeeds {
        let wheel_vectors = WheelVector::from_fn(|row, _| {
            let state = &states[row / 2];
            if row % 2 == 0 {
                state.speed * state.angle.cos()
            } else {
                state.speed * state.angle.sin()
            }
        });
        let chassis = self.forward * wheel_vectors;
        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }

    /// Calculates the robot-frame displacement that best explains the wheel
    /// travel between two position snapshots.
    ///
    /// Each wheel is assumed to have rolled its distance delta along its `end`
    /// steering angle.
    pub fn to_twist(
        &self,
        start: &[WheelPosition; NUM_WHEELS],
        end: &[WheelPosition; NUM_WHEELS],
    ) -> Twist2d {
        let wheel_deltas = WheelVector::from_fn(|row, _| {
            let i = row / 2;
            let distance = end[i].distance - start[i].distance;
            if row % 2 == 0 {
                distance * end[i].angle.cos()
            } else {
                distance * end[i].angle.sin()
            }
        });
        let twist = self.forward * wheel_deltas;
        Twist2d {
            dx: twist[0],
            dy: twist[1],
            dtheta: twist[2],
        }
    }
}

/// Rescale wheel speeds so none exceeds `max_speed`, preserving their ratios.
///
/// When the fastest wheel is above the limit every speed is multiplied by
/// `max_speed / max(|speed|)`, so the fastest wheel lands exactly on the limit
/// and the commanded motion keeps its shape. Otherwise the states are left
/// untouched. A non-positive `max_speed` also leaves them untouched.
pub fn desaturate_wheel_speeds(states: &mut [WheelState], max_speed: f64) {
    let fastest = states
        .iter()
        .map(|state| fabs(state.speed))
        .fold(0.0, f64::max);

    if max_speed > 0.0 && fastest > max_speed {
        let scale = max_speed / fastest;
        for state in states.iter_mut() {
            state.speed *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::WheelGeometry;
    use core::f64::consts::{FRAC_PI_2, FRAC_PI_4};
    const EPSILON: f64 = 1e-9;
    const HELD: [Rotation2d; NUM_WHEELS] = [Rotation2d::ZERO; NUM_WHEELS];

    fn square_kinematics() -> SwerveKinematics {
        SwerveKinematics::new(SwerveGeometry::rectangular(0.6, 0.6).unwrap()).unwrap()
    }

    #[test]
    fn test_straight_forward() {
        let kinematics = square_kinematics();
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(2.0, 0.0, 0.0), &HELD);
        for state in states {
            assert!((state.speed - 2.0).abs() < EPSILON);
            assert!(state.angle.radians().abs() < EPSILON);
        }
    }

    #[test]
    fn test_strafe_left() {
        let kinematics = square_kinematics();
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 1.0, 0.0), &HELD);
        for state in states {
            assert!((state.speed - 1.0).abs() < EPSILON);
            assert!((state.angle.radians() - FRAC_PI_2).abs() < EPSILON);
        }
    }

    #[test]
    fn test_in_place_spin_is_tangential() {
        let kinematics = square_kinematics();
        let omega = 2.0;
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 0.0, omega), &HELD);

        for (state, wheel) in states.iter().zip(kinematics.geometry().wheels()) {
            let radius = wheel.offset();
            // speed proportional to radius
            assert!((state.speed - omega * radius.norm()).abs() < EPSILON);
            // direction perpendicular to the radius vector
            let dot = state.angle.cos() * radius.x + state.angle.sin() * radius.y;
            assert!(dot.abs() < EPSILON);
        }
        // Front-left wheel at (+, +) moves toward +135° for counter-clockwise spin
        assert!((states[0].angle.radians() - 3.0 * FRAC_PI_4).abs() < EPSILON);
    }

    #[test]
    fn test_spin_speeds_scale_with_radius() {
        let geometry = SwerveGeometry::new([
            WheelGeometry::new(0.2, 0.2),
            WheelGeometry::new(0.4, -0.4),
            WheelGeometry::new(-0.2, 0.2),
            WheelGeometry::new(-0.4, -0.4),
        ])
        .unwrap();
        let kinematics = SwerveKinematics::new(geometry).unwrap();
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 0.0, 1.0), &HELD);
        assert!((states[1].speed / states[0].speed - 2.0).abs() < EPSILON);
        assert!((states[3].speed / states[2].speed - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_command_holds_angles() {
        let kinematics = square_kinematics();
        let held = [
            Rotation2d::from_degrees(10.0),
            Rotation2d::from_degrees(-20.0),
            Rotation2d::from_degrees(135.0),
            Rotation2d::from_degrees(-90.0),
        ];
        let states = kinematics.to_wheel_states(ChassisSpeeds::default(), &held);
        for (state, angle) in states.iter().zip(held.iter()) {
            assert_eq!(state.speed, 0.0);
            assert_eq!(state.angle, *angle);
        }
    }

    #[test]
    fn test_wheel_at_rotation_center_holds_angle_while_spinning() {
        let geometry = SwerveGeometry::new([
            WheelGeometry::new(0.0, 0.0),
            WheelGeometry::new(0.3, -0.3),
            WheelGeometry::new(-0.3, 0.3),
            WheelGeometry::new(-0.3, -0.3),
        ])
        .unwrap();
        let kinematics = SwerveKinematics::new(geometry).unwrap();
        let held = [Rotation2d::from_degrees(45.0); NUM_WHEELS];
        let states = kinematics.to_wheel_states(ChassisSpeeds::new(0.0, 0.0, 1.0), &held);
        assert_eq!(states[0], WheelState::new(0.0, held[0]));
        assert!(states[1].speed > 0.0);
    }

    #[test]
    fn test_degenerate_geometry_rejected() {
        let geometry = SwerveGeometry::new([WheelGeometry::new(0.1, 0.1); NUM_WHEELS]).unwrap();
        assert!(matches!(
            SwerveKinematics::new(geometry),
            Err(KinematicsError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_forward_recovers_command() {
        let kinematics = square_kinematics();
        let command = ChassisSpeeds::new(1.2, -0.7, 2.5);
        let states = kinematics.to_wheel_states(command, &HELD);
        let recovered = kinematics.to_chassis_speeds(&states);
        assert!((recovered.vx - command.vx).abs() < EPSILON);
        assert!((recovered.vy - command.vy).abs() < EPSILON);
        assert!((recovered.omega - command.omega).abs() < EPSILON);
    }

    #[test]
    fn test_twist_from_equal_forward_deltas() {
        let kinematics = square_kinematics();
        let start = [WheelPosition::new(1.0, Rotation2d::ZERO); NUM_WHEELS];
        let end = [WheelPosition::new(1.5, Rotation2d::ZERO); NUM_WHEELS];
        let twist = kinematics.to_twist(&start, &end);
        assert!((twist.dx - 0.5).abs() < EPSILON);
        assert!(twist.dy.abs() < EPSILON);
        assert!(twist.dtheta.abs() < EPSILON);
    }

    #[test]
    fn test_desaturate_scales_proportionally() {
        let mut states = [
            WheelState::new(6.0, Rotation2d::ZERO),
            WheelState::new(-3.0, Rotation2d::ZERO),
            WheelState::new(1.5, Rotation2d::ZERO),
            WheelState::new(0.0, Rotation2d::ZERO),
        ];
        desaturate_wheel_speeds(&mut states, 4.0);
        assert!((states[0].speed - 4.0).abs() < EPSILON);
        assert!((states[1].speed - (-2.0)).abs() < EPSILON);
        assert!((states[2].speed - 1.0).abs() < EPSILON);
        assert_eq!(states[3].speed, 0.0);
    }

    #[test]
    fn test_desaturate_uses_magnitude_of_reverse_speed() {
        let mut states = [
            WheelState::new(1.0, Rotation2d::ZERO),
            WheelState::new(-8.0, Rotation2d::ZERO),
            WheelState::new(2.0, Rotation2d::ZERO),
            WheelState::new(4.0, Rotation2d::ZERO),
        ];
        desaturate_wheel_speeds(&mut states, 4.0);
        assert!((states[1].speed - (-4.0)).abs() < EPSILON);
        assert!((states[0].speed - 0.5).abs() < EPSILON);
        assert!((states[3].speed - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_desaturate_within_limit_is_identity() {
        let original = [
            WheelState::new(4.0, Rotation2d::ZERO),
            WheelState::new(-4.0, Rotation2d::from_degrees(90.0)),
            WheelState::new(0.25, Rotation2d::ZERO),
            WheelState::new(3.9, Rotation2d::ZERO),
        ];
        let mut states = original;
        desaturate_wheel_speeds(&mut states, 4.0);
        assert_eq!(states, original);

        let mut stopped = [WheelState::default(); NUM_WHEELS];
        desaturate_wheel_speeds(&mut stopped, 4.0);
        assert_eq!(stopped, [WheelState::default(); NUM_WHEELS]);
    }
}
