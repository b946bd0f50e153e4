//! Heading-authoritative swerve odometry.
//!
//! Wheel deltas are solved for a robot-frame translation; the external
//! heading sensor alone decides orientation. The rotation that the wheel solve
//! also produces is reported for diagnostics and otherwise discarded.

use tracing::{debug, trace};

use crate::geometry::NUM_WHEELS;
use crate::kinematics::SwerveKinematics;
use crate::rotation::{Rotation2d, Translation2d};
use crate::{KinematicsError, Pose2d, Twist2d, WheelPosition};

/// Baseline held while tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tracking {
    pose: Pose2d,
    previous_positions: [WheelPosition; NUM_WHEELS],
    previous_heading: Rotation2d,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OdometryState {
    Uninitialized,
    Tracking(Tracking),
}

/// Result of one odometry step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometryUpdate {
    /// The new field-frame pose.
    pub pose: Pose2d,
    /// Raw robot-frame displacement solved from the wheel deltas.
    pub twist: Twist2d,
    /// Heading change reported by the heading sensor over the same step (rad).
    pub heading_delta: f64,
}

impl OdometryUpdate {
    /// Disagreement between the wheel-derived rotation and the sensor's (rad).
    pub fn heading_disagreement(&self) -> f64 {
        self.twist.dtheta - self.heading_delta
    }
}

/// Tracks the robot pose from wheel positions and heading readings.
#[derive(Debug, Clone, PartialEq)]
pub struct SwerveOdometry {
    kinematics: SwerveKinematics,
    state: OdometryState,
}

impl SwerveOdometry {
    /// Create an uninitialized estimator.
    pub fn new(kinematics: SwerveKinematics) -> Self {
        SwerveOdometry {
            kinematics,
            state: OdometryState::Uninitialized,
        }
    }

    /// Whether a baseline has been established.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, OdometryState::Tracking(_))
    }

    /// Set the starting pose and the first wheel-position baseline.
    ///
    /// The heading is authoritative, so the stored pose takes `initial_heading`
    /// as its orientation regardless of `initial_pose.heading`.
    pub fn initialize(
        &mut self,
        initial_pose: Pose2d,
        initial_positions: &[WheelPosition; NUM_WHEELS],
        initial_heading: Rotation2d,
    ) {
        let pose = Pose2d::new(initial_pose.x, initial_pose.y, initial_heading);
        debug!(%pose, "odometry initialized");
        self.state = OdometryState::Tracking(Tracking {
            pose,
            previous_positions: *initial_positions,
            previous_heading: initial_heading,
        });
    }

    /// Overwrite the tracked pose and rebase on the current wheel positions,
    /// e.g. after an external localization fix. Valid in either state.
    ///
    /// The pose's heading stands until the next `update` replaces it with the
    /// sensor reading.
    pub fn reset_pose(&mut self, pose: Pose2d, positions: &[WheelPosition; NUM_WHEELS]) {
        debug!(%pose, "odometry pose reset");
        self.state = OdometryState::Tracking(Tracking {
            pose,
            previous_positions: *positions,
            previous_heading: pose.heading,
        });
    }

    /// Advance the pose by one sample.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotInitialized)` if no baseline exists yet.
    pub fn update(
        &mut self,
        positions: &[WheelPosition; NUM_WHEELS],
        heading: Rotation2d,
    ) -> Result<OdometryUpdate, KinematicsError> {
        let OdometryState::Tracking(tracking) = &mut self.state else {
            return Err(KinematicsError::NotInitialized(
                "update called before initialize",
            ));
        };

        let twist = self.kinematics.to_twist(&tracking.previous_positions, positions);
        let field_delta = Translation2d::new(twist.dx, twist.dy).rotate_by(heading);
        let heading_delta = (heading - tracking.previous_heading).radians();

        let pose = Pose2d::new(
            tracking.pose.x + field_delta.x,
            tracking.pose.y + field_delta.y,
            heading,
        );
        tracking.pose = pose;
        tracking.previous_positions = *positions;
        tracking.previous_heading = heading;

        let update = OdometryUpdate {
            pose,
            twist,
            heading_delta,
        };
        trace!(
            kinematic_dtheta = twist.dtheta,
            heading_delta,
            disagreement = update.heading_disagreement(),
            "odometry step"
        );
        Ok(update)
    }

    /// The current pose estimate.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotInitialized)` if no baseline exists yet.
    pub fn pose(&self) -> Result<Pose2d, KinematicsError> {
        match &self.state {
            OdometryState::Tracking(tracking) => Ok(tracking.pose),
            OdometryState::Uninitialized => Err(KinematicsError::NotInitialized(
                "pose requested before initialize",
            )),
        }
    }

    /// The kinematics used for the wheel solve.
    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }
}
