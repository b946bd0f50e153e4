//! Drivetrain lifecycle: calibration, command pipeline and odometry.
//!
//! A [`SwerveDrive`] starts `Uncalibrated`. `calibrate` zeroes the heading,
//! seeds the module encoders and establishes the odometry baseline in one
//! synchronous call; until it has run every command and pose query fails with
//! `KinematicsError::NotCalibrated`.

use core::array;
use core::fmt;

use libm::fabs;
use tracing::{debug, info};

use crate::geometry::{NUM_WHEELS, WheelLocation};
use crate::hardware::{HeadingProvider, ModuleActuator};
use crate::kinematics::{SwerveKinematics, desaturate_wheel_speeds};
use crate::odometry::SwerveOdometry;
use crate::{ChassisSpeeds, KinematicsError, Pose2d, Rotation2d, WheelPosition, WheelState};

/// Per-step wheel/sensor rotation mismatch (rad) worth a debug event.
const HEADING_DISAGREEMENT_WARN: f64 = 0.05;

/// Lifecycle state of the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    /// Sensors have not been zeroed; nothing may be commanded or read.
    Uncalibrated,
    /// Calibration done; odometry is tracking.
    Ready,
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveState::Uncalibrated => f.write_str("uncalibrated"),
            DriveState::Ready => f.write_str("ready"),
        }
    }
}

/// Four swerve modules, a heading sensor and the kinematics tying them together.
///
/// Owned by whatever drives the control loop and borrowed mutably once per
/// cycle; there is no global instance.
pub struct SwerveDrive<M, H> {
    modules: [M; NUM_WHEELS],
    heading: H,
    kinematics: SwerveKinematics,
    odometry: SwerveOdometry,
    max_wheel_speed: f64,
    state: DriveState,
}

impl<M, H> SwerveDrive<M, H>
where
    M: ModuleActuator,
    H: HeadingProvider,
{
    /// Assemble a drivetrain. Modules are ordered as `WheelLocation::ALL`.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidMaxSpeed)` if `max_wheel_speed` is
    /// not positive and finite.
    pub fn new(
        modules: [M; NUM_WHEELS],
        heading: H,
        kinematics: SwerveKinematics,
        max_wheel_speed: f64,
    ) -> Result<Self, KinematicsError> {
        if !(max_wheel_speed > 0.0) || !max_wheel_speed.is_finite() {
            return Err(KinematicsError::InvalidMaxSpeed(
                "must be positive and finite",
            ));
        }
        let odometry = SwerveOdometry::new(kinematics.clone());
        Ok(SwerveDrive {
            modules,
            heading,
            kinematics,
            odometry,
            max_wheel_speed,
            state: DriveState::Uncalibrated,
        })
    }

    /// Zero the heading, seed the module encoders, stop the modules and start
    /// odometry at the origin. May be called again to re-zero everything.
    pub fn calibrate(&mut self) -> Pose2d {
        self.heading.zero();
        for module in self.modules.iter_mut() {
            module.reset_encoders();
            module.stop();
        }
        for location in WheelLocation::ALL {
            let module = &self.modules[location.index()];
            debug!(
                wheel = location.name(),
                absolute = module.absolute_angle().degrees(),
                turning = module.turning_position().degrees(),
                "module encoders seeded"
            );
        }

        let positions = self.wheel_positions();
        let heading = self.heading.heading();
        self.odometry.initialize(Pose2d::default(), &positions, heading);
        self.state = DriveState::Ready;

        let pose = Pose2d::new(0.0, 0.0, heading);
        info!(%heading, "drivetrain calibrated");
        pose
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriveState {
        self.state
    }

    /// Whether `calibrate` has completed.
    pub fn is_ready(&self) -> bool {
        self.state == DriveState::Ready
    }

    fn ensure_ready(&self, action: &'static str) -> Result<(), KinematicsError> {
        match self.state {
            DriveState::Ready => Ok(()),
            DriveState::Uncalibrated => Err(KinematicsError::NotCalibrated(action)),
        }
    }

    /// Command a robot-frame chassis velocity.
    ///
    /// Wheels commanded to stop keep their measured steering angle.
    ///
    /// # Returns
    ///
    /// The desaturated, optimized states sent to the modules.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotCalibrated)` before `calibrate`.
    pub fn drive(
        &mut self,
        speeds: ChassisSpeeds,
    ) -> Result<[WheelState; NUM_WHEELS], KinematicsError> {
        self.ensure_ready("drive called before calibrate")?;
        let held = self.turning_positions();
        let states = self.kinematics.to_wheel_states(speeds, &held);
        self.set_wheel_states(states)
    }

    /// Command a field-relative velocity using the current sensor heading.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotCalibrated)` before `calibrate`.
    pub fn drive_field_relative(
        &mut self,
        vx: f64,
        vy: f64,
        omega: f64,
    ) -> Result<[WheelState; NUM_WHEELS], KinematicsError> {
        let heading = self.heading.heading();
        self.drive(ChassisSpeeds::from_field_relative(vx, vy, omega, heading))
    }

    /// Desaturate the targets, optimize each against its module's measured
    /// angle, scale its speed by the cosine of the remaining steering error and
    /// hand them to the modules.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotCalibrated)` before `calibrate`.
    pub fn set_wheel_states(
        &mut self,
        mut states: [WheelState; NUM_WHEELS],
    ) -> Result<[WheelState; NUM_WHEELS], KinematicsError> {
        self.ensure_ready("wheel states set before calibrate")?;
        desaturate_wheel_speeds(&mut states, self.max_wheel_speed);

        let targets: [WheelState; NUM_WHEELS] = array::from_fn(|i| {
            let current = self.modules[i].turning_position();
            states[i].optimize(current).cosine_scaled(current)
        });
        for (module, state) in self.modules.iter_mut().zip(targets) {
            module.set_desired_state(state);
        }
        Ok(targets)
    }

    /// Stop every module. Allowed in any state.
    pub fn stop(&mut self) {
        for module in self.modules.iter_mut() {
            module.stop();
        }
    }

    /// Run one odometry step from the current sensor readings.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotCalibrated)` before `calibrate`.
    pub fn periodic(&mut self) -> Result<Pose2d, KinematicsError> {
        self.ensure_ready("periodic called before calibrate")?;
        let positions = self.wheel_positions();
        let heading = self.heading.heading();
        let update = self.odometry.update(&positions, heading)?;
        if fabs(update.heading_disagreement()) > HEADING_DISAGREEMENT_WARN {
            debug!(
                disagreement = update.heading_disagreement(),
                "wheel rotation disagrees with heading sensor"
            );
        }
        Ok(update.pose)
    }

    /// The current pose estimate.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotCalibrated)` before `calibrate`.
    pub fn pose(&self) -> Result<Pose2d, KinematicsError> {
        self.ensure_ready("pose requested before calibrate")?;
        self.odometry.pose()
    }

    /// Replace the pose estimate with an external fix.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NotCalibrated)` before `calibrate`.
    pub fn reset_pose(&mut self, pose: Pose2d) -> Result<(), KinematicsError> {
        self.ensure_ready("pose reset before calibrate")?;
        let positions = self.wheel_positions();
        self.odometry.reset_pose(pose, &positions);
        info!(%pose, "drivetrain pose reset");
        Ok(())
    }

    /// Current sensor heading.
    pub fn heading(&self) -> Rotation2d {
        self.heading.heading()
    }

    /// Current position of every wheel.
    pub fn wheel_positions(&self) -> [WheelPosition; NUM_WHEELS] {
        array::from_fn(|i| self.modules[i].position())
    }

    fn turning_positions(&self) -> [Rotation2d; NUM_WHEELS] {
        array::from_fn(|i| self.modules[i].turning_position())
    }

    /// The drivetrain's kinematics.
    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    /// Physical maximum wheel speed (m/s).
    pub fn max_wheel_speed(&self) -> f64 {
        self.max_wheel_speed
    }

    /// Borrow one module.
    pub fn module(&self, location: WheelLocation) -> &M {
        &self.modules[location.index()]
    }
}
