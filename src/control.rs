use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use spin_sleep::SpinSleeper;
use swerve_kinematics::{ChassisSpeeds, Pose2d, SwerveDrive, SwerveKinematics};
use tracing::{debug, error, info};

use crate::blackboard::{Blackboard, raise_fault, record_pose, touch_cmd};
use crate::bus::Topic;
use crate::config::Settings;
use crate::sim::{SimGyro, SimModule, SimWorld};
use crate::teleop::DriveCommand;

/// Where the run ended, as estimated and as simulated.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub estimate: Pose2d,
    pub truth: Pose2d,
    pub cycles: u64,
}

impl RunSummary {
    /// Distance between the estimated and true positions (m).
    pub fn position_error(&self) -> f64 {
        (self.estimate.translation() - self.truth.translation()).norm()
    }
}

/// One drivetrain plus the world it drives in.
pub struct ControlLoop {
    drive: SwerveDrive<SimModule, SimGyro>,
    world: SimWorld,
    command: DriveCommand,
    cycles: u64,
}

impl ControlLoop {
    /// Build the simulated drivetrain from `settings` and calibrate it.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let geometry = settings.drivetrain.geometry()?;
        info!(%geometry, "drivetrain geometry");
        let kinematics = SwerveKinematics::new(geometry).context("building kinematics")?;

        let world = SimWorld::new(
            kinematics.clone(),
            &settings.sim,
            settings.drivetrain.heading_offset(),
        );
        let gyro = world.gyro();
        let mut drive = SwerveDrive::new(
            world.modules(),
            gyro,
            kinematics,
            settings.drivetrain.max_wheel_speed,
        )
        .context("building drivetrain")?;

        let pose = drive.calibrate();
        info!(%pose, "starting pose");
        Ok(ControlLoop {
            drive,
            world,
            command: DriveCommand::default(),
            cycles: 0,
        })
    }

    /// Apply the newest command (or stop when e-stopped), advance the world by
    /// `dt` seconds and return the updated estimate.
    pub fn cycle(
        &mut self,
        command: Option<DriveCommand>,
        estopped: bool,
        dt: f64,
    ) -> anyhow::Result<Pose2d> {
        if let Some(command) = command {
            self.command = command;
        }

        if estopped {
            self.drive.stop();
        } else {
            let DriveCommand { vx, vy, omega, field_relative } = self.command;
            let sent = if field_relative {
                self.drive.drive_field_relative(vx, vy, omega)?
            } else {
                self.drive.drive(ChassisSpeeds::new(vx, vy, omega))?
            };
            debug!(?sent, "wheel targets");
        }

        self.world.step(dt);
        let pose = self.drive.periodic()?;
        self.cycles += 1;
        Ok(pose)
    }

    pub fn stop(&mut self) {
        self.drive.stop();
    }

    pub fn summary(&self) -> anyhow::Result<RunSummary> {
        Ok(RunSummary {
            estimate: self.drive.pose()?,
            truth: self.world.true_pose(),
            cycles: self.cycles,
        })
    }
}

/// Run `control` on a dedicated thread at `period` until shutdown is requested.
pub fn spawn(
    mut control: ControlLoop,
    period: Duration,
    bb: Blackboard,
    cmd_topic: &Topic<DriveCommand>,
    pose_topic: Topic<Pose2d>,
) -> anyhow::Result<JoinHandle<anyhow::Result<RunSummary>>> {
    info!("Spawning control thread...");
    let mut cmd_rx = cmd_topic.subscribe();
    let cmd_topic = cmd_topic.clone();
    let handle = thread::Builder::new()
        .name("control".into())
        .spawn(move || {
            info!("Control thread started.");
            let sleeper = SpinSleeper::new(1_000);
            let dt = period.as_secs_f64();
            loop {
                let (estopped, shutdown) = {
                    let g = bb.read();
                    (g.estopped, g.shutdown)
                };
                if shutdown {
                    break;
                }

                let command = cmd_topic.latest(&mut cmd_rx).map(|cmd| *cmd);
                if command.is_some() {
                    touch_cmd(&bb);
                }
                let pose = match control.cycle(command, estopped, dt) {
                    Ok(pose) => pose,
                    Err(e) => {
                        error!("Control cycle failed: {:?}", e);
                        raise_fault(&bb, "control cycle failed");
                        control.stop();
                        return Err(e);
                    }
                };
                record_pose(&bb, pose);
                pose_topic.publish(pose);
                sleeper.sleep(period);
            }

            control.stop();
            let summary = control.summary()?;
            info!(cycles = summary.cycles, "Control thread stopped.");
            Ok(summary)
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    use crate::blackboard::{request_shutdown, snapshot};

    const DT: f64 = 0.02;

    fn settings(power_on: &str) -> Settings {
        settings_facing(power_on, 0.0)
    }

    fn settings_facing(power_on: &str, heading_offset_deg: f64) -> Settings {
        let text = format!(
            r#"
            [drivetrain]
            wheel_offsets = [[0.25, 0.25], [0.25, -0.25], [-0.25, 0.25], [-0.25, -0.25]]
            max_wheel_speed = 4.0
            heading_offset_deg = {heading_offset_deg:?}

            [control]
            period_ms = 20
            watchdog_timeout_ms = 100

            [sim]
            steer_rate = 12.0
            power_on_angles_deg = {power_on}
            "#
        );
        Settings::from_toml(&text).unwrap()
    }

    fn forward(vx: f64) -> Option<DriveCommand> {
        Some(DriveCommand { vx, ..Default::default() })
    }

    #[test]
    fn straight_run_matches_truth() {
        let mut control = ControlLoop::new(&settings("[0.0, 0.0, 0.0, 0.0]")).unwrap();
        control.cycle(forward(1.0), false, DT).unwrap();
        for _ in 1..50 {
            control.cycle(None, false, DT).unwrap();
        }
        let summary = control.summary().unwrap();
        assert_eq!(summary.cycles, 50);
        assert_abs_diff_eq!(summary.estimate.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.estimate.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.position_error(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn heading_offset_is_shared_by_estimate_and_truth() {
        let mut control =
            ControlLoop::new(&settings_facing("[0.0, 0.0, 0.0, 0.0]", -90.0)).unwrap();
        for _ in 0..50 {
            control.cycle(forward(1.0), false, DT).unwrap();
        }
        let summary = control.summary().unwrap();
        // Robot forward is field -y after zeroing with a -90° mount offset
        assert_abs_diff_eq!(summary.truth.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.truth.y, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.estimate.y, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.position_error(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            summary.estimate.heading.radians(),
            summary.truth.heading.radians(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn misaligned_wheels_are_calibrated_before_driving() {
        // Relative encoders power on at zero wherever the wheels point; after
        // calibration they report the true angles and the modules steer home.
        let mut control = ControlLoop::new(&settings("[35.0, -60.0, 120.0, 10.0]")).unwrap();
        for _ in 0..100 {
            control.cycle(forward(1.0), false, DT).unwrap();
        }
        let summary = control.summary().unwrap();
        assert!(summary.truth.x > 1.5);
        assert!(summary.position_error() < 0.05);
    }

    #[test]
    fn heading_follows_the_gyro() {
        let mut control = ControlLoop::new(&settings("[0.0, 0.0, 0.0, 0.0]")).unwrap();
        let spin = Some(DriveCommand { omega: 1.0, ..Default::default() });
        for _ in 0..50 {
            control.cycle(spin, false, DT).unwrap();
        }
        let summary = control.summary().unwrap();
        assert!(summary.truth.heading.radians() > 0.5);
        assert_abs_diff_eq!(
            summary.estimate.heading.radians(),
            summary.truth.heading.radians(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn estop_holds_position() {
        let mut control = ControlLoop::new(&settings("[0.0, 0.0, 0.0, 0.0]")).unwrap();
        control.cycle(forward(1.0), false, DT).unwrap();
        let before = control.cycle(None, false, DT).unwrap();
        for _ in 0..10 {
            control.cycle(None, true, DT).unwrap();
        }
        let after = control.summary().unwrap().estimate;
        assert_abs_diff_eq!(after.x, before.x, epsilon = 1e-12);
    }

    #[test]
    fn thread_runs_until_shutdown() {
        let control = ControlLoop::new(&settings("[0.0, 0.0, 0.0, 0.0]")).unwrap();
        let bb: Blackboard = Arc::default();
        let cmd_topic: Topic<DriveCommand> = Topic::new("cmd", 16);
        let pose_topic: Topic<Pose2d> = Topic::new("pose", 64);

        let handle = spawn(control, Duration::from_millis(2), bb.clone(), &cmd_topic, pose_topic)
            .unwrap();
        cmd_topic.publish(DriveCommand { vx: 0.5, ..Default::default() });
        thread::sleep(Duration::from_millis(50));
        request_shutdown(&bb);

        let summary = handle.join().unwrap().unwrap();
        assert!(summary.cycles > 0);
        assert_eq!(snapshot(&bb).cycles, summary.cycles);
        assert!(summary.estimate.x > 0.0);
    }
}
