mod blackboard; // shared run state between the control thread and async tasks
mod bus; // broadcast topics
mod config;
mod control; // fixed-rate drivetrain loop
mod sim;
mod teleop; // scripted commands, watchdog, pose telemetry

use std::sync::Arc;

use anyhow::anyhow;
use swerve_kinematics::Pose2d;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

use blackboard::{Blackboard, request_shutdown, snapshot};
use bus::Topic;
use config::{DEFAULT_CONFIG_PATH, load_config};
use control::ControlLoop;
use teleop::DriveCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let settings = load_config(&path)?;
    info!("Swerve drive simulation starting.");

    let control = ControlLoop::new(&settings)?;
    let period = settings.control.period();

    let bb: Blackboard = Arc::default();
    let cmd_topic: Topic<DriveCommand> = Topic::new("drive_command", 16);
    let pose_topic: Topic<Pose2d> = Topic::new("pose", 64);

    let telemetry = tokio::spawn(teleop::log_poses(
        pose_topic.subscribe(),
        settings.control.telemetry_every,
    ));
    let control_thread = control::spawn(control, period, bb.clone(), &cmd_topic, pose_topic)?;

    let result = teleop::async_runtime(
        bb.clone(),
        settings.script.clone(),
        period,
        settings.control.watchdog_timeout(),
        cmd_topic,
    )
    .await;
    if let Err(e) = &result {
        error!("Async tasks failed: {:?}", e);
    }

    request_shutdown(&bb);
    let summary = tokio::task::spawn_blocking(move || control_thread.join())
        .await?
        .map_err(|_| anyhow!("control thread panicked"))??;
    telemetry.await??;
    result?;

    info!(
        cycles = summary.cycles,
        estimate = %summary.estimate,
        truth = %summary.truth,
        position_error = summary.position_error(),
        "Run complete"
    );
    let state = snapshot(&bb);
    if let Some(pose) = state.pose {
        info!(cycles = state.cycles, %pose, "Last published pose");
    }
    if !state.faults.is_empty() {
        warn!(faults = ?state.faults, "Faults raised during the run");
    }
    Ok(())
}
