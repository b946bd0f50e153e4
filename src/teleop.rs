use std::sync::Arc;
use std::time::Duration;

use swerve_kinematics::Pose2d;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::blackboard::{Blackboard, raise_fault, snapshot};
use crate::bus::Topic;
use crate::config::ScriptSegment;

/// Velocity command from the command source to the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
    /// Interpret `vx`/`vy` along the field axes instead of the robot axes.
    pub field_relative: bool,
}

/// Replays the command script at the control rate, then commands a stop.
pub async fn run_script(
    script: Vec<ScriptSegment>,
    period: Duration,
    cmd_tx: Topic<DriveCommand>,
) -> anyhow::Result<()> {
    info!(segments = script.len(), "Command script started.");
    let mut ticker = time::interval(period);

    for (i, segment) in script.iter().enumerate() {
        let command = segment.command();
        info!(
            segment = i + 1,
            vx = command.vx,
            vy = command.vy,
            omega = command.omega,
            field_relative = command.field_relative,
            duration_ms = segment.duration_ms,
            "Starting script segment"
        );
        let started = Instant::now();
        while started.elapsed() < segment.duration() {
            ticker.tick().await;
            cmd_tx.publish(command);
        }
    }

    // Hold a stop long enough for the control loop to pick it up
    for _ in 0..3 {
        ticker.tick().await;
        cmd_tx.publish(DriveCommand::default());
    }
    info!("Command script finished.");
    Ok(())
}

/// Flags an e-stop whenever no command has arrived within `timeout`.
pub async fn watchdog(bb: Blackboard, timeout: Duration) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let mut tick = time::interval(timeout / 4);
    loop {
        tick.tick().await;
        let last_cmd_ts = snapshot(&bb).last_cmd_ts;
        let age = Instant::now() - last_cmd_ts;
        let stale = age > timeout;
        let was_estopped = snapshot(&bb).estopped;
        if stale && !was_estopped {
            warn!(?age, "Drive command timeout! Triggering E-stop.");
            bb.write().estopped = true;
            raise_fault(&bb, "drive command timeout");
        } else if !stale && was_estopped {
            info!("Drive commands resumed, clearing E-stop.");
            bb.write().estopped = false;
        }
    }
}

/// Logs every `every`th pose published by the control loop.
pub async fn log_poses(
    mut pose_rx: broadcast::Receiver<Arc<Pose2d>>,
    every: u64,
) -> anyhow::Result<()> {
    let mut received: u64 = 0;
    loop {
        match pose_rx.recv().await {
            Ok(pose) => {
                received += 1;
                if received % every == 0 {
                    info!(cycle = received, %pose, "Pose estimate");
                } else {
                    debug!(cycle = received, %pose, "Pose estimate");
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Pose receiver lagged by {} messages.", n);
                received += n;
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!(received, "Pose channel closed, telemetry stopping.");
                return Ok(());
            }
        }
    }
}

/// Runs the script alongside the watchdog; returns when the script ends.
pub async fn async_runtime(
    bb: Blackboard,
    script: Vec<ScriptSegment>,
    period: Duration,
    watchdog_timeout: Duration,
    cmd_tx: Topic<DriveCommand>,
) -> anyhow::Result<()> {
    info!("Async runtime started.");
    tokio::select! {
        result = run_script(script, period, cmd_tx) => result?,
        result = watchdog(bb, watchdog_timeout) => {
            error!("Watchdog exited unexpectedly.");
            result?
        }
    }
    info!("Async runtime finished.");
    Ok(())
}
