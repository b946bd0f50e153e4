use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;

use swerve_kinematics::Pose2d;

/// State shared between the control thread and the async tasks.
#[derive(Clone)]
pub struct State {
    /// Latest odometry estimate; `None` until the first control cycle.
    pub pose: Option<Pose2d>,
    pub cycles: u64,
    pub last_cmd_ts: Instant,
    /// Set by the watchdog when commands go stale; the control loop stops the modules.
    pub estopped: bool,
    pub shutdown: bool,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pose: None,
            cycles: 0,
            last_cmd_ts: Instant::now(),
            estopped: false,
            shutdown: false,
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn touch_cmd(bb: &Blackboard) {
    bb.write().last_cmd_ts = Instant::now();
}

pub fn record_pose(bb: &Blackboard, pose: Pose2d) {
    let mut g = bb.write();
    g.pose = Some(pose);
    g.cycles += 1;
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn request_shutdown(bb: &Blackboard) {
    bb.write().shutdown = true;
}
