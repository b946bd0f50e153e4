use std::time::Duration;

use anyhow::{Context, ensure};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use swerve_kinematics::{NUM_WHEELS, Rotation2d, SwerveGeometry, WheelGeometry};
use tracing::{error, info};

use crate::teleop::DriveCommand;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub drivetrain: DrivetrainSettings,
    pub control: ControlSettings,
    #[serde(default)]
    pub sim: SimSettings,
    #[serde(default)]
    pub script: Vec<ScriptSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrivetrainSettings {
    /// [x, y] per wheel, front-left, front-right, back-left, back-right.
    pub wheel_offsets: [[f64; 2]; NUM_WHEELS],
    pub max_wheel_speed: f64,
    #[serde(default)]
    pub heading_offset_deg: f64,
}

impl DrivetrainSettings {
    pub fn geometry(&self) -> anyhow::Result<SwerveGeometry> {
        let wheels = self.wheel_offsets.map(|[x, y]| WheelGeometry::new(x, y));
        SwerveGeometry::new(wheels).context("invalid drivetrain.wheel_offsets")
    }

    pub fn heading_offset(&self) -> Rotation2d {
        Rotation2d::from_degrees(self.heading_offset_deg)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlSettings {
    pub period_ms: u64,
    pub watchdog_timeout_ms: u64,
    /// Log every Nth pose.
    #[serde(default = "default_telemetry_every")]
    pub telemetry_every: u64,
}

fn default_telemetry_every() -> u64 {
    25
}

impl ControlSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimSettings {
    /// Steering slew rate of the simulated modules (rad/s).
    pub steer_rate: f64,
    pub power_on_angles_deg: [f64; NUM_WHEELS],
}

impl Default for SimSettings {
    fn default() -> Self {
        SimSettings {
            steer_rate: 12.0,
            power_on_angles_deg: [0.0; NUM_WHEELS],
        }
    }
}

/// One leg of the scripted command sequence.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptSegment {
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    #[serde(default)]
    pub omega: f64,
    pub duration_ms: u64,
    #[serde(default)]
    pub field_relative: bool,
}

impl ScriptSegment {
    pub fn command(&self) -> DriveCommand {
        DriveCommand {
            vx: self.vx,
            vy: self.vy,
            omega: self.omega,
            field_relative: self.field_relative,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Settings {
    fn validate(self) -> anyhow::Result<Self> {
        ensure!(self.control.period_ms > 0, "control.period_ms must be positive");
        ensure!(
            self.control.watchdog_timeout_ms > self.control.period_ms,
            "control.watchdog_timeout_ms must exceed control.period_ms"
        );
        ensure!(self.control.telemetry_every > 0, "control.telemetry_every must be positive");
        ensure!(
            self.sim.steer_rate > 0.0,
            "sim.steer_rate must be positive"
        );
        Ok(self)
    }

    /// Parse settings from a TOML string, without environment overrides.
    #[cfg(test)]
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()
    }
}

/// Load settings from `path`, then apply `SWERVE__SECTION__KEY` environment overrides.
pub fn load_config(path: &str) -> anyhow::Result<Settings> {
    info!("Attempting to load configuration from {}", path);

    let built = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(Environment::with_prefix("SWERVE").prefix_separator("__").separator("__"))
        .build();

    let config = match built {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("reading {}", path));
        }
    };

    let settings: Settings = config
        .try_deserialize()
        .with_context(|| format!("parsing {}", path))?;
    let settings = settings.validate()?;
    info!(
        segments = settings.script.len(),
        period_ms = settings.control.period_ms,
        "Successfully loaded configuration"
    );
    Ok(settings)
}
