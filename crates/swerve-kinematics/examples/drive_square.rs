use swerve_kinematics::*;

fn main() {
    let wheelbase = 0.6;
    let track_width = 0.5;
    let max_wheel_speed = 4.0;
    let dt = 0.02; // 50 Hz control cycle
    let steps_per_side = 50;

    let kinematics = match SwerveGeometry::rectangular(wheelbase, track_width)
        .and_then(SwerveKinematics::new)
    {
        Ok(kinematics) => kinematics,
        Err(e) => {
            eprintln!("Failed to initialize kinematics: {}", e);
            return;
        }
    };

    println!("Initializing simulation...");
    println!("  {}", kinematics.geometry());
    println!("  Max wheel speed: {} m/s", max_wheel_speed);
    println!("  Time step: {} s", dt);

    let mut odometry = SwerveOdometry::new(kinematics.clone());
    let mut positions = [WheelPosition::default(); NUM_WHEELS];
    let mut angles = [Rotation2d::ZERO; NUM_WHEELS];
    odometry.initialize(Pose2d::default(), &positions, Rotation2d::ZERO);

    // Field-relative square at 1 m/s with heading held at zero
    let sides = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];
    println!("\nSimulating...");
    for (side, (vx, vy)) in sides.iter().enumerate() {
        let command = ChassisSpeeds::new(*vx, *vy, 0.0);
        for _ in 0..steps_per_side {
            let mut states = kinematics.to_wheel_states(command, &angles);
            desaturate_wheel_speeds(&mut states, max_wheel_speed);
            for i in 0..NUM_WHEELS {
                let state = states[i].optimize(angles[i]);
                // Ideal modules: steer instantly, roll exactly as commanded
                angles[i] = state.angle;
                positions[i] = WheelPosition::new(positions[i].distance + state.speed * dt, state.angle);
            }
            if let Err(e) = odometry.update(&positions, Rotation2d::ZERO) {
                eprintln!("Odometry error: {}", e);
                return;
            }
        }
        match odometry.pose() {
            Ok(pose) => println!("Side {}: Pose: {}", side + 1, pose),
            Err(e) => eprintln!("Odometry error: {}", e),
        }
    }

    println!("\nSimulation complete.");
}
