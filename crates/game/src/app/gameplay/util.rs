/// Kinematic step: `speed * normalized(right * h + forward * v) * dt`.
fn movement_delta(intent: InputIntent, orientation: engine::Quat, speed: f32, dt: f32) -> Vec3 {
    let direction =
        orientation.right() * intent.horizontal + orientation.forward() * intent.vertical;
    direction.normalized_or_zero() * (speed * dt)
}

fn seconds_to_ticks(seconds: f32, ticks_per_second: u32) -> u64 {
    (f64::from(seconds.max(0.0)) * f64::from(ticks_per_second.max(1))).ceil() as u64
}

fn loop_result_message<T>(
    result: Result<T, LoopError>,
    describe: impl FnOnce(T) -> String,
) -> SceneDebugCommandResult {
    match result {
        Ok(value) => SceneDebugCommandResult::Success(describe(value)),
        Err(error) => SceneDebugCommandResult::Error(error.to_string()),
    }
}
