/// Degrees per second of rotation for each unit of a beat event's value.
///
/// An event with value `3` spins a rotation effect at `60` degrees per second.
pub const ROTATION_SPEED_MULTIPLIER: f32 = 20.0;

/// Upper bound (exclusive, degrees) of the random phase applied when a rotation is (re)started.
///
/// The phase keeps several effects started by the same event from moving in lockstep.
pub const MAX_START_ANGLE_DEG: f32 = 180.0;

/// Rotation vectors shorter than this are treated as "no axis" and never rotate.
pub const AXIS_EPS: f32 = 1.0e-6;
